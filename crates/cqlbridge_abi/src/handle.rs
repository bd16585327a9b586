use std::ffi::c_void;
use std::fmt;

/// Opaque token naming a resource owned by the native engine.
///
/// The managed side only stores and forwards it; it never dereferences the
/// address or does arithmetic on it.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(*mut c_void);

// Handles are plain tokens; the owning guard serializes destruction.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

const _: [(); std::mem::size_of::<NativeHandle>()] = [(); std::mem::size_of::<*const ()>()];

impl NativeHandle {
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub const fn from_raw(raw: *mut c_void) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:p})", self.0)
    }
}
