use std::marker::PhantomData;
use std::str::Utf8Error;

/// Single-byte boolean: `0` is false, `1` is true, anything else is invalid.
///
/// Never use a platform `bool` across the boundary; its width on the foreign
/// side is not guaranteed to be one byte.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FfiBool(u8);

const _: [(); 1] = [(); std::mem::size_of::<FfiBool>()];

impl FfiBool {
    pub const FALSE: Self = Self(0);
    pub const TRUE: Self = Self(1);

    pub const fn from_bool(value: bool) -> Self {
        if value { Self::TRUE } else { Self::FALSE }
    }

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Strict decode; `None` for any byte other than 0 or 1.
    pub const fn decode(self) -> Option<bool> {
        match self.0 {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }
}

impl From<bool> for FfiBool {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

/// Borrowed UTF-8 view, valid only for the call or callback that produced it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiStr<'a> {
    ptr: *const u8,
    len: usize,
    _phantom: PhantomData<&'a str>,
}

impl<'a> FfiStr<'a> {
    pub fn new(s: &'a str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Wraps bytes that are not known to be UTF-8.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
            _phantom: PhantomData,
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// The engine promises UTF-8 but the bytes are checked anyway.
    pub fn as_str(&self) -> Result<&'a str, Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }
}

/// Borrowed byte view, valid only for the call or callback that produced it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiByteSlice<'a> {
    ptr: *const u8,
    len: usize,
    _phantom: PhantomData<&'a [u8]>,
}

impl<'a> FfiByteSlice<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
            _phantom: PhantomData,
        }
    }

    pub fn empty() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            _phantom: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be null or point to `len` readable bytes that live for `'a`.
    pub unsafe fn from_raw_parts(ptr: *const u8, len: usize) -> Self {
        Self {
            ptr,
            len,
            _phantom: PhantomData,
        }
    }

    /// A null pointer paired with a non-zero length; no valid view looks
    /// like this.
    pub fn is_dangling(&self) -> bool {
        self.ptr.is_null() && self.len != 0
    }

    pub fn as_slice(&self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One column of prepared metadata, handed to a fill callback by value.
///
/// `type_code` is the CQL protocol option id and is not interpreted here.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiColumnSpec<'a> {
    pub keyspace: FfiStr<'a>,
    pub table: FfiStr<'a>,
    pub name: FfiStr<'a>,
    pub type_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_decodes_strictly() {
        assert_eq!(FfiBool::from_raw(0).decode(), Some(false));
        assert_eq!(FfiBool::from_raw(1).decode(), Some(true));
        assert_eq!(FfiBool::from_raw(2).decode(), None);
        assert_eq!(FfiBool::from_raw(0xff).decode(), None);
        assert_eq!(FfiBool::from(true), FfiBool::TRUE);
    }

    #[test]
    fn str_view_reads_back() {
        let owned = String::from("ks");
        let view = FfiStr::new(&owned);
        assert_eq!(view.as_str().unwrap(), "ks");
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let bytes = [0xc3u8, 0x28];
        let view = FfiStr {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
            _phantom: PhantomData,
        };
        assert!(view.as_str().is_err());
    }

    #[test]
    fn empty_byte_slice_is_empty() {
        let slice = FfiByteSlice::empty();
        assert!(slice.is_empty());
        assert!(!slice.is_dangling());
        assert_eq!(slice.as_slice(), &[] as &[u8]);
    }

    #[test]
    fn null_pointer_with_length_is_dangling() {
        let slice = FfiByteSlice {
            ptr: std::ptr::null(),
            len: 3,
            _phantom: PhantomData,
        };
        assert!(slice.is_dangling());
        assert_eq!(FfiByteSlice::new(&[1, 2]).as_slice(), &[1, 2]);
    }
}
