use std::ffi::{CString, c_char};

use crate::code::NativeErrorCode;

/// Outcome returned by every entry point.
///
/// On failure `message` is null or a NUL-terminated string owned by the
/// engine; the receiver hands it back through `bridge_string_free`.
/// Out-parameters are meaningful only when `code` is zero.
#[repr(C)]
#[derive(Debug)]
#[must_use]
pub struct FfiResult {
    pub code: i32,
    pub message: *mut c_char,
}

impl FfiResult {
    pub fn ok() -> Self {
        Self {
            code: NativeErrorCode::Ok.raw(),
            message: std::ptr::null_mut(),
        }
    }

    pub fn failure(code: NativeErrorCode, message: &str) -> Self {
        // Interior NULs would truncate the message on the other side.
        let message = CString::new(message.replace('\0', " "))
            .map(CString::into_raw)
            .unwrap_or(std::ptr::null_mut());
        Self {
            code: code.raw(),
            message,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == NativeErrorCode::Ok.raw()
    }
}
