//! Stable entry-point names and their function-pointer types.

use std::ffi::{c_char, c_void};

use crate::handle::NativeHandle;
use crate::layout::AbiLayout;
use crate::result::FfiResult;
use crate::types::{FfiBool, FfiByteSlice, FfiColumnSpec};

pub const BRIDGE_ABI_LAYOUT: &str = "bridge_abi_layout";
pub const BRIDGE_STRING_FREE: &str = "bridge_string_free";
pub const PREPARED_STATEMENT_FREE: &str = "prepared_statement_free";
pub const PREPARED_STATEMENT_IS_LWT: &str = "prepared_statement_is_lwt";
pub const PREPARED_STATEMENT_VARIABLES_COUNT: &str =
    "prepared_statement_get_variables_column_specs_count";
pub const PREPARED_STATEMENT_RESULT_COUNT: &str =
    "prepared_statement_get_result_column_specs_count";
pub const PREPARED_STATEMENT_FILL_VARIABLES: &str =
    "prepared_statement_fill_variables_column_specs";
pub const PREPARED_STATEMENT_FILL_RESULT: &str = "prepared_statement_fill_result_column_specs";
pub const PREPARED_STATEMENT_GET_ID: &str = "prepared_statement_get_id";

pub type AbiLayoutFn = unsafe extern "C" fn() -> AbiLayout;
pub type StringFreeFn = unsafe extern "C" fn(message: *mut c_char);
pub type ReleaseFn = unsafe extern "C" fn(handle: NativeHandle) -> FfiResult;
pub type BoolQueryFn = unsafe extern "C" fn(handle: NativeHandle, out: *mut FfiBool) -> FfiResult;
pub type CountQueryFn = unsafe extern "C" fn(handle: NativeHandle, out: *mut usize) -> FfiResult;
/// The view written to `out` borrows engine memory that stays valid until the
/// handle is released.
pub type BytesQueryFn =
    unsafe extern "C" fn(handle: NativeHandle, out: *mut FfiByteSlice<'_>) -> FfiResult;

/// Invoked once per column, synchronously, from inside a fill entry point.
pub type ColumnSpecSetter =
    unsafe extern "C" fn(target: *mut c_void, index: usize, spec: FfiColumnSpec<'_>);

pub type FillColumnSpecsFn = unsafe extern "C" fn(
    handle: NativeHandle,
    target: *mut c_void,
    setter: Option<ColumnSpecSetter>,
) -> FfiResult;

/// Every symbol a native engine library must export.
pub const REQUIRED_SYMBOLS: [&str; 9] = [
    BRIDGE_ABI_LAYOUT,
    BRIDGE_STRING_FREE,
    PREPARED_STATEMENT_FREE,
    PREPARED_STATEMENT_IS_LWT,
    PREPARED_STATEMENT_VARIABLES_COUNT,
    PREPARED_STATEMENT_RESULT_COUNT,
    PREPARED_STATEMENT_FILL_VARIABLES,
    PREPARED_STATEMENT_FILL_RESULT,
    PREPARED_STATEMENT_GET_ID,
];
