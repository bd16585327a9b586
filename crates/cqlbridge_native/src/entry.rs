use std::ffi::{CString, c_char, c_void};

use cqlbridge_abi::symbols::{self, ColumnSpecSetter};
use cqlbridge_abi::{AbiLayout, FfiBool, FfiByteSlice, FfiResult, NativeHandle};

use crate::boundary::{EngineError, run_entry};
use crate::statement::{BridgedPreparedStatement, ColumnSpec};

fn statement<'a>(handle: NativeHandle) -> Result<&'a BridgedPreparedStatement, EngineError> {
    unsafe { BridgedPreparedStatement::borrow(handle) }
        .ok_or_else(|| EngineError::null_argument("prepared statement handle"))
}

fn check_out<T>(out: *mut T, what: &str) -> Result<(), EngineError> {
    if out.is_null() {
        Err(EngineError::null_argument(what))
    } else {
        Ok(())
    }
}

fn fill_column_specs(
    specs: &[ColumnSpec],
    target: *mut c_void,
    setter: Option<ColumnSpecSetter>,
) -> Result<(), EngineError> {
    let setter = setter.ok_or_else(|| EngineError::null_argument("column spec setter"))?;
    for (index, spec) in specs.iter().enumerate() {
        unsafe { setter(target, index, spec.as_ffi()) };
    }
    Ok(())
}

#[unsafe(no_mangle)]
pub extern "C" fn bridge_abi_layout() -> AbiLayout {
    AbiLayout::current()
}

/// Frees a message string carried by a failed [`FfiResult`].
///
/// # Safety
///
/// `message` must be null or a pointer taken from an [`FfiResult`] produced
/// by this engine, and must be freed at most once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bridge_string_free(message: *mut c_char) {
    if message.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(message);
    }
}

/// # Safety
///
/// `handle` must be a live handle and must not be used again after this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_free(handle: NativeHandle) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_FREE, || {
        if handle.is_null() {
            return Err(EngineError::null_argument("prepared statement handle"));
        }
        unsafe { BridgedPreparedStatement::release(handle) };
        Ok(())
    })
}

/// # Safety
///
/// `handle` must be a live handle and `is_lwt` must be valid for a one-byte write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_is_lwt(
    handle: NativeHandle,
    is_lwt: *mut FfiBool,
) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_IS_LWT, || {
        let statement = statement(handle)?;
        check_out(is_lwt, "is_lwt out-parameter")?;
        unsafe { is_lwt.write(FfiBool::from(statement.is_confirmed_lwt())) };
        Ok(())
    })
}

/// Gets the number of variable column specifications in the prepared statement.
///
/// # Safety
///
/// `handle` must be a live handle and `out_num_fields` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_get_variables_column_specs_count(
    handle: NativeHandle,
    out_num_fields: *mut usize,
) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_VARIABLES_COUNT, || {
        let statement = statement(handle)?;
        check_out(out_num_fields, "count out-parameter")?;
        unsafe { out_num_fields.write(statement.variable_col_specs().len()) };
        Ok(())
    })
}

/// Gets the number of result column specifications in the prepared statement.
///
/// # Safety
///
/// `handle` must be a live handle and `out_num_fields` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_get_result_column_specs_count(
    handle: NativeHandle,
    out_num_fields: *mut usize,
) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_RESULT_COUNT, || {
        let statement = statement(handle)?;
        check_out(out_num_fields, "count out-parameter")?;
        unsafe { out_num_fields.write(statement.result_col_specs().len()) };
        Ok(())
    })
}

/// Calls `setter` once per bind variable, in order.
///
/// # Safety
///
/// `handle` must be a live handle; `target` is passed through to `setter`
/// untouched and must be whatever `setter` expects.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_fill_variables_column_specs(
    handle: NativeHandle,
    target: *mut c_void,
    setter: Option<ColumnSpecSetter>,
) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_FILL_VARIABLES, || {
        let statement = statement(handle)?;
        fill_column_specs(statement.variable_col_specs(), target, setter)
    })
}

/// Calls `setter` once per result column, in order.
///
/// # Safety
///
/// Same contract as [`prepared_statement_fill_variables_column_specs`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_fill_result_column_specs(
    handle: NativeHandle,
    target: *mut c_void,
    setter: Option<ColumnSpecSetter>,
) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_FILL_RESULT, || {
        let statement = statement(handle)?;
        fill_column_specs(statement.result_col_specs(), target, setter)
    })
}

/// Exposes the statement id. The bytes stay valid until the handle is freed.
///
/// # Safety
///
/// `handle` must be a live handle and `out_id` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prepared_statement_get_id(
    handle: NativeHandle,
    out_id: *mut FfiByteSlice<'_>,
) -> FfiResult {
    run_entry(symbols::PREPARED_STATEMENT_GET_ID, || {
        let statement = statement(handle)?;
        check_out(out_id, "id out-parameter")?;
        unsafe { out_id.write(FfiByteSlice::new(statement.id())) };
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use cqlbridge_abi::{FfiColumnSpec, NativeErrorCode};

    use super::*;
    use crate::statement::PreparedStatementBuilder;

    fn lwt_statement() -> NativeHandle {
        PreparedStatementBuilder::new("INSERT INTO ks.t (k, v) VALUES (?, ?) IF NOT EXISTS")
            .id(vec![0xde, 0xad])
            .confirmed_lwt(true)
            .variable(ColumnSpec::new("ks", "t", "k", 0x0009))
            .variable(ColumnSpec::new("ks", "t", "v", 0x000d))
            .result_column(ColumnSpec::new("ks", "t", "[applied]", 0x0004))
            .build()
    }

    unsafe extern "C" fn collect_names(target: *mut c_void, index: usize, spec: FfiColumnSpec<'_>) {
        let names = unsafe { &mut *(target as *mut Vec<(usize, String)>) };
        names.push((index, spec.name.as_str().unwrap().to_string()));
    }

    #[test]
    fn is_lwt_writes_single_byte() {
        let handle = lwt_statement();
        let mut out = FfiBool::FALSE;
        let result = unsafe { prepared_statement_is_lwt(handle, &mut out) };
        assert!(result.is_ok());
        assert_eq!(out.raw(), 1);
        assert!(unsafe { prepared_statement_free(handle) }.is_ok());
    }

    #[test]
    fn counts_reflect_metadata() {
        let handle = lwt_statement();
        let mut variables = 0usize;
        let mut results = 0usize;
        unsafe {
            assert!(
                prepared_statement_get_variables_column_specs_count(handle, &mut variables).is_ok()
            );
            assert!(prepared_statement_get_result_column_specs_count(handle, &mut results).is_ok());
        }
        assert_eq!(variables, 2);
        assert_eq!(results, 1);
        assert!(unsafe { prepared_statement_free(handle) }.is_ok());
    }

    #[test]
    fn fill_invokes_setter_per_column_in_order() {
        let handle = lwt_statement();
        let mut names: Vec<(usize, String)> = Vec::new();
        let result = unsafe {
            prepared_statement_fill_variables_column_specs(
                handle,
                &mut names as *mut _ as *mut c_void,
                Some(collect_names),
            )
        };
        assert!(result.is_ok());
        assert_eq!(names, vec![(0, "k".to_string()), (1, "v".to_string())]);
        assert!(unsafe { prepared_statement_free(handle) }.is_ok());
    }

    #[test]
    fn null_handle_is_invalid_argument() {
        let mut out = FfiBool::FALSE;
        let result = unsafe { prepared_statement_is_lwt(NativeHandle::null(), &mut out) };
        assert_eq!(result.code, NativeErrorCode::InvalidArgument.raw());
        unsafe { bridge_string_free(result.message) };
        assert_eq!(out, FfiBool::FALSE);
    }

    #[test]
    fn null_setter_is_invalid_argument() {
        let handle = lwt_statement();
        let result = unsafe {
            prepared_statement_fill_result_column_specs(handle, std::ptr::null_mut(), None)
        };
        assert_eq!(result.code, NativeErrorCode::InvalidArgument.raw());
        unsafe { bridge_string_free(result.message) };
        assert!(unsafe { prepared_statement_free(handle) }.is_ok());
    }

    #[test]
    fn id_is_borrowed_from_statement() {
        let handle = lwt_statement();
        let mut id = FfiByteSlice::empty();
        assert!(unsafe { prepared_statement_get_id(handle, &mut id) }.is_ok());
        assert_eq!(id.as_slice(), &[0xde, 0xad]);

        let result = unsafe { prepared_statement_get_id(handle, std::ptr::null_mut()) };
        assert_eq!(result.code, NativeErrorCode::InvalidArgument.raw());
        unsafe { bridge_string_free(result.message) };
        assert!(unsafe { prepared_statement_free(handle) }.is_ok());
    }

    #[test]
    fn entry_points_match_contract_types() {
        let _: symbols::AbiLayoutFn = bridge_abi_layout;
        let _: symbols::StringFreeFn = bridge_string_free;
        let _: symbols::ReleaseFn = prepared_statement_free;
        let _: symbols::BoolQueryFn = prepared_statement_is_lwt;
        let _: symbols::CountQueryFn = prepared_statement_get_variables_column_specs_count;
        let _: symbols::CountQueryFn = prepared_statement_get_result_column_specs_count;
        let _: symbols::FillColumnSpecsFn = prepared_statement_fill_variables_column_specs;
        let _: symbols::FillColumnSpecsFn = prepared_statement_fill_result_column_specs;
        let _: symbols::BytesQueryFn = prepared_statement_get_id;
    }
}
