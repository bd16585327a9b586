use std::fmt;
use std::sync::Arc;

use cqlbridge_abi::symbols::{
    self, CountQueryFn, FillColumnSpecsFn, PREPARED_STATEMENT_FILL_RESULT,
    PREPARED_STATEMENT_FILL_VARIABLES, PREPARED_STATEMENT_RESULT_COUNT,
    PREPARED_STATEMENT_VARIABLES_COUNT, ReleaseFn,
};
use cqlbridge_abi::{FfiBool, FfiByteSlice, NativeHandle};
use once_cell::sync::OnceCell;
use tracing::trace;

use super::column::{ColumnSpec, ColumnVisit, OwnedColumnSpec};
use crate::bridge::{NativeApi, NativeLibrary, NativeResource, ResourceGuard};
use crate::error::{BridgeError, Result};

/// Engine-side prepared statement.
pub struct PreparedStatementResource;

impl NativeResource for PreparedStatementResource {
    const NAME: &'static str = "prepared statement";
    const RELEASE_ENTRY_POINT: &'static str = symbols::PREPARED_STATEMENT_FREE;

    fn release_fn(api: &NativeApi) -> ReleaseFn {
        api.prepared_statement_free
    }
}

/// A statement the engine has prepared, exposed as a safe handle.
///
/// Shareable across threads. [`PreparedStatement::dispose`] may race with any
/// other method; the engine object is freed exactly once after the last
/// running call returns, and later calls fail with
/// [`BridgeError::ResourceDisposed`]. Dropping the statement disposes it.
pub struct PreparedStatement {
    guard: ResourceGuard<PreparedStatementResource>,
    variable_count: OnceCell<usize>,
    result_count: OnceCell<usize>,
}

impl PreparedStatement {
    /// Adopts a handle returned by the engine's prepare call.
    ///
    /// # Safety
    ///
    /// `handle` must be a live prepared statement owned by `library`'s engine.
    /// Ownership moves to the returned value.
    pub unsafe fn from_handle(library: Arc<NativeLibrary>, handle: NativeHandle) -> Result<Self> {
        let guard = unsafe { ResourceGuard::new(library, handle)? };
        Ok(Self {
            guard,
            variable_count: OnceCell::new(),
            result_count: OnceCell::new(),
        })
    }

    /// Whether the engine classified the statement as a lightweight
    /// transaction (a conditional `IF ...` statement).
    pub fn is_lwt(&self) -> Result<bool> {
        const ENTRY: &str = symbols::PREPARED_STATEMENT_IS_LWT;

        self.guard.call(|library, handle| {
            let mut out = FfiBool::FALSE;
            let raw = unsafe { (library.api().prepared_statement_is_lwt)(handle, &raw mut out) };
            library.check(ENTRY, raw)?;
            out.decode().ok_or_else(|| {
                BridgeError::mismatch(
                    ENTRY,
                    format!("boolean out-parameter holds byte {}", out.raw()),
                )
            })
        })
    }

    /// Number of bind markers. Asked once, then cached.
    pub fn variable_column_count(&self) -> Result<usize> {
        self.cached_count(&self.variable_count, PREPARED_STATEMENT_VARIABLES_COUNT, |api| {
            api.prepared_statement_variables_count
        })
    }

    /// Number of columns in the statement's result set. Asked once, then cached.
    pub fn result_column_count(&self) -> Result<usize> {
        self.cached_count(&self.result_count, PREPARED_STATEMENT_RESULT_COUNT, |api| {
            api.prepared_statement_result_count
        })
    }

    /// Streams bind-variable metadata to `visitor`, in order.
    ///
    /// The visitor runs synchronously inside the engine call and must not call
    /// back into this statement's `dispose`; the release would be deferred
    /// until the fill returns. A panic in the visitor stops delivery and is
    /// resumed once the engine has returned. Returns the number of columns
    /// delivered.
    pub fn fill_variable_column_metadata<F>(&self, visitor: F) -> Result<usize>
    where
        F: FnMut(ColumnSpec<'_>),
    {
        self.fill(
            PREPARED_STATEMENT_FILL_VARIABLES,
            |api| api.prepared_statement_fill_variables,
            visitor,
        )
    }

    /// Streams result-column metadata to `visitor`, in order.
    pub fn fill_result_column_metadata<F>(&self, visitor: F) -> Result<usize>
    where
        F: FnMut(ColumnSpec<'_>),
    {
        self.fill(PREPARED_STATEMENT_FILL_RESULT, |api| api.prepared_statement_fill_result, visitor)
    }

    pub fn variable_column_specs(&self) -> Result<Vec<OwnedColumnSpec>> {
        self.collect(PREPARED_STATEMENT_FILL_VARIABLES, |api| api.prepared_statement_fill_variables)
    }

    pub fn result_column_specs(&self) -> Result<Vec<OwnedColumnSpec>> {
        self.collect(PREPARED_STATEMENT_FILL_RESULT, |api| api.prepared_statement_fill_result)
    }

    /// Server-assigned statement id, copied out of engine memory.
    pub fn statement_id(&self) -> Result<Vec<u8>> {
        const ENTRY: &str = symbols::PREPARED_STATEMENT_GET_ID;

        self.guard.call(|library, handle| {
            let mut id = FfiByteSlice::empty();
            let raw = unsafe { (library.api().prepared_statement_get_id)(handle, &raw mut id) };
            library.check(ENTRY, raw)?;
            if id.is_dangling() {
                return Err(BridgeError::mismatch(
                    ENTRY,
                    format!("null id pointer with length {}", id.len()),
                ));
            }
            // Valid while the handle is; the guard keeps it alive.
            Ok(id.as_slice().to_vec())
        })
    }

    /// Releases the engine object. Idempotent.
    pub fn dispose(&self) {
        if self.guard.dispose() {
            trace!("prepared statement disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.guard.is_disposed()
    }

    pub fn library(&self) -> &Arc<NativeLibrary> {
        self.guard.library()
    }

    fn cached_count(
        &self,
        cache: &OnceCell<usize>,
        entry_point: &'static str,
        select: fn(&NativeApi) -> CountQueryFn,
    ) -> Result<usize> {
        // Through the guard even when cached, so a disposed statement says so.
        self.guard.call(|library, handle| {
            cache
                .get_or_try_init(|| {
                    let mut count = 0usize;
                    let raw = unsafe { select(library.api())(handle, &raw mut count) };
                    library.check(entry_point, raw)?;
                    trace!(entry_point, count, "column count fetched");
                    Ok(count)
                })
                .copied()
        })
    }

    fn fill<F>(
        &self,
        entry_point: &'static str,
        select: fn(&NativeApi) -> FillColumnSpecsFn,
        mut visitor: F,
    ) -> Result<usize>
    where
        F: FnMut(ColumnSpec<'_>),
    {
        self.guard.call(|library, handle| {
            let mut visit = ColumnVisit::new(entry_point, &mut visitor);
            let raw = unsafe {
                select(library.api())(handle, visit.target(), Some(ColumnVisit::<F>::setter()))
            };
            let outcome = library.check(entry_point, raw);
            let delivered = visit.finish()?;
            outcome?;
            Ok(delivered)
        })
    }

    fn collect(
        &self,
        entry_point: &'static str,
        select: fn(&NativeApi) -> FillColumnSpecsFn,
    ) -> Result<Vec<OwnedColumnSpec>> {
        let mut specs = Vec::new();
        self.fill(entry_point, select, |column| specs.push(column.to_owned_spec()))?;
        Ok(specs)
    }
}

impl fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("guard", &self.guard)
            .field("variable_count", &self.variable_count.get())
            .field("result_count", &self.result_count.get())
            .finish()
    }
}
