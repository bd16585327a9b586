use std::ffi::c_void;
use std::sync::Arc;

use cqlbridge_abi::{FfiColumnSpec, FfiStr, NativeHandle};
use tracing::debug;

/// Column metadata fixed at preparation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub type_code: u16,
}

impl ColumnSpec {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        type_code: u16,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            name: name.into(),
            type_code,
        }
    }

    pub(crate) fn as_ffi(&self) -> FfiColumnSpec<'_> {
        FfiColumnSpec {
            keyspace: FfiStr::new(&self.keyspace),
            table: FfiStr::new(&self.table),
            name: FfiStr::new(&self.name),
            type_code: self.type_code,
        }
    }
}

/// A prepared statement as held by the engine.
///
/// Shared through an `Arc`; the raw `Arc` pointer is the handle given to the
/// managed side.
#[derive(Debug)]
pub struct BridgedPreparedStatement {
    id: Vec<u8>,
    query: String,
    confirmed_lwt: bool,
    variable_specs: Vec<ColumnSpec>,
    result_specs: Vec<ColumnSpec>,
}

impl BridgedPreparedStatement {
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_confirmed_lwt(&self) -> bool {
        self.confirmed_lwt
    }

    pub fn variable_col_specs(&self) -> &[ColumnSpec] {
        &self.variable_specs
    }

    pub fn result_col_specs(&self) -> &[ColumnSpec] {
        &self.result_specs
    }

    pub(crate) fn into_handle(self: Arc<Self>) -> NativeHandle {
        NativeHandle::from_raw(Arc::into_raw(self) as *mut c_void)
    }

    /// Borrows the statement behind a handle.
    ///
    /// # Safety
    ///
    /// `handle` must be null or come from [`Self::into_handle`] and must not
    /// have been released yet. The returned reference must not outlive the
    /// entry point call.
    pub(crate) unsafe fn borrow<'a>(handle: NativeHandle) -> Option<&'a Self> {
        unsafe { (handle.into_raw() as *const Self).as_ref() }
    }

    /// Drops the engine's reference behind a handle.
    ///
    /// # Safety
    ///
    /// `handle` must come from [`Self::into_handle`] and must be released at
    /// most once.
    pub(crate) unsafe fn release(handle: NativeHandle) {
        let statement = unsafe { Arc::from_raw(handle.into_raw() as *const Self) };
        debug!(query = %statement.query, "releasing prepared statement");
        drop(statement);
    }
}

/// Statement-preparation collaborator: assembles a statement and hands out
/// its handle.
#[derive(Debug, Default, Clone)]
pub struct PreparedStatementBuilder {
    id: Vec<u8>,
    query: String,
    confirmed_lwt: bool,
    variable_specs: Vec<ColumnSpec>,
    result_specs: Vec<ColumnSpec>,
}

impl PreparedStatementBuilder {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = id.into();
        self
    }

    /// Marks the statement as a lightweight transaction, as confirmed by the
    /// server in the prepare response.
    pub fn confirmed_lwt(mut self, lwt: bool) -> Self {
        self.confirmed_lwt = lwt;
        self
    }

    pub fn variable(mut self, spec: ColumnSpec) -> Self {
        self.variable_specs.push(spec);
        self
    }

    pub fn result_column(mut self, spec: ColumnSpec) -> Self {
        self.result_specs.push(spec);
        self
    }

    pub fn into_statement(self) -> BridgedPreparedStatement {
        BridgedPreparedStatement {
            id: self.id,
            query: self.query,
            confirmed_lwt: self.confirmed_lwt,
            variable_specs: self.variable_specs,
            result_specs: self.result_specs,
        }
    }

    /// Allocates the statement and returns its handle. The handle must be
    /// released exactly once through `prepared_statement_free`.
    pub fn build(self) -> NativeHandle {
        let statement = Arc::new(self.into_statement());
        debug!(
            query = %statement.query,
            variables = statement.variable_specs.len(),
            lwt = statement.confirmed_lwt,
            "prepared statement allocated"
        );
        statement.into_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_roundtrips_to_same_statement() {
        let handle = PreparedStatementBuilder::new("SELECT * FROM ks.t WHERE k = ?")
            .variable(ColumnSpec::new("ks", "t", "k", 0x0009))
            .build();
        assert!(!handle.is_null());

        let statement = unsafe { BridgedPreparedStatement::borrow(handle) }.unwrap();
        assert_eq!(statement.query(), "SELECT * FROM ks.t WHERE k = ?");
        assert_eq!(statement.variable_col_specs().len(), 1);
        assert!(!statement.is_confirmed_lwt());

        unsafe { BridgedPreparedStatement::release(handle) };
    }

    #[test]
    fn null_handle_borrows_nothing() {
        assert!(unsafe { BridgedPreparedStatement::borrow(NativeHandle::null()) }.is_none());
    }
}
