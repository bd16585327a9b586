//! Native engine side of the bridge.
//!
//! Owns prepared-statement resources and exports the `extern "C"` entry
//! points named in [`cqlbridge_abi::symbols`]. Built both as an `rlib` (linked
//! straight into the binding) and as a `cdylib` (loaded at runtime).

mod boundary;
mod entry;
mod statement;

pub use boundary::EngineError;
pub use entry::{
    bridge_abi_layout, bridge_string_free, prepared_statement_fill_result_column_specs,
    prepared_statement_fill_variables_column_specs, prepared_statement_free,
    prepared_statement_get_id, prepared_statement_get_result_column_specs_count,
    prepared_statement_get_variables_column_specs_count, prepared_statement_is_lwt,
};
pub use statement::{BridgedPreparedStatement, ColumnSpec, PreparedStatementBuilder};
