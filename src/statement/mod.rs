//! Prepared-statement facade over the native engine.

mod column;
mod prepared;

pub use column::{ColumnSpec, OwnedColumnSpec};
pub use prepared::{PreparedStatement, PreparedStatementResource};
