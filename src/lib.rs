//! Managed binding over the native CQL driver engine.
//!
//! The core is the resource bridge: a [`bridge::ResourceGuard`] owns each
//! native handle, counts in-flight calls, and guarantees the handle is freed
//! exactly once and never used afterwards. Typed facades such as
//! [`statement::PreparedStatement`] sit on top of it.

pub mod bridge;
pub mod config;
pub mod error;
pub mod statement;
pub mod utils;

pub use bridge::{
    EngineOrigin, NativeApi, NativeCallResult, NativeLibrary, NativeResource, ResourceGuard,
};
pub use config::BridgeConfig;
pub use cqlbridge_abi::{NativeErrorCode, NativeHandle};
pub use error::{BridgeError, Result};
pub use statement::{ColumnSpec, OwnedColumnSpec, PreparedStatement};
