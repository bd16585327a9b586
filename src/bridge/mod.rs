//! The native resource bridge.
//!
//! - [`NativeLibrary`] binds the engine's entry points (linked or loaded).
//! - [`NativeCallResult`] is the decoded outcome of one boundary call.
//! - [`ResourceGuard`] owns one handle and serializes its destruction against
//!   in-flight calls.

mod guard;
mod library;
mod result;

pub use guard::{NativeResource, ResourceGuard};
pub use library::{EngineOrigin, NativeApi, NativeLibrary};
pub use result::NativeCallResult;
