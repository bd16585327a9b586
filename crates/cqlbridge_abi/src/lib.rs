//! Boundary contract shared by the managed binding and the native engine.
//!
//! Everything in this crate is `#[repr(C)]` or `#[repr(transparent)]` and is
//! laid out identically on both sides of the boundary.

pub mod code;
pub mod handle;
pub mod layout;
pub mod result;
pub mod symbols;
pub mod types;

pub use code::NativeErrorCode;
pub use handle::NativeHandle;
pub use layout::AbiLayout;
pub use result::FfiResult;
pub use types::{FfiBool, FfiByteSlice, FfiColumnSpec, FfiStr};
