use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use cqlbridge_abi::{FfiResult, NativeErrorCode};
use thiserror::Error;
use tracing::{debug, error};

/// A failure the engine reports back through [`FfiResult`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct EngineError {
    pub code: NativeErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: NativeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn null_argument(what: &str) -> Self {
        Self::new(NativeErrorCode::InvalidArgument, format!("{what} is null"))
    }
}

/// Runs an entry point body, turning errors and panics into an [`FfiResult`].
///
/// No unwind may leave an `extern "C"` function.
pub(crate) fn run_entry<F>(entry_point: &'static str, body: F) -> FfiResult
where
    F: FnOnce() -> Result<(), EngineError>,
{
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => FfiResult::ok(),
        Ok(Err(err)) => {
            debug!(
                entry_point,
                code = err.code.raw(),
                "entry point rejected call: {}", err.message
            );
            FfiResult::failure(err.code, &err.message)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(entry_point, "engine panicked: {message}");
            FfiResult::failure(
                NativeErrorCode::Internal,
                &format!("engine panicked in {entry_point}: {message}"),
            )
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
