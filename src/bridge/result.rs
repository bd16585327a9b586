use cqlbridge_abi::NativeErrorCode;

use crate::error::{BridgeError, Result};

/// Decoded outcome of a single entry-point call.
///
/// Produced by [`crate::NativeLibrary::decode`], which also returns the
/// engine-owned message string to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCallResult {
    Success,
    Failure {
        code: NativeErrorCode,
        message: Option<String>,
    },
}

impl NativeCallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn into_result(self, entry_point: &'static str) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Failure { code, message } => Err(BridgeError::NativeCallFailed {
                entry_point,
                code,
                message: message.unwrap_or_default(),
            }),
        }
    }
}
