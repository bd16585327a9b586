use std::path::PathBuf;

use cqlbridge_abi::NativeErrorCode;
use thiserror::Error;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The facade was used after its guard was torn down. Never retried.
    #[error("{resource} was used after it was disposed")]
    ResourceDisposed { resource: &'static str },

    /// The engine handed out a null handle where a live one was expected.
    #[error("native engine returned a null {resource} handle")]
    NullHandle { resource: &'static str },

    /// The engine ran the call and reported a failure.
    #[error("native call `{entry_point}` failed with {code}: {message}")]
    NativeCallFailed {
        entry_point: &'static str,
        code: NativeErrorCode,
        message: String,
    },

    /// The two sides disagree on a binary representation.
    #[error("marshaling mismatch in `{entry_point}`: {detail}")]
    MarshalingMismatch {
        entry_point: &'static str,
        detail: String,
    },

    #[error("failed to load native library {}: {source}", path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("native library does not export `{symbol}`: {source}")]
    SymbolNotFound {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("no native engine available: {0}")]
    NoEngine(String),

    #[error("invalid bridge configuration: {0}")]
    Config(String),
}

impl BridgeError {
    pub(crate) fn mismatch(entry_point: &'static str, detail: impl Into<String>) -> Self {
        Self::MarshalingMismatch {
            entry_point,
            detail: detail.into(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::ResourceDisposed { .. })
    }

    pub fn is_native_failure(&self) -> bool {
        matches!(self, Self::NativeCallFailed { .. })
    }

    /// The engine's error code, when the engine reported one.
    pub fn native_code(&self) -> Option<NativeErrorCode> {
        match self {
            Self::NativeCallFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
