use std::fmt;

/// Failure codes reported in [`crate::FfiResult::code`].
///
/// The numbering is part of the wire contract. Decoding is strict: a code the
/// managed side does not know is a binary-compatibility problem, not a
/// driver error.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorCode {
    Ok = 0,
    /// A null handle or a null out-parameter reached the engine.
    InvalidArgument = 1,
    SyntaxError = 2,
    InvalidQuery = 3,
    AlreadyExists = 4,
    Unauthorized = 5,
    FunctionFailure = 6,
    Truncate = 7,
    Unprepared = 8,
    InvalidConfiguration = 9,
    Timeout = 10,
    NoHostAvailable = 11,
    /// The engine panicked; the unwind was stopped at the boundary.
    Internal = 12,
}

impl NativeErrorCode {
    pub const fn raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        let code = match raw {
            0 => Self::Ok,
            1 => Self::InvalidArgument,
            2 => Self::SyntaxError,
            3 => Self::InvalidQuery,
            4 => Self::AlreadyExists,
            5 => Self::Unauthorized,
            6 => Self::FunctionFailure,
            7 => Self::Truncate,
            8 => Self::Unprepared,
            9 => Self::InvalidConfiguration,
            10 => Self::Timeout,
            11 => Self::NoHostAvailable,
            12 => Self::Internal,
            _ => return None,
        };
        Some(code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InvalidArgument => "invalid argument",
            Self::SyntaxError => "syntax error",
            Self::InvalidQuery => "invalid query",
            Self::AlreadyExists => "already exists",
            Self::Unauthorized => "unauthorized",
            Self::FunctionFailure => "function failure",
            Self::Truncate => "truncate error",
            Self::Unprepared => "prepared query not found",
            Self::InvalidConfiguration => "invalid configuration in query",
            Self::Timeout => "operation timed out",
            Self::NoHostAvailable => "no host available",
            Self::Internal => "internal engine error",
        }
    }
}

impl fmt::Display for NativeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.raw())
    }
}
