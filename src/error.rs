//! Error types for service control and the service runtime bridge

use crate::types::ServiceState;

/// Raw failure reported by an OS call: the Win32 error code plus the
/// system-provided message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct OsError {
    pub code: u32,
    pub message: String,
}

impl OsError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Build from an `std::io::Error`, keeping the raw OS code when present.
    pub fn from_io(err: &std::io::Error) -> Self {
        let code = err.raw_os_error().map(|c| c as u32).unwrap_or(0);
        let mut message = err.to_string();
        // io::Error appends " (os error N)"; the code is rendered separately
        if let Some(idx) = message.find(" (os error") {
            message.truncate(idx);
        }
        Self { code, message }
    }
}

/// Errors returned by every public operation of this crate.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Caller supplied a value of the wrong shape; raised before any OS call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An OS call failed
    #[error("{operation}: {message} ({code})")]
    Os {
        operation: &'static str,
        message: String,
        code: u32,
    },

    /// The watched service left the expected pending state without reaching the target
    #[error("State of service {name} changed to {state}")]
    UnexpectedState { name: String, state: ServiceState },

    /// The watched service did not reach the target state in time
    #[error("State of service {name} did not change to {target} after {seconds} seconds")]
    Timeout {
        name: String,
        target: ServiceState,
        seconds: u64,
    },

    /// The transition watcher went away without reporting an outcome
    #[error("Wait for service {name} ended without a result")]
    WaitAbandoned { name: String },

    /// The service runtime entry point was used more than once in this process
    #[error("Runtime misuse: {0}")]
    RuntimeMisuse(String),

    /// The primary write took effect but the follow-up description write failed
    #[error(
        "{operation}: {message} ({code}); {primary} already took effect and was not rolled back"
    )]
    PartialWrite {
        primary: &'static str,
        operation: &'static str,
        message: String,
        code: u32,
    },

    #[error("Only win32 platform supported, not {0}")]
    UnsupportedPlatform(&'static str),
}

impl ServiceError {
    pub fn os(operation: &'static str, err: OsError) -> Self {
        ServiceError::Os {
            operation,
            message: err.message,
            code: err.code,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(message.into())
    }

    pub fn unsupported_platform() -> Self {
        ServiceError::UnsupportedPlatform(std::env::consts::OS)
    }

    /// Win32 code carried by OS-level failures.
    pub fn os_code(&self) -> Option<u32> {
        match self {
            ServiceError::Os { code, .. } | ServiceError::PartialWrite { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
