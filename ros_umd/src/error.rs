//! Error types for the RosUmd device core
//!
//! This module defines the error type returned by every fallible device
//! operation, the HRESULT-style codes forwarded to the runtime, and the
//! `umd_err!` / `umd_bail!` macros used to build (and log) errors.

use std::fmt;

use crate::callbacks::{KernelCallbackKind, KernelStatus};

/// Result type for RosUmd operations
pub type Result<T> = std::result::Result<T, Error>;

/// RosUmd device errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The operation violates a protocol invariant (double map, draw without bindings, ...)
    InvalidState(String),

    /// Command buffer or slot range overflow
    CapacityExceeded(String),

    /// A kernel callback reported failure
    KernelRejected {
        callback: KernelCallbackKind,
        status: KernelStatus,
    },

    /// Caller precondition violated (destroying a mapped resource, call before standup, ...)
    ///
    /// The device is unusable afterwards.
    Fatal(String),

    /// Device or adapter creation failed
    InitializationFailed(String),

    /// Invalid resource handle or descriptor
    InvalidResource(String),

    /// An encoded command stream could not be decoded
    MalformedCommand(String),
}

impl Error {
    /// Error code reported to the runtime through the `set_error` upcall
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidState(_)
            | Error::CapacityExceeded(_)
            | Error::InvalidResource(_)
            | Error::MalformedCommand(_) => ErrorCode::InvalidArg,
            Error::KernelRejected { status, .. } => match status {
                KernelStatus::OutOfMemory => ErrorCode::OutOfMemory,
                KernelStatus::WasStillDrawing => ErrorCode::WasStillDrawing,
                KernelStatus::DeviceRemoved => ErrorCode::DeviceRemoved,
                KernelStatus::InvalidParameter | KernelStatus::Unsuccessful(_) => ErrorCode::Fail,
            },
            Error::Fatal(_) => ErrorCode::DeviceRemoved,
            Error::InitializationFailed(_) => ErrorCode::Fail,
        }
    }

    /// Whether this error leaves the device unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {}", msg),
            Error::KernelRejected { callback, status } => {
                write!(f, "Kernel rejected {:?}: {:?}", callback, status)
            }
            Error::Fatal(msg) => write!(f, "Fatal: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::MalformedCommand(msg) => write!(f, "Malformed command: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR CODES =====

/// HRESULT-style error code understood by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E_INVALIDARG
    InvalidArg,
    /// E_OUTOFMEMORY
    OutOfMemory,
    /// E_FAIL
    Fail,
    /// DXGI_ERROR_DEVICE_REMOVED
    DeviceRemoved,
    /// DXGI_ERROR_WAS_STILL_DRAWING
    WasStillDrawing,
}

impl ErrorCode {
    /// Raw HRESULT value
    pub fn as_hresult(&self) -> u32 {
        match self {
            ErrorCode::InvalidArg => 0x8007_0057,
            ErrorCode::OutOfMemory => 0x8007_000E,
            ErrorCode::Fail => 0x8000_4005,
            ErrorCode::DeviceRemoved => 0x887A_0005,
            ErrorCode::WasStillDrawing => 0x887A_000A,
        }
    }
}

// ===== ERROR MACROS =====

/// Build an `Error` variant carrying a formatted message, logging it at ERROR level
///
/// # Example
///
/// ```ignore
/// return Err(umd_err!(InvalidState, "rosumd::Device", "slot {} is not bound", slot));
/// ```
#[macro_export]
macro_rules! umd_err {
    ($kind:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::umd_error!($source, "{}", message);
        $crate::rosumd::Error::$kind(message)
    }};
}

/// Log and return early with an `Error` variant carrying a formatted message
///
/// # Example
///
/// ```ignore
/// umd_bail!(InvalidResource, "rosumd::Resource", "width must be non-zero");
/// ```
#[macro_export]
macro_rules! umd_bail {
    ($kind:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::umd_err!($kind, $source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
