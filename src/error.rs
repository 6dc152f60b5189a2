// PostureBand - Error Types
//
// Typed errors at the library seams. Boot and driver code uses
// `anyhow::Result` on top of these.

use thiserror::Error;

/// Malformed settings write (`S` frame body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown setting marker 0x{0:02x}")]
    UnknownSetting(u8),

    #[error("setting 0x{0:02x} is missing its value byte")]
    MissingValue(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no active connection")]
    NotConnected,

    #[error("link security below encryption")]
    Insecure,

    /// Error code reported by the radio stack.
    #[error("radio error {0}")]
    Radio(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("telemetry sink busy")]
    Busy,

    #[error("telemetry read failed ({0})")]
    Read(i32),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings blob is {0} bytes, expected 4")]
    BadLength(usize),

    #[error("settings backend: {0}")]
    Backend(#[from] anyhow::Error),
}
