//! Error types for the controller protocol.

use thiserror::Error;

/// Errors that can occur when building commands for the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Command text was empty after trimming.
    #[error("command is empty")]
    EmptyCommand,

    /// Command text exceeds the controller's line buffer.
    #[error("command too long: max {max} bytes, got {actual}")]
    CommandTooLong { max: usize, actual: usize },

    /// Command text contains an embedded line break.
    #[error("command must be a single line")]
    MultiLineCommand,

    /// Unknown motor name.
    #[error("invalid motor name: {0}")]
    InvalidMotor(String),

    /// Unknown reset target.
    #[error("invalid reset target: {0}")]
    InvalidResetTarget(String),

    /// Fan value is neither `AUTO` nor a percentage.
    #[error("fan value must be AUTO or 0-100, got {0}")]
    InvalidFanValue(String),

    /// Raw command contains characters outside `[A-Za-z0-9_ ]`.
    #[error("raw command must match [A-Za-z0-9_ ]: {0}")]
    UnsafeRawCommand(String),

    /// A setting value outside its allowed set.
    #[error("invalid {kind} setting: {value}")]
    InvalidSetting { kind: &'static str, value: String },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
