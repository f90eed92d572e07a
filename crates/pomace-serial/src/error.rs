//! Error types for the command channel.

use pomace_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while exchanging a command with the controller.
///
/// None of these are retried by the channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The serial device could not be opened, or failed mid-transfer.
    #[error("serial connection to {device} failed: {source}")]
    Connection {
        /// Device path.
        device: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The command was sent but no line came back within the command timeout.
    #[error("no response for command: {command}")]
    Timeout {
        /// The unanswered command.
        command: String,
    },

    /// The command text was rejected before anything was sent.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] ProtocolError),
}

impl ChannelError {
    /// Check if this is a connection failure.
    pub fn is_connection(&self) -> bool {
        matches!(self, ChannelError::Connection { .. })
    }

    /// Check if this is an unanswered command.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout { .. })
    }
}
