//! CLI error type.

use pomace_protocol::ProtocolError;
use pomace_serial::ChannelError;
use thiserror::Error;

use crate::config::ConfigError;

/// Everything that can make the CLI fail.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl CliError {
    /// Process exit code: 2 when the controller could not be reached or did
    /// not answer, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Channel(ChannelError::InvalidCommand(_)) => 1,
            CliError::Channel(_) => 2,
            _ => 1,
        }
    }
}
