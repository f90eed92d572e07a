//! Serial link and response framing settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path (e.g. `/dev/ttyUSB0`).
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Upper bound on a single line read, in milliseconds.
    /// Must be well below both framing windows.
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            read_timeout_ms: 100,
        }
    }
}

impl SerialSettings {
    /// Create settings for the given device with default baud and timeout.
    pub fn new(port: impl Into<String>) -> Self {
        SerialSettings {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set the per-read timeout.
    pub fn with_read_timeout_ms(mut self, read_timeout_ms: u64) -> Self {
        self.read_timeout_ms = read_timeout_ms;
        self
    }

    /// Per-read timeout as a duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Quiescence windows used to frame a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTiming {
    /// How long to wait for the first line, in milliseconds.
    pub command_timeout_ms: u64,
    /// Silence after the last line that ends the response, in milliseconds.
    pub tail_wait_ms: u64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        FrameTiming {
            command_timeout_ms: 1600,
            tail_wait_ms: 220,
        }
    }
}

impl FrameTiming {
    /// Create timing with explicit windows.
    pub fn new(command_timeout_ms: u64, tail_wait_ms: u64) -> Self {
        FrameTiming {
            command_timeout_ms,
            tail_wait_ms,
        }
    }

    /// Window for the response to start.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Window of silence that completes a response.
    pub fn tail_wait(&self) -> Duration {
        Duration::from_millis(self.tail_wait_ms)
    }
}
