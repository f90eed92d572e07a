//! # pomace-serial
//!
//! Request/response bridge to the Pomace boiler controller over a serial
//! link.
//!
//! The controller answers each command with an undelimited burst of lines.
//! There is no terminator and no line count, so [`CommandChannel`] frames a
//! response by quiescence:
//!
//! - A response may take up to the *command timeout* to start.
//! - Once a line has arrived, the response is complete after the link has
//!   been silent for the *tail wait*. Every further line earns another tail
//!   wait, so long dumps are never cut short while lines keep coming.
//!
//! The physical port has no multiplexing, so the channel holds one lock for
//! the whole send/receive cycle: exactly one command is in flight at a time.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pomace_serial::{CommandChannel, FrameTiming, SerialSettings};
//!
//! let channel = Arc::new(CommandChannel::serial(
//!     &SerialSettings::default(),
//!     FrameTiming::default(),
//! ));
//!
//! let lines = channel.query("STATUS")?;
//! let status = pomace_protocol::parse(&lines);
//! println!("mode: {:?}", status.mode());
//!
//! channel.close();
//! # Ok::<(), pomace_serial::ChannelError>(())
//! ```

mod channel;
mod config;
mod error;
mod framer;
mod link;
pub mod sim;

pub use channel::CommandChannel;
pub use config::{FrameTiming, SerialSettings};
pub use error::ChannelError;
pub use framer::{FrameState, QuiescenceFramer};
pub use link::{Connector, Link, SerialConnector, SerialLink};

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
