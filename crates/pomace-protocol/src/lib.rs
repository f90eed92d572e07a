//! Pomace Controller Line Protocol
//!
//! This crate provides types and utilities for talking to the Pomace boiler
//! controller over its serial console. The controller speaks a plain ASCII,
//! newline-delimited protocol with no length prefix, checksum or terminator
//! line.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → controller): one line of ASCII text terminated with `\n`
//! - **Responses** (controller → host): zero or more `\n`-terminated lines.
//!   The end of a response is only detectable by silence on the link.
//!
//! # Status Lines
//!
//! The `STATUS` command produces free-text lines. Two shapes carry
//! structured data:
//!
//! - **Summary**: `MODE=<value> [KEY=<value> ...]`
//! - **Motor record**: `MOTOR <NAME> ON=<0|1> FAULT=<0|1> RECOVERY=<0|1>`
//!
//! # Example
//!
//! ```rust
//! use pomace_protocol::{parse, ControlCommand, ControlMode, ScalarValue};
//!
//! let cmd = ControlCommand::Mode(ControlMode::Remote);
//! assert_eq!(cmd.encode().as_str(), "MODE REMOTE");
//!
//! let status = parse(&["MODE=AUTO FAN=42", "MOTOR SF ON=1 FAULT=0 RECOVERY=0"]);
//! assert_eq!(status.summary["fan"], ScalarValue::Int(42));
//! assert!(status.motors[0].on);
//! ```

mod codec;
mod commands;
mod error;
mod status;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use status::*;
