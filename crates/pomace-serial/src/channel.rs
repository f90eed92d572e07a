//! Serialized command/response channel.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use pomace_protocol::{Command, ControlCommand};
use tracing::{debug, trace, warn};

use crate::config::{FrameTiming, SerialSettings};
use crate::error::ChannelError;
use crate::framer::{FrameState, QuiescenceFramer};
use crate::link::{Connector, Link, SerialConnector};
use crate::Result;

/// The single path to the controller.
///
/// One long-lived channel is shared (e.g. behind an `Arc`) by every caller.
/// The lock spans the whole send/receive cycle, so concurrent queries queue
/// up and never interleave on the wire.
pub struct CommandChannel<C: Connector = SerialConnector> {
    connector: C,
    timing: FrameTiming,
    link: Mutex<Option<C::Link>>,
    connected: AtomicBool,
}

impl CommandChannel<SerialConnector> {
    /// Create a channel for a serial port. The port is opened on first use.
    pub fn serial(settings: &SerialSettings, timing: FrameTiming) -> Self {
        CommandChannel::new(SerialConnector::new(settings.clone()), timing)
    }
}

impl<C: Connector> CommandChannel<C> {
    /// Create a channel over any connector. Nothing is opened yet.
    pub fn new(connector: C, timing: FrameTiming) -> Self {
        CommandChannel {
            connector,
            timing,
            link: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Device name.
    pub fn device(&self) -> &str {
        self.connector.device()
    }

    /// Framing windows in use.
    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    /// The connector this channel opens links with.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a link is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Close the link. Waits for an in-flight query; the next query reopens.
    pub fn close(&self) {
        let mut guard = self.link.lock();
        if guard.take().is_some() {
            debug!(device = self.device(), "Closed link");
        }
        self.connected.store(false, Ordering::Release);
    }

    /// Open the link now if it is not already open. Nothing is sent.
    pub fn ensure_open(&self) -> Result<()> {
        let mut guard = self.link.lock();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        Ok(())
    }

    /// Send raw command text and collect the response lines.
    ///
    /// The text is trimmed and must be a single line of bounded length.
    pub fn query(&self, command: &str) -> Result<Vec<String>> {
        let command = Command::new(command)?;
        self.query_command(&command)
    }

    /// Send a typed controller command and collect the response lines.
    pub fn send(&self, command: &ControlCommand) -> Result<Vec<String>> {
        self.query_command(&command.encode())
    }

    /// Send a validated command and collect the response lines.
    ///
    /// Fails with [`ChannelError::Timeout`] if no line arrives within the
    /// command timeout, and with [`ChannelError::Connection`] if the port
    /// cannot be opened or fails mid-transfer. A failed link is dropped so
    /// the next query opens a fresh one.
    pub fn query_command(&self, command: &Command) -> Result<Vec<String>> {
        let mut guard = self.link.lock();

        let mut link = match guard.take() {
            Some(link) => link,
            None => self.connect()?,
        };

        let started = Instant::now();
        let outcome = self.exchange(&mut link, command);

        match &outcome {
            Ok(lines) => {
                debug!(
                    command = %command,
                    lines = lines.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Command answered"
                );
            }
            Err(ChannelError::Timeout { .. }) => {
                warn!(
                    device = self.device(),
                    command = %command,
                    "No response before command timeout"
                );
            }
            Err(e) => {
                warn!(device = self.device(), command = %command, error = %e, "Command failed");
            }
        }

        if outcome.as_ref().is_err_and(ChannelError::is_connection) {
            self.connected.store(false, Ordering::Release);
        } else {
            *guard = Some(link);
        }
        outcome
    }

    fn connect(&self) -> Result<C::Link> {
        let link = self.connector.open().map_err(|e| self.connection_error(e))?;
        self.connected.store(true, Ordering::Release);
        Ok(link)
    }

    fn exchange(&self, link: &mut C::Link, command: &Command) -> Result<Vec<String>> {
        link.discard_buffers().map_err(|e| self.connection_error(e))?;
        link.send(&command.encode()).map_err(|e| self.connection_error(e))?;
        trace!(command = %command, "Sent command");

        let mut framer = QuiescenceFramer::new(self.timing, Instant::now());
        while framer.poll(Instant::now()) != FrameState::Done {
            if let Some(line) = link.read_line().map_err(|e| self.connection_error(e))? {
                trace!(line = %line, "Received line");
                framer.on_line(line, Instant::now());
            }
        }

        let lines = framer.finish();
        if lines.is_empty() {
            return Err(ChannelError::Timeout {
                command: command.to_string(),
            });
        }
        Ok(lines)
    }

    fn connection_error(&self, source: io::Error) -> ChannelError {
        ChannelError::Connection {
            device: self.device().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ScriptedLine, SimulatedController};
    use std::time::Duration;

    fn timing() -> FrameTiming {
        FrameTiming::new(200, 40)
    }

    #[test]
    fn test_lazy_open() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), timing());

        assert!(!channel.is_connected());
        assert_eq!(sim.open_count(), 0);

        channel.query("PING").unwrap();
        channel.query("PING").unwrap();
        assert!(channel.is_connected());
        assert_eq!(sim.open_count(), 1);
    }

    #[test]
    fn test_reopen_after_close() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), timing());

        channel.query("A").unwrap();
        channel.close();
        assert!(!channel.is_connected());

        assert_eq!(channel.query("B").unwrap(), vec!["B"]);
        assert_eq!(sim.open_count(), 2);
    }

    #[test]
    fn test_command_is_trimmed_on_the_wire() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), timing());

        channel.query("  STATUS  ").unwrap();
        assert_eq!(sim.received(), vec!["STATUS"]);
    }

    #[test]
    fn test_invalid_command_not_sent() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), timing());

        let err = channel.query("MODE AUTO\nRESET ALL").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidCommand(_)));
        assert!(sim.received().is_empty());
        assert_eq!(sim.open_count(), 0);
    }

    #[test]
    fn test_timeout_names_command() {
        let sim = SimulatedController::silent();
        let channel = CommandChannel::new(sim, timing());

        let err = channel.query("STATUS").unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "no response for command: STATUS");
        // A timeout keeps the link.
        assert!(channel.is_connected());
    }

    #[test]
    fn test_open_failure_is_connection_error() {
        let sim = SimulatedController::echo();
        sim.set_available(false);
        let channel = CommandChannel::new(sim.clone(), timing());

        let err = channel.query("STATUS").unwrap_err();
        assert!(err.is_connection());
        assert!(!channel.is_connected());

        sim.set_available(true);
        assert_eq!(channel.query("STATUS").unwrap(), vec!["STATUS"]);
    }

    #[test]
    fn test_io_failure_drops_link() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), timing());

        channel.query("A").unwrap();
        sim.fail_next_read();

        let err = channel.query("B").unwrap_err();
        assert!(err.is_connection());
        assert!(!channel.is_connected());

        assert_eq!(channel.query("C").unwrap(), vec!["C"]);
        assert_eq!(sim.open_count(), 2);
    }

    #[test]
    fn test_ensure_open_sends_nothing() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), timing());

        channel.ensure_open().unwrap();
        channel.ensure_open().unwrap();
        assert!(channel.is_connected());
        assert_eq!(sim.open_count(), 1);
        assert!(sim.received().is_empty());

        // The query reuses the link opened above.
        assert_eq!(channel.query("PING").unwrap(), vec!["PING"]);
        assert_eq!(sim.open_count(), 1);
    }

    #[test]
    fn test_ensure_open_failure() {
        let sim = SimulatedController::silent();
        sim.set_available(false);
        let channel = CommandChannel::new(sim, timing());

        assert!(channel.ensure_open().unwrap_err().is_connection());
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_send_control_command() {
        let sim = SimulatedController::new(|cmd| {
            vec![ScriptedLine::new(Duration::ZERO, format!("OK {}", cmd))]
        });
        let channel = CommandChannel::new(sim.clone(), timing());

        let lines = channel
            .send(&ControlCommand::Mode(pomace_protocol::ControlMode::Off))
            .unwrap();
        assert_eq!(lines, vec!["OK MODE OFF"]);
    }
}
