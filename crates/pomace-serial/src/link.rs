//! Byte-level link to the controller.
//!
//! [`Connector`] opens a [`Link`]; the channel calls it lazily and again
//! after the link has been closed or failed. [`SerialConnector`] is the real
//! port; tests use [`crate::sim::SimulatedController`].

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use pomace_protocol::LineCodec;
use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use crate::config::SerialSettings;

/// An open, line-oriented connection to the controller.
pub trait Link: Send {
    /// Drop anything buffered in either direction.
    fn discard_buffers(&mut self) -> io::Result<()>;

    /// Write bytes and flush them to the device.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read one line, waiting no longer than the link's read timeout.
    ///
    /// Returns `Ok(None)` if nothing arrived. A line left unterminated
    /// when the timeout expires is returned as-is.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Opens links to a named device.
pub trait Connector: Send + Sync {
    /// The link type this connector produces.
    type Link: Link;

    /// Device name, for logs and errors.
    fn device(&self) -> &str;

    /// Open a new link.
    fn open(&self) -> io::Result<Self::Link>;
}

/// Opens the controller's serial port.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    settings: SerialSettings,
}

impl SerialConnector {
    /// Create a connector for the given port settings.
    pub fn new(settings: SerialSettings) -> Self {
        SerialConnector { settings }
    }

    /// Port settings.
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn device(&self) -> &str {
        &self.settings.port
    }

    fn open(&self) -> io::Result<SerialLink> {
        let port = serialport::new(&self.settings.port, self.settings.baud)
            .timeout(self.settings.read_timeout())
            .open()?;
        debug!(
            port = %self.settings.port,
            baud = self.settings.baud,
            "Opened serial port"
        );
        Ok(SerialLink::new(port, self.settings.read_timeout()))
    }
}

/// A serial port with a line codec on the receive side.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    codec: LineCodec,
    read_timeout: Duration,
}

impl SerialLink {
    /// Wrap an already-open port.
    pub fn new(port: Box<dyn SerialPort>, read_timeout: Duration) -> Self {
        SerialLink {
            port,
            codec: LineCodec::new(),
            read_timeout,
        }
    }
}

impl Link for SerialLink {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.codec.clear();
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.codec.decode_line() {
            return Ok(Some(line));
        }

        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    self.codec.push(&buf[..n]);
                    if let Some(line) = self.codec.decode_line() {
                        return Ok(Some(line));
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Ok(self.codec.take_partial());
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serialport::TTYPort;
    use std::thread;

    const LINK_READ_TIMEOUT: Duration = Duration::from_millis(60);
    const SETTLE: Duration = Duration::from_millis(30);

    /// A link on the slave side of a pty pair, plus the master end to
    /// play the controller.
    fn pty_link() -> (TTYPort, SerialLink) {
        let (master, mut slave) = TTYPort::pair().expect("failed to open pty pair");
        slave.set_timeout(Duration::from_millis(10)).unwrap();
        (master, SerialLink::new(Box::new(slave), LINK_READ_TIMEOUT))
    }

    fn write(master: &mut TTYPort, bytes: &[u8]) {
        master.write_all(bytes).unwrap();
        master.flush().unwrap();
        thread::sleep(SETTLE);
    }

    #[test]
    fn test_read_lines_then_partial() {
        let (mut master, mut link) = pty_link();
        write(&mut master, b"A\r\nB\nPART");

        assert_eq!(link.read_line().unwrap(), Some("A".to_string()));
        assert_eq!(link.read_line().unwrap(), Some("B".to_string()));

        let start = Instant::now();
        assert_eq!(link.read_line().unwrap(), Some("PART".to_string()));
        assert!(start.elapsed() >= LINK_READ_TIMEOUT);

        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_times_out_quietly() {
        let (_master, mut link) = pty_link();
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_discard_clears_codec_and_port() {
        let (mut master, mut link) = pty_link();
        write(&mut master, b"KEEP\nHALF");
        assert_eq!(link.read_line().unwrap(), Some("KEEP".to_string()));

        write(&mut master, b"STALE\n");
        link.discard_buffers().unwrap();
        assert_eq!(link.read_line().unwrap(), None);

        write(&mut master, b"FRESH\n");
        assert_eq!(link.read_line().unwrap(), Some("FRESH".to_string()));
    }

    #[test]
    fn test_send_reaches_device() {
        let (mut master, mut link) = pty_link();
        master.set_timeout(Duration::from_millis(200)).unwrap();

        link.send(b"STATUS\n").unwrap();

        let mut buf = [0u8; 16];
        let n = master.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"STATUS\n");
    }
}
