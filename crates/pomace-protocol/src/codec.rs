//! Line-based codec for controller communication.
//!
//! Commands are a single line of ASCII terminated with `\n`. Responses are
//! `\n`-terminated lines decoded leniently: invalid UTF-8 is replaced rather
//! than rejected, surrounding whitespace (including a trailing `\r`) is
//! trimmed, and blank lines are dropped.

use bytes::BytesMut;

/// Maximum command length accepted by the controller's console buffer.
pub const MAX_COMMAND_LENGTH: usize = 64;

/// Line terminator used in both directions.
pub const LINE_TERMINATOR: u8 = b'\n';

/// A codec for reading controller response lines out of a byte stream.
///
/// Bytes arrive from the serial port in arbitrary chunks; the codec
/// accumulates them until a complete line is available.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete, non-blank line from the buffer.
    ///
    /// Returns `None` if no complete line is buffered. Blank lines are
    /// consumed and skipped.
    pub fn decode_line(&mut self) -> Option<String> {
        while let Some(end) = self.buffer.iter().position(|&b| b == LINE_TERMINATOR) {
            let raw = self.buffer.split_to(end + 1);
            if let Some(line) = decode_lossy(&raw[..end]) {
                return Some(line);
            }
        }
        None
    }

    /// Take whatever unterminated bytes remain in the buffer as a line.
    ///
    /// Used when a read times out part-way through a line: the partial line
    /// is surfaced as-is rather than held back.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = self.buffer.split();
        decode_lossy(&raw)
    }

    /// Encode a command for transmission.
    ///
    /// The text is trimmed, any non-ASCII characters are dropped, and the
    /// newline terminator is appended.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let cmd = cmd.trim();
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend(cmd.bytes().filter(u8::is_ascii));
        buf.push(LINE_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Decode a raw line, replacing invalid sequences. Returns `None` for blank lines.
fn decode_lossy(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let encoded = LineCodec::encode_command("  STATUS ");
        assert_eq!(encoded, b"STATUS\n");
    }

    #[test]
    fn test_encode_drops_non_ascii() {
        let encoded = LineCodec::encode_command("FAN 4é2");
        assert_eq!(encoded, b"FAN 42\n");
    }

    #[test]
    fn test_decode_line() {
        let mut codec = LineCodec::new();
        codec.push(b"MODE=AUTO\r\nMOTOR SF ON=1 FAULT=0 RECOVERY=0\n");

        assert_eq!(codec.decode_line(), Some("MODE=AUTO".to_string()));
        assert_eq!(
            codec.decode_line(),
            Some("MOTOR SF ON=1 FAULT=0 RECOVERY=0".to_string())
        );
        assert!(codec.decode_line().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new();
        codec.push(b"MODE=");

        assert!(codec.decode_line().is_none());

        codec.push(b"OFF\n");
        assert_eq!(codec.decode_line(), Some("MODE=OFF".to_string()));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = LineCodec::new();
        codec.push(b"\n  \r\n\nOK\n");

        assert_eq!(codec.decode_line(), Some("OK".to_string()));
        assert!(codec.decode_line().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new();
        codec.push(b"TEMP=\xff60\n");

        let line = codec.decode_line().unwrap();
        assert!(line.starts_with("TEMP="));
        assert!(line.ends_with("60"));
        assert!(line.contains('\u{FFFD}'));
    }

    #[test]
    fn test_take_partial() {
        let mut codec = LineCodec::new();
        codec.push(b"DONE\nTRUNC");

        assert_eq!(codec.decode_line(), Some("DONE".to_string()));
        assert_eq!(codec.take_partial(), Some("TRUNC".to_string()));
        assert!(codec.take_partial().is_none());
    }

    #[test]
    fn test_clear() {
        let mut codec = LineCodec::new();
        codec.push(b"stale output\n");
        codec.clear();

        assert_eq!(codec.buffered_len(), 0);
        assert!(codec.decode_line().is_none());
    }
}
