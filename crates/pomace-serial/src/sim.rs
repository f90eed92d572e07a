//! Simulated controller for exercising the channel without hardware.
//!
//! The simulator answers each command with a scripted burst of lines. Each
//! line has a delay relative to the previous one (the first relative to the
//! moment the command was written), so tests can control exactly when the
//! link goes quiet. Bytes become visible to the reader only once their
//! delay has elapsed, as on a real port.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pomace_protocol::LineCodec;

use crate::link::{Connector, Link};

/// One line of scripted controller output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedLine {
    /// Delay after the previous line (or after the command for the first line).
    pub delay: Duration,
    /// Bytes put on the wire.
    pub bytes: Vec<u8>,
}

impl ScriptedLine {
    /// A text line; the `\n` terminator is appended.
    pub fn new(delay: Duration, text: impl Into<String>) -> Self {
        let mut bytes = text.into().into_bytes();
        bytes.push(b'\n');
        ScriptedLine { delay, bytes }
    }

    /// Raw bytes, sent exactly as given.
    pub fn raw(delay: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        ScriptedLine {
            delay,
            bytes: bytes.into(),
        }
    }
}

type Responder = dyn Fn(&str) -> Vec<ScriptedLine> + Send + Sync;

struct Shared {
    responder: Box<Responder>,
    pending: Mutex<VecDeque<(Instant, Vec<u8>)>>,
    received: Mutex<Vec<String>>,
    available: AtomicBool,
    fail_next_read: AtomicBool,
    opens: AtomicUsize,
}

/// A scripted stand-in for the controller, usable as a [`Connector`].
///
/// Clones share the same device state, so a test can keep a handle while
/// the channel owns another.
#[derive(Clone)]
pub struct SimulatedController {
    shared: Arc<Shared>,
    read_timeout: Duration,
}

impl SimulatedController {
    /// Default per-read timeout of simulated links.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5);

    /// Create a controller that answers each command via `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Vec<ScriptedLine> + Send + Sync + 'static,
    {
        SimulatedController {
            shared: Arc::new(Shared {
                responder: Box::new(responder),
                pending: Mutex::new(VecDeque::new()),
                received: Mutex::new(Vec::new()),
                available: AtomicBool::new(true),
                fail_next_read: AtomicBool::new(false),
                opens: AtomicUsize::new(0),
            }),
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }

    /// A controller that immediately echoes each command back as one line.
    pub fn echo() -> Self {
        SimulatedController::new(|cmd| vec![ScriptedLine::new(Duration::ZERO, cmd)])
    }

    /// A controller that never answers.
    pub fn silent() -> Self {
        SimulatedController::new(|_| Vec::new())
    }

    /// A controller that answers every command with the same lines, `gap` apart.
    pub fn scripted<I, S>(lines: I, gap: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        SimulatedController::new(move |_| {
            lines
                .iter()
                .map(|line| ScriptedLine::new(gap, line.clone()))
                .collect()
        })
    }

    /// Set the per-read timeout of links opened from now on.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Make opening succeed or fail.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Make the next read on any link fail with an I/O error.
    pub fn fail_next_read(&self) {
        self.shared.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Number of links opened so far.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Commands received so far, in order, without terminators.
    pub fn received(&self) -> Vec<String> {
        self.shared.received.lock().clone()
    }
}

impl Connector for SimulatedController {
    type Link = SimulatedLink;

    fn device(&self) -> &str {
        "sim"
    }

    fn open(&self) -> io::Result<SimulatedLink> {
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "simulated controller unavailable",
            ));
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedLink {
            shared: self.shared.clone(),
            codec: LineCodec::new(),
            read_timeout: self.read_timeout,
        })
    }
}

/// Link to a [`SimulatedController`].
pub struct SimulatedLink {
    shared: Arc<Shared>,
    codec: LineCodec,
    read_timeout: Duration,
}

impl SimulatedLink {
    /// Move every chunk whose delay has elapsed into the codec.
    /// Returns when the next chunk is due, if any.
    fn arrive(&mut self, now: Instant) -> Option<Instant> {
        let mut pending = self.shared.pending.lock();
        while let Some((due, _)) = pending.front() {
            if *due > now {
                return Some(*due);
            }
            if let Some((_, bytes)) = pending.pop_front() {
                self.codec.push(&bytes);
            }
        }
        None
    }
}

impl Link for SimulatedLink {
    fn discard_buffers(&mut self) -> io::Result<()> {
        let now = Instant::now();
        self.shared.pending.lock().retain(|(due, _)| *due > now);
        self.codec.clear();
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let command = String::from_utf8_lossy(data).trim_end().to_string();
        let script = (self.shared.responder)(&command);
        self.shared.received.lock().push(command);

        let mut due = Instant::now();
        let mut pending = self.shared.pending.lock();
        for line in script {
            due += line.delay;
            pending.push_back((due, line.bytes));
        }
        pending.make_contiguous().sort_by_key(|(due, _)| *due);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.shared.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated read failure",
            ));
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            let now = Instant::now();
            let next_due = self.arrive(now);
            if let Some(line) = self.codec.decode_line() {
                return Ok(Some(line));
            }
            if now >= deadline {
                return Ok(self.codec.take_partial());
            }
            let wake = next_due.map_or(deadline, |due| due.min(deadline));
            thread::sleep(wake.saturating_duration_since(now));
        }
    }
}
