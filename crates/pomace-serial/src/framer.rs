//! Quiescence framing for undelimited multi-line responses.
//!
//! The framer holds a rolling deadline. It starts at `now + command_timeout`
//! and moves to `now + tail_wait` every time a line arrives. The response is
//! complete once the deadline passes with no new line.
//!
//! ```text
//!   AwaitingFirstLine --line--> Draining --line--> Draining
//!          |                       |
//!      deadline                deadline
//!          v                       v
//!        Done (no lines)         Done (lines)
//! ```
//!
//! Time is passed in explicitly, so the policy can be exercised without a
//! real clock or a real device.

use std::time::Instant;

use crate::config::FrameTiming;

/// Framing progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Command sent, nothing received yet.
    AwaitingFirstLine,
    /// At least one line received; waiting out the tail.
    Draining,
    /// The rolling deadline passed with no new line.
    Done,
}

/// State machine that collects lines until the link goes quiet.
#[derive(Debug, Clone)]
pub struct QuiescenceFramer {
    timing: FrameTiming,
    state: FrameState,
    deadline: Instant,
    lines: Vec<String>,
}

impl QuiescenceFramer {
    /// Start framing a response to a command sent at `now`.
    pub fn new(timing: FrameTiming, now: Instant) -> Self {
        QuiescenceFramer {
            timing,
            state: FrameState::AwaitingFirstLine,
            deadline: now + timing.command_timeout(),
            lines: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Current rolling deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether framing has finished.
    pub fn is_done(&self) -> bool {
        self.state == FrameState::Done
    }

    /// Lines collected so far, in receive order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Check the rolling deadline at `now` and return the resulting state.
    ///
    /// Called after every read attempt, including empty ones.
    pub fn poll(&mut self, now: Instant) -> FrameState {
        if self.state != FrameState::Done && now >= self.deadline {
            self.state = FrameState::Done;
        }
        self.state
    }

    /// Record a line received at `now` and extend the deadline by the tail wait.
    ///
    /// Lines offered after the framer is done are ignored.
    pub fn on_line(&mut self, line: String, now: Instant) {
        if self.state == FrameState::Done {
            return;
        }
        self.lines.push(line);
        self.deadline = now + self.timing.tail_wait();
        self.state = FrameState::Draining;
    }

    /// Consume the framer, yielding the collected lines.
    pub fn finish(self) -> Vec<String> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timing() -> FrameTiming {
        FrameTiming::new(1600, 220)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_times_out_without_lines() {
        let t0 = Instant::now();
        let mut framer = QuiescenceFramer::new(timing(), t0);

        assert_eq!(framer.poll(t0 + ms(100)), FrameState::AwaitingFirstLine);
        assert_eq!(framer.poll(t0 + ms(1599)), FrameState::AwaitingFirstLine);
        assert_eq!(framer.poll(t0 + ms(1600)), FrameState::Done);
        assert!(framer.finish().is_empty());
    }

    #[test]
    fn test_first_line_switches_to_tail_wait() {
        let t0 = Instant::now();
        let mut framer = QuiescenceFramer::new(timing(), t0);

        framer.on_line("MODE=AUTO".to_string(), t0 + ms(50));
        assert_eq!(framer.state(), FrameState::Draining);
        assert_eq!(framer.deadline(), t0 + ms(270));

        assert_eq!(framer.poll(t0 + ms(269)), FrameState::Draining);
        assert_eq!(framer.poll(t0 + ms(270)), FrameState::Done);
        assert_eq!(framer.finish(), vec!["MODE=AUTO"]);
    }

    #[test]
    fn test_late_first_line_still_accepted() {
        let t0 = Instant::now();
        let mut framer = QuiescenceFramer::new(timing(), t0);

        assert_eq!(framer.poll(t0 + ms(1500)), FrameState::AwaitingFirstLine);
        framer.on_line("OK".to_string(), t0 + ms(1550));
        assert_eq!(framer.poll(t0 + ms(1700)), FrameState::Draining);
        assert_eq!(framer.poll(t0 + ms(1770)), FrameState::Done);
    }

    #[test]
    fn test_each_line_earns_another_tail() {
        let t0 = Instant::now();
        let mut framer = QuiescenceFramer::new(timing(), t0);

        // Lines 200ms apart run well past the command timeout in total.
        let mut now = t0;
        for i in 0..20 {
            now += ms(200);
            assert_ne!(framer.poll(now), FrameState::Done);
            framer.on_line(format!("LINE {}", i), now);
        }
        assert!(now > t0 + timing().command_timeout());
        assert_eq!(framer.poll(now + ms(220)), FrameState::Done);
        assert_eq!(framer.lines().len(), 20);
    }

    #[test]
    fn test_gap_longer_than_tail_ends_response() {
        let t0 = Instant::now();
        let mut framer = QuiescenceFramer::new(timing(), t0);

        framer.on_line("A".to_string(), t0 + ms(10));
        framer.on_line("B".to_string(), t0 + ms(20));
        assert_eq!(framer.poll(t0 + ms(300)), FrameState::Done);

        framer.on_line("C".to_string(), t0 + ms(400));
        assert_eq!(framer.finish(), vec!["A", "B"]);
    }
}
