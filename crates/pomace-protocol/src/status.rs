//! Status parsing for controller responses.
//!
//! The `STATUS` dump is free text. Two line shapes carry structured data:
//! - Summary: `MODE=<value> [KEY=<value> ...]`
//! - Motor record: `MOTOR <NAME> ON=<0|1> FAULT=<0|1> RECOVERY=<0|1>`
//!
//! Parsing is total. Lines that do not fit a shape are left out of the
//! structured fields but always kept in [`ParsedStatus::raw`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commands::ControlMode;

/// Prefix identifying the summary line.
pub const SUMMARY_PREFIX: &str = "MODE=";

/// Prefix identifying a motor record line.
pub const MOTOR_PREFIX: &str = "MOTOR ";

/// Minimum whitespace-separated tokens in a well-formed motor record.
pub const MOTOR_MIN_TOKENS: usize = 5;

/// `KEY=VALUE` pairs on the summary line.
static SUMMARY_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z_]+)=([^ ]+)").expect("Invalid summary pair regex"));

/// A scalar value coerced from a status token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// Get the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the value as text, if it stayed a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Str(s) => f.write_str(s),
        }
    }
}

/// Coerce a raw status token into a scalar.
///
/// Precedence, first match wins:
/// 1. `"0"` / `"1"` → boolean
/// 2. base-10 integer → integer
/// 3. floating point → float
/// 4. anything else → the token unchanged
///
/// Numbers may use `_` between digits as a separator (`1_000`).
///
/// Integers are stored as `i64`. One outside that range is narrowed to the
/// nearest `f64`, so digits beyond 53 bits of precision are lost:
/// `99999999999999999999` becomes `1e20`.
pub fn coerce_scalar(token: &str) -> ScalarValue {
    match token {
        "0" => return ScalarValue::Bool(false),
        "1" => return ScalarValue::Bool(true),
        _ => {}
    }
    if let Some(number) = strip_digit_separators(token) {
        if let Ok(i) = number.parse::<i64>() {
            return ScalarValue::Int(i);
        }
        if let Ok(f) = number.parse::<f64>() {
            return ScalarValue::Float(f);
        }
    }
    ScalarValue::Str(token.to_string())
}

/// Remove `_` digit separators. `None` if a separator is not between two digits.
fn strip_digit_separators(token: &str) -> Option<Cow<'_, str>> {
    if !token.contains('_') {
        return Some(Cow::Borrowed(token));
    }
    let bytes = token.as_bytes();
    let between_digits = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'_'
            || (i > 0
                && i + 1 < bytes.len()
                && bytes[i - 1].is_ascii_digit()
                && bytes[i + 1].is_ascii_digit())
    });
    between_digits.then(|| Cow::Owned(token.replace('_', "")))
}

/// Summary fields keyed by lower-cased key. Duplicate keys: last one wins.
pub type StatusSummary = BTreeMap<String, ScalarValue>;

/// State of a single motor from a `MOTOR` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorState {
    /// Motor name as reported (e.g. `SF`).
    pub name: String,
    /// Motor is running.
    pub on: bool,
    /// Motor has a latched fault.
    pub fault: bool,
    /// Motor is in anti-jam recovery.
    pub recovery: bool,
}

impl MotorState {
    /// Parse a motor record line.
    ///
    /// Returns `None` when the line has fewer than [`MOTOR_MIN_TOKENS`]
    /// tokens. Flags are taken by position (tokens 2, 3, 4), not by key.
    pub fn parse(line: &str) -> Option<MotorState> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MOTOR_MIN_TOKENS {
            return None;
        }
        Some(MotorState {
            name: parts[1].to_string(),
            on: flag(parts[2]),
            fault: flag(parts[3]),
            recovery: flag(parts[4]),
        })
    }
}

/// Interpret `KEY=1` as true and anything else as false.
fn flag(token: &str) -> bool {
    token.split_once('=').map_or(token, |(_, value)| value) == "1"
}

/// Who is in charge of the controller, derived from the summary mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    /// Mode the controller reports (empty if the summary had none).
    pub effective_mode: String,
    /// Whether the remote client has full control.
    pub full_control: bool,
}

impl Authority {
    /// Mode the panel selector must be in for full remote control.
    pub const REQUIRED_MODE: ControlMode = ControlMode::Remote;
}

/// Structured view of a status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatus {
    /// Summary fields from the `MODE=` line.
    pub summary: StatusSummary,
    /// Motor records in order of appearance.
    pub motors: Vec<MotorState>,
    /// Every response line, unfiltered.
    #[serde(rename = "lines")]
    pub raw: Vec<String>,
}

impl ParsedStatus {
    /// The reported mode as text.
    pub fn mode(&self) -> Option<String> {
        self.summary.get("mode").map(ToString::to_string)
    }

    /// Look up a motor by name.
    pub fn motor(&self, name: &str) -> Option<&MotorState> {
        self.motors.iter().find(|m| m.name == name)
    }

    /// Derive control authority from the reported mode.
    pub fn authority(&self) -> Authority {
        let effective_mode = self.mode().unwrap_or_default();
        let full_control = effective_mode == Authority::REQUIRED_MODE.as_str();
        Authority {
            effective_mode,
            full_control,
        }
    }
}

/// Why a line was left out of the structured fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Motor record with too few tokens.
    MotorTooShort {
        /// Tokens found on the line.
        tokens: usize,
    },
    /// Summary line without a single `KEY=VALUE` pair.
    SummaryWithoutPairs,
}

/// A status line that matched a prefix but not its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// Position in the response.
    pub index: usize,
    /// The line as received.
    pub line: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// What the parser left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseDiagnostics {
    /// Malformed summary or motor lines.
    pub skipped: Vec<SkippedLine>,
    /// Lines matching neither prefix.
    pub unrecognized: usize,
}

impl ParseDiagnostics {
    /// Whether any summary or motor line was malformed.
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Parse response lines into a structured status. Never fails.
pub fn parse<S: AsRef<str>>(lines: &[S]) -> ParsedStatus {
    parse_with_diagnostics(lines).0
}

/// Parse response lines and report which lines were left out.
pub fn parse_with_diagnostics<S: AsRef<str>>(lines: &[S]) -> (ParsedStatus, ParseDiagnostics) {
    let mut summary = StatusSummary::new();
    let mut motors = Vec::new();
    let mut diagnostics = ParseDiagnostics::default();

    for (index, line) in lines.iter().map(AsRef::as_ref).enumerate() {
        if line.starts_with(SUMMARY_PREFIX) {
            let mut pairs = 0;
            for caps in SUMMARY_PAIR.captures_iter(line) {
                summary.insert(caps[1].to_ascii_lowercase(), coerce_scalar(&caps[2]));
                pairs += 1;
            }
            if pairs == 0 {
                diagnostics.skip(index, line, SkipReason::SummaryWithoutPairs);
            }
            continue;
        }

        if line.starts_with(MOTOR_PREFIX) {
            match MotorState::parse(line) {
                Some(motor) => motors.push(motor),
                None => {
                    let tokens = line.split_whitespace().count();
                    diagnostics.skip(index, line, SkipReason::MotorTooShort { tokens });
                }
            }
            continue;
        }

        diagnostics.unrecognized += 1;
    }

    let status = ParsedStatus {
        summary,
        motors,
        raw: lines.iter().map(|l| l.as_ref().to_string()).collect(),
    };
    (status, diagnostics)
}

impl ParseDiagnostics {
    fn skip(&mut self, index: usize, line: &str, reason: SkipReason) {
        debug!(index, line, ?reason, "Skipping malformed status line");
        self.skipped.push(SkippedLine {
            index,
            line: line.to_string(),
            reason,
        });
    }
}
