//! JSON reports printed by the CLI.

use pomace_protocol::{Authority, ControlMode, ParsedStatus};
use serde::Serialize;

/// Result of a plain command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub lines: Vec<String>,
}

/// Control authority as shown to operators.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorityReport {
    pub app_full_control: bool,
    pub required_mode_for_full_control: &'static str,
    pub effective_mode: String,
    pub note: &'static str,
}

impl From<Authority> for AuthorityReport {
    fn from(authority: Authority) -> Self {
        AuthorityReport {
            app_full_control: authority.full_control,
            required_mode_for_full_control: Authority::REQUIRED_MODE.as_str(),
            effective_mode: authority.effective_mode,
            note: "Panel selector decides effective mode. Full remote authority requires REMOTE.",
        }
    }
}

/// Parsed status with authority.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub status: ParsedStatus,
    pub authority: AuthorityReport,
}

impl StatusReport {
    pub fn new(status: ParsedStatus) -> Self {
        let authority = status.authority().into();
        StatusReport {
            ok: true,
            timestamp: None,
            status,
            authority,
        }
    }

    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(chrono::Local::now().to_rfc3339());
        self
    }
}

/// Result of a mode change, with the mode the controller actually took.
#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    #[serde(flatten)]
    pub command: CommandReport,
    pub requested_mode: ControlModeName,
    pub effective_mode: String,
    pub full_app_control: bool,
}

/// Serializes a [`ControlMode`] as its keyword.
#[derive(Debug, Clone, Copy)]
pub struct ControlModeName(pub ControlMode);

impl Serialize for ControlModeName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

/// Bridge health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub serial_port: String,
    pub serial_baud: u32,
    pub serial_connected: bool,
}
