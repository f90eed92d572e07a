//! Commands that can be sent to the boiler controller.
//!
//! [`Command`] is the validated wire form: one trimmed line of bounded
//! length. [`ControlCommand`] builds the commands the controller console
//! understands:
//! - Operating mode, thermostat, flame, stage and fan overrides
//! - Per-motor overrides and anti-jam pulses
//! - Fault resets
//! - Status dump and raw console text

use std::fmt;
use std::str::FromStr;

use crate::codec::{LineCodec, MAX_COMMAND_LENGTH};
use crate::error::{ProtocolError, ProtocolResult};

/// A single command line, trimmed and validated.
///
/// Immutable once built; the text never contains a line break and never
/// exceeds [`MAX_COMMAND_LENGTH`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Validate and wrap command text.
    pub fn new(text: &str) -> ProtocolResult<Command> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProtocolError::EmptyCommand);
        }
        if text.contains(['\r', '\n']) {
            return Err(ProtocolError::MultiLineCommand);
        }
        if text.len() > MAX_COMMAND_LENGTH {
            return Err(ProtocolError::CommandTooLong {
                max: MAX_COMMAND_LENGTH,
                actual: text.len(),
            });
        }
        Ok(Command(text.to_string()))
    }

    /// The command text without the terminator.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode the command as the bytes to send (including the `\n` terminator).
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.0)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Command> {
        Command::new(s)
    }
}

/// Declares a keyword enum with its wire spelling and a case-insensitive parser.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All values, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Get the keyword used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> ProtocolResult<$name> {
                let candidate = s.trim().to_ascii_uppercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == candidate)
                    .ok_or_else(|| ProtocolError::InvalidSetting {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum! {
    /// Controller operating mode.
    ControlMode, "mode", {
        /// Controller runs its own schedule.
        Auto => "AUTO",
        /// Controller is shut down.
        Off => "OFF",
        /// Remote client has full control.
        Remote => "REMOTE",
    }
}

keyword_enum! {
    /// Thermostat demand override.
    ThermostatState, "thermostat", {
        Auto => "AUTO",
        Off => "0",
        On => "1",
    }
}

keyword_enum! {
    /// Flame override.
    FlameState, "flame", {
        Auto => "AUTO",
        On => "ON",
    }
}

keyword_enum! {
    /// Firing stage override.
    StageSetting, "stage", {
        Auto => "AUTO",
        Idle => "0",
        Low => "1",
        Medium => "2",
        High => "3",
    }
}

keyword_enum! {
    /// Per-motor drive override.
    MotorDrive, "motor state", {
        On => "ON",
        Off => "OFF",
        Auto => "AUTO",
    }
}

/// Motors known to the controller, named by their panel stall-input labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorName {
    Sf,
    Ph,
    Pwh,
    Sb,
    Fsg,
    Fc,
    Storage,
    Crusher,
}

impl MotorName {
    /// All motors in controller order.
    pub const ALL: &'static [MotorName] = &[
        MotorName::Sf,
        MotorName::Ph,
        MotorName::Pwh,
        MotorName::Sb,
        MotorName::Fsg,
        MotorName::Fc,
        MotorName::Storage,
        MotorName::Crusher,
    ];

    /// Get the motor name used in commands and status lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MotorName::Sf => "SF",
            MotorName::Ph => "PH",
            MotorName::Pwh => "PWH",
            MotorName::Sb => "SB",
            MotorName::Fsg => "FSG",
            MotorName::Fc => "FC",
            MotorName::Storage => "STORAGE",
            MotorName::Crusher => "CRUSHER",
        }
    }
}

impl FromStr for MotorName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<MotorName> {
        let candidate = s.trim().to_ascii_uppercase();
        MotorName::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == candidate)
            .ok_or_else(|| ProtocolError::InvalidMotor(s.to_string()))
    }
}

impl fmt::Display for MotorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Targets accepted by the `RESET` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetTarget {
    /// Clear every latched fault.
    All,
    /// Clear the safety chain latch.
    Safety,
    /// Clear boiler faults.
    Boiler,
    /// Clear a single motor's fault.
    Motor(MotorName),
}

impl ResetTarget {
    /// Get the target keyword used in commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetTarget::All => "ALL",
            ResetTarget::Safety => "SAFETY",
            ResetTarget::Boiler => "BOILER",
            ResetTarget::Motor(motor) => motor.as_str(),
        }
    }
}

impl FromStr for ResetTarget {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<ResetTarget> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(ResetTarget::All),
            "SAFETY" => Ok(ResetTarget::Safety),
            "BOILER" => Ok(ResetTarget::Boiler),
            other => other
                .parse::<MotorName>()
                .map(ResetTarget::Motor)
                .map_err(|_| ProtocolError::InvalidResetTarget(other.to_string())),
        }
    }
}

/// Fan power override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanSetting {
    /// Controller picks fan power from the firing stage.
    Auto,
    /// Fixed power in percent (0-100).
    Percent(u8),
}

impl FanSetting {
    /// Highest accepted fan percentage.
    pub const MAX_PERCENT: u8 = 100;
}

impl FromStr for FanSetting {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<FanSetting> {
        let value = s.trim().to_ascii_uppercase();
        if value == "AUTO" {
            return Ok(FanSetting::Auto);
        }
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidFanValue(s.to_string()));
        }
        match value.parse::<u32>() {
            Ok(percent) if percent <= u32::from(FanSetting::MAX_PERCENT) => {
                Ok(FanSetting::Percent(percent as u8))
            }
            _ => Err(ProtocolError::InvalidFanValue(s.to_string())),
        }
    }
}

/// Commands understood by the controller console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Dump the status summary and motor records.
    Status,

    /// Request an operating mode. The panel selector still decides the
    /// effective mode.
    Mode(ControlMode),

    /// Override thermostat demand.
    Thermostat(ThermostatState),

    /// Override the flame request.
    Flame(FlameState),

    /// Override the firing stage.
    Stage(StageSetting),

    /// Override fan power.
    Fan(FanSetting),

    /// Override a single motor.
    SetMotor {
        /// Motor to drive.
        motor: MotorName,
        /// Requested drive state.
        state: MotorDrive,
    },

    /// Run an anti-jam pulse sequence on a motor.
    Jam(MotorName),

    /// Clear latched faults.
    Reset(ResetTarget),

    /// Send raw console text.
    Raw(Command),
}

impl ControlCommand {
    /// Build a raw console command.
    ///
    /// Raw text is restricted to letters, digits, underscore and space.
    pub fn raw(text: &str) -> ProtocolResult<ControlCommand> {
        let command = Command::new(text)?;
        let safe = command
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b' ');
        if !safe {
            return Err(ProtocolError::UnsafeRawCommand(command.as_str().to_string()));
        }
        Ok(ControlCommand::Raw(command))
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            ControlCommand::Status => "STATUS".to_string(),
            ControlCommand::Mode(mode) => format!("MODE {}", mode),
            ControlCommand::Thermostat(state) => format!("THERMOSTAT {}", state),
            ControlCommand::Flame(state) => format!("FLAME {}", state),
            ControlCommand::Stage(stage) => format!("STAGE {}", stage),
            ControlCommand::Fan(FanSetting::Auto) => "FAN AUTO".to_string(),
            ControlCommand::Fan(FanSetting::Percent(p)) => format!("FAN {}", p),
            ControlCommand::SetMotor { motor, state } => format!("SET {} {}", motor, state),
            ControlCommand::Jam(motor) => format!("JAM {}", motor),
            ControlCommand::Reset(target) => format!("RESET {}", target.as_str()),
            ControlCommand::Raw(command) => command.as_str().to_string(),
        }
    }

    /// Encode into a validated command line.
    pub fn encode(&self) -> Command {
        // Every typed variant is short, single-line ASCII.
        Command(self.to_command_string())
    }
}

impl From<ControlCommand> for Command {
    fn from(cmd: ControlCommand) -> Command {
        cmd.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_trims() {
        let cmd = Command::new("  STATUS \t").unwrap();
        assert_eq!(cmd.as_str(), "STATUS");
        assert_eq!(cmd.encode(), b"STATUS\n");
    }

    #[test]
    fn test_command_rejects_empty() {
        assert_eq!(Command::new("   "), Err(ProtocolError::EmptyCommand));
    }

    #[test]
    fn test_command_rejects_newline() {
        assert_eq!(
            Command::new("MODE AUTO\nRESET ALL"),
            Err(ProtocolError::MultiLineCommand)
        );
    }

    #[test]
    fn test_command_length_bound() {
        let at_limit = "A".repeat(MAX_COMMAND_LENGTH);
        assert!(Command::new(&at_limit).is_ok());

        let too_long = "A".repeat(MAX_COMMAND_LENGTH + 1);
        assert_eq!(
            Command::new(&too_long),
            Err(ProtocolError::CommandTooLong {
                max: MAX_COMMAND_LENGTH,
                actual: MAX_COMMAND_LENGTH + 1,
            })
        );
    }

    #[test]
    fn test_encode_mode() {
        let cmd = ControlCommand::Mode(ControlMode::Remote);
        assert_eq!(cmd.encode().as_str(), "MODE REMOTE");
    }

    #[test]
    fn test_encode_thermostat_and_stage() {
        assert_eq!(
            ControlCommand::Thermostat(ThermostatState::On).to_command_string(),
            "THERMOSTAT 1"
        );
        assert_eq!(
            ControlCommand::Stage(StageSetting::Medium).to_command_string(),
            "STAGE 2"
        );
    }

    #[test]
    fn test_encode_set_motor() {
        let cmd = ControlCommand::SetMotor {
            motor: "crusher".parse().unwrap(),
            state: MotorDrive::Off,
        };
        assert_eq!(cmd.encode().encode(), b"SET CRUSHER OFF\n");
    }

    #[test]
    fn test_parse_fan() {
        assert_eq!("auto".parse::<FanSetting>(), Ok(FanSetting::Auto));
        assert_eq!(" 42 ".parse::<FanSetting>(), Ok(FanSetting::Percent(42)));
        assert_eq!("100".parse::<FanSetting>(), Ok(FanSetting::Percent(100)));
        assert!("101".parse::<FanSetting>().is_err());
        assert!("-5".parse::<FanSetting>().is_err());
        assert!("4.5".parse::<FanSetting>().is_err());
        assert_eq!(
            ControlCommand::Fan(FanSetting::Percent(7)).to_command_string(),
            "FAN 7"
        );
    }

    #[test]
    fn test_parse_motor_name() {
        assert_eq!(" pwh ".parse::<MotorName>(), Ok(MotorName::Pwh));
        assert_eq!(
            "XYZ".parse::<MotorName>(),
            Err(ProtocolError::InvalidMotor("XYZ".to_string()))
        );
    }

    #[test]
    fn test_parse_reset_target() {
        assert_eq!("safety".parse::<ResetTarget>(), Ok(ResetTarget::Safety));
        assert_eq!(
            "SB".parse::<ResetTarget>(),
            Ok(ResetTarget::Motor(MotorName::Sb))
        );
        assert_eq!(
            "nope".parse::<ResetTarget>(),
            Err(ProtocolError::InvalidResetTarget("NOPE".to_string()))
        );
        assert_eq!(
            ControlCommand::Reset(ResetTarget::Motor(MotorName::Fc)).to_command_string(),
            "RESET FC"
        );
    }

    #[test]
    fn test_parse_setting_keywords() {
        assert_eq!("remote".parse::<ControlMode>(), Ok(ControlMode::Remote));
        assert_eq!("0".parse::<ThermostatState>(), Ok(ThermostatState::Off));
        assert_eq!("On".parse::<FlameState>(), Ok(FlameState::On));
        assert!(matches!(
            "4".parse::<StageSetting>(),
            Err(ProtocolError::InvalidSetting { kind: "stage", .. })
        ));
    }

    #[test]
    fn test_raw_command() {
        let cmd = ControlCommand::raw(" DEBUG DUMP_1 ").unwrap();
        assert_eq!(cmd.to_command_string(), "DEBUG DUMP_1");

        assert!(matches!(
            ControlCommand::raw("MODE=AUTO"),
            Err(ProtocolError::UnsafeRawCommand(_))
        ));
        assert_eq!(ControlCommand::raw(""), Err(ProtocolError::EmptyCommand));
    }
}
