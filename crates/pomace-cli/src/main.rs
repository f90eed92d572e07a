//! `pomace` - command-line bridge to the Pomace boiler controller.
//!
//! Every subcommand prints one JSON document on stdout. `watch` prints one
//! compact document per poll until interrupted.

mod config;
mod error;
mod report;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use pomace_protocol::{
    parse_with_diagnostics, ControlCommand, ControlMode, FanSetting, FlameState, MotorDrive,
    MotorName, ResetTarget, StageSetting, ThermostatState,
};
use pomace_serial::{CommandChannel, Connector, SerialSettings};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::BridgeConfig;
use crate::error::CliError;
use crate::report::{CommandReport, ControlModeName, HealthReport, ModeReport, StatusReport};

#[derive(Parser, Debug)]
#[command(name = "pomace")]
#[command(about = "Serial bridge to the Pomace boiler controller", long_about = None)]
struct Cli {
    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial device, overrides config and environment
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate, overrides config and environment
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read and parse the controller status
    Status,
    /// Request a control mode (AUTO, OFF, REMOTE)
    Mode { mode: ControlMode },
    /// Thermostat override (AUTO, 0, 1)
    Thermostat { state: ThermostatState },
    /// Flame request (AUTO, ON)
    Flame { state: FlameState },
    /// Burner stage (AUTO, 0-3)
    Stage { stage: StageSetting },
    /// Fan output (AUTO or 0-100)
    Fan { value: FanSetting },
    /// Drive a motor output (ON, OFF, AUTO)
    Motor { motor: MotorName, state: MotorDrive },
    /// Run an anti-jam pulse sequence on a motor
    Jam { motor: MotorName },
    /// Clear faults (ALL, SAFETY, BOILER or a motor)
    Reset { target: ResetTarget },
    /// Send a raw command (letters, digits, underscores and spaces only)
    Raw {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// Poll status until interrupted
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "2000")]
        interval_ms: u64,
    },
    /// Report bridge connection health
    Health,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.serial.port = port;
    }
    if let Some(baud) = cli.baud {
        config.serial.baud = baud;
    }
    debug!(?config, "configuration loaded");

    let channel = CommandChannel::serial(&config.serial, config.timing);
    let result = execute(&channel, &config, cli.command);
    channel.close();
    result
}

fn execute(
    channel: &CommandChannel,
    config: &BridgeConfig,
    command: Commands,
) -> Result<(), CliError> {
    match command {
        Commands::Status => print_json(&read_status(channel)?),
        Commands::Mode { mode } => print_json(&set_mode(channel, mode)?),
        Commands::Thermostat { state } => run_command(channel, ControlCommand::Thermostat(state)),
        Commands::Flame { state } => run_command(channel, ControlCommand::Flame(state)),
        Commands::Stage { stage } => run_command(channel, ControlCommand::Stage(stage)),
        Commands::Fan { value } => run_command(channel, ControlCommand::Fan(value)),
        Commands::Motor { motor, state } => {
            run_command(channel, ControlCommand::SetMotor { motor, state })
        }
        Commands::Jam { motor } => run_command(channel, ControlCommand::Jam(motor)),
        Commands::Reset { target } => run_command(channel, ControlCommand::Reset(target)),
        Commands::Raw { words } => run_command(channel, ControlCommand::raw(&words.join(" "))?),
        Commands::Watch { interval_ms } => watch(channel, Duration::from_millis(interval_ms)),
        Commands::Health => print_json(&health(channel, &config.serial)),
    }
}

/// Open the port without sending a command and report whether that worked.
fn health<C: Connector>(channel: &CommandChannel<C>, serial: &SerialSettings) -> HealthReport {
    if let Err(e) = channel.ensure_open() {
        warn!(error = %e, "serial port unavailable");
    }
    HealthReport {
        ok: true,
        serial_port: serial.port.clone(),
        serial_baud: serial.baud,
        serial_connected: channel.is_connected(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn send(channel: &CommandChannel, command: &ControlCommand) -> Result<CommandReport, CliError> {
    let lines = channel.send(command)?;
    Ok(CommandReport {
        command: command.to_command_string(),
        lines,
    })
}

fn run_command(channel: &CommandChannel, command: ControlCommand) -> Result<(), CliError> {
    print_json(&send(channel, &command)?)
}

fn read_status(channel: &CommandChannel) -> Result<StatusReport, CliError> {
    let lines = channel.send(&ControlCommand::Status)?;
    let (status, diagnostics) = parse_with_diagnostics(&lines);
    if diagnostics.has_skipped() {
        warn!(skipped = diagnostics.skipped.len(), "status contained malformed lines");
    }
    Ok(StatusReport::new(status))
}

/// Request a mode, then read back the mode the panel actually allows.
fn set_mode(channel: &CommandChannel, mode: ControlMode) -> Result<ModeReport, CliError> {
    let command = send(channel, &ControlCommand::Mode(mode))?;
    let authority = read_status(channel)?.status.authority();
    if authority.effective_mode != mode.as_str() {
        info!(
            requested = mode.as_str(),
            effective = %authority.effective_mode,
            "controller did not take requested mode"
        );
    }
    Ok(ModeReport {
        command,
        requested_mode: ControlModeName(mode),
        effective_mode: authority.effective_mode,
        full_app_control: authority.full_control,
    })
}

#[derive(Serialize)]
struct WatchError {
    ok: bool,
    timestamp: String,
    error: String,
}

fn watch(channel: &CommandChannel, interval: Duration) -> Result<(), CliError> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    info!(interval_ms = interval.as_millis() as u64, "watching status");
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        match read_status(channel) {
            Ok(report) => println!("{}", serde_json::to_string(&report.stamped())?),
            Err(CliError::Channel(e)) => {
                warn!(error = %e, "status poll failed");
                let line = WatchError {
                    ok: false,
                    timestamp: chrono::Local::now().to_rfc3339(),
                    error: e.to_string(),
                };
                println!("{}", serde_json::to_string(&line)?);
            }
            Err(e) => return Err(e),
        }

        let next = started + interval;
        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= next {
                break;
            }
            thread::sleep((next - now).min(Duration::from_millis(50)));
        }
    }
    info!("watch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomace_serial::sim::SimulatedController;
    use pomace_serial::FrameTiming;

    #[test]
    fn test_health_opens_port_without_command() {
        let sim = SimulatedController::echo();
        let channel = CommandChannel::new(sim.clone(), FrameTiming::default());
        let serial = SerialSettings::new("/dev/ttyACM0");

        let report = health(&channel, &serial);
        assert!(report.ok);
        assert!(report.serial_connected);
        assert_eq!(report.serial_port, "/dev/ttyACM0");
        assert_eq!(report.serial_baud, 115_200);
        assert_eq!(sim.open_count(), 1);
        assert!(sim.received().is_empty());
    }

    #[test]
    fn test_health_reports_unavailable_port() {
        let sim = SimulatedController::echo();
        sim.set_available(false);
        let channel = CommandChannel::new(sim, FrameTiming::default());

        let report = health(&channel, &SerialSettings::default());
        assert!(report.ok);
        assert!(!report.serial_connected);
    }

    #[test]
    fn test_parse_motor_command() {
        let cli = Cli::parse_from(["pomace", "motor", "crusher", "off"]);
        match cli.command {
            Commands::Motor { motor, state } => {
                assert_eq!(motor, MotorName::Crusher);
                assert_eq!(state, MotorDrive::Off);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["pomace", "status", "--port", "/dev/ttyACM1", "-vv"]);
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_parse_fan_and_reset() {
        let cli = Cli::parse_from(["pomace", "fan", "55"]);
        assert!(matches!(cli.command, Commands::Fan { value: FanSetting::Percent(55) }));

        let cli = Cli::parse_from(["pomace", "reset", "fc"]);
        assert!(matches!(
            cli.command,
            Commands::Reset { target: ResetTarget::Motor(MotorName::Fc) }
        ));
    }

    #[test]
    fn test_rejects_out_of_range_fan() {
        assert!(Cli::try_parse_from(["pomace", "fan", "150"]).is_err());
    }

    #[test]
    fn test_watch_default_interval() {
        let cli = Cli::parse_from(["pomace", "watch"]);
        assert!(matches!(cli.command, Commands::Watch { interval_ms: 2000 }));
    }

    #[test]
    fn test_raw_words_joined() {
        let cli = Cli::parse_from(["pomace", "raw", "SET", "FC", "ON"]);
        match cli.command {
            Commands::Raw { words } => {
                let command = ControlCommand::raw(&words.join(" ")).unwrap();
                assert_eq!(command.to_command_string(), "SET FC ON");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
