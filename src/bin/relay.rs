//! Relay CLI - Command-line interface for Synheart Relay
//!
//! Commands:
//! - replay: Run recorded change notifications through the relay
//! - encode: Encode a single vitals sample into an envelope
//! - doctor: Diagnose relay configuration

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use synheart_relay::channel::{ChannelBridge, RecordingChannel};
use synheart_relay::schema::JsonEventBuffer;
use synheart_relay::{
    DataListener, RelayConfig, RelayError, VitalsRelay, VitalsSample, PRODUCER_NAME,
    RELAY_VERSION, SENTINEL,
};

/// Relay - Forward live wearable vitals into a host channel
#[derive(Parser)]
#[command(name = "relay")]
#[command(author = "Synheart AI Inc")]
#[command(version = RELAY_VERSION)]
#[command(about = "Relay live wearable vitals to a host channel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run recorded change notifications through the relay
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Relay configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replay with no channel bound
        #[arg(long)]
        unbound: bool,

        /// Bind a channel whose remote end rejects every dispatch
        #[arg(long, conflicts_with = "unbound")]
        fail_dispatch: bool,
    },

    /// Encode a single vitals sample into an envelope
    Encode {
        /// Heart rate (bpm)
        #[arg(long, default_value_t = SENTINEL, allow_hyphen_values = true)]
        heart_rate: i32,

        /// SpO2 (percent)
        #[arg(long, default_value_t = SENTINEL, allow_hyphen_values = true)]
        spo2: i32,

        /// Systolic blood pressure (mmHg)
        #[arg(long, default_value_t = SENTINEL, allow_hyphen_values = true)]
        bp_systolic: i32,

        /// Diastolic blood pressure (mmHg)
        #[arg(long, default_value_t = SENTINEL, allow_hyphen_values = true)]
        bp_diastolic: i32,

        /// Relay configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Diagnose relay configuration
    Doctor {
        /// Relay configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Detect from the first character
    Auto,
    /// Newline-delimited JSON (one notification per line)
    Ndjson,
    /// JSON array of notifications
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RelayCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            config,
            unbound,
            fail_dispatch,
        } => cmd_replay(
            &input,
            input_format,
            config.as_deref(),
            unbound,
            fail_dispatch,
        ),

        Commands::Encode {
            heart_rate,
            spo2,
            bp_systolic,
            bp_diastolic,
            config,
        } => cmd_encode(
            VitalsSample::new(heart_rate, spo2, bp_systolic, bp_diastolic),
            config.as_deref(),
        ),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<RelayConfig, RelayCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            debug!(path = %path.display(), "loading relay config");
            Ok(RelayConfig::from_json(&json)?)
        }
        None => Ok(RelayConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, RelayCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    unbound: bool,
    fail_dispatch: bool,
) -> Result<(), RelayCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;

    let mut buffer = match input_format {
        InputFormat::Auto => JsonEventBuffer::parse(&input_data)?,
        InputFormat::Ndjson => JsonEventBuffer::from_ndjson(&input_data),
        InputFormat::Json => JsonEventBuffer::from_array(&input_data)?,
    };

    let bridge = Arc::new(ChannelBridge::new());
    let channel = Arc::new(RecordingChannel::new(&config.channel_name));
    if !unbound {
        channel.set_failing(fail_dispatch);
        bridge.rebind(channel.clone());
    }

    let relay = VitalsRelay::with_config(bridge, config);
    let report = relay.on_data_changed(&mut buffer);
    info!(
        received = report.received,
        forwarded = report.forwarded,
        "replay finished"
    );

    let mut stdout = io::stdout();
    for dispatch in channel.dispatches() {
        writeln!(stdout, "{}", serde_json::to_string(&dispatch)?)?;
    }
    stdout.flush()?;

    eprintln!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_encode(sample: VitalsSample, config: Option<&Path>) -> Result<(), RelayCliError> {
    let config = load_config(config)?;
    let relay = VitalsRelay::with_config(Arc::new(ChannelBridge::new()), config);
    let envelope = relay.envelope(&sample);

    println!("{}", serde_json::to_string(&envelope)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), RelayCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "relay_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Relay version {}", RELAY_VERSION),
    });

    let resolved = match config {
        Some(path) if !path.exists() => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Config file {} does not exist", path.display()),
            });
            None
        }
        Some(path) => match load_config(Some(path)) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config file {} valid", path.display()),
                });
                Some(config)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", CliError::from(e).message),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "No config file given; using defaults".to_string(),
            });
            Some(RelayConfig::default())
        }
    };

    if let Some(config) = &resolved {
        checks.push(DoctorCheck {
            name: "channel".to_string(),
            status: CheckStatus::Ok,
            message: format!("Channel {} method {}", config.channel_name, config.method),
        });
        checks.push(DoctorCheck {
            name: "vitals_path".to_string(),
            status: CheckStatus::Ok,
            message: format!("Listening for changes to {}", config.vitals_path),
        });
    }

    // stdin matters for `replay -i -`
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: RELAY_VERSION.to_string(),
        healthy: checks.iter().all(|c| c.status != CheckStatus::Error),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} {}", report.producer, report.version);
        for check in &report.checks {
            let marker = match check.status {
                CheckStatus::Ok => "ok",
                CheckStatus::Warning => "warn",
                CheckStatus::Error => "error",
            };
            println!("  [{}] {}: {}", marker, check.name, check.message);
        }
    }

    if report.healthy {
        Ok(())
    } else {
        Err(RelayCliError::DoctorFailed)
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    healthy: bool,
    checks: Vec<DoctorCheck>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
enum RelayCliError {
    Io(io::Error),
    Relay(RelayError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for RelayCliError {
    fn from(e: io::Error) -> Self {
        RelayCliError::Io(e)
    }
}

impl From<RelayError> for RelayCliError {
    fn from(e: RelayError) -> Self {
        RelayCliError::Relay(e)
    }
}

impl From<serde_json::Error> for RelayCliError {
    fn from(e: serde_json::Error) -> Self {
        RelayCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl From<RelayCliError> for CliError {
    fn from(e: RelayCliError) -> Self {
        match e {
            RelayCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RelayCliError::Relay(RelayError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'relay doctor --config <file>' for details".to_string()),
            },
            RelayCliError::Relay(e) => CliError {
                code: "RELAY_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input is a JSON array or NDJSON of notifications".to_string()),
            },
            RelayCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RelayCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}
