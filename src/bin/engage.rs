//! Engage CLI - Command-line interface for Folio Engage
//!
//! Commands:
//! - replay: Score a recorded page view (batch mode)
//! - run: Score visibility events streamed on stdin (streaming mode)
//! - validate: Validate a visibility event stream
//! - schema: Describe input and output formats
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use folio_engage::adapter::{
    last_event_time, parse_events_array, parse_events_ndjson, parse_session, replay,
    validate_events,
};
use folio_engage::encoder::{ReportEncoder, REPORT_VERSION};
use folio_engage::{
    EngagementError, EngagementReport, EngagementTracker, Millis, ScoringConfig,
    VisibilityEvent, VisibilitySession, ENGAGE_VERSION, PRODUCER_NAME,
};

/// Engage - Section engagement tracking for portfolio sites
#[derive(Parser)]
#[command(name = "engage")]
#[command(version = ENGAGE_VERSION)]
#[command(about = "Turn section visibility events into engagement scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a recorded page view (batch mode)
    Replay {
        /// Session file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Evaluation time in ms (defaults to the last event)
        #[arg(long)]
        now: Option<Millis>,

        /// Scoring config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Score visibility events streamed on stdin (streaming mode)
    Run {
        /// Comma-separated section identifiers, in page order
        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,

        /// Scoring config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print a snapshot line after every event
        #[arg(long)]
        emit_every: bool,

        /// Evaluation time in ms for the final report (defaults to the last event)
        #[arg(long)]
        now: Option<Millis>,
    },

    /// Validate a visibility event stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check scoring config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (visibility session and events)
    Input,
    /// Output schema (engagement report)
    Output,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
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

fn run(cli: Cli) -> Result<(), EngageCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            now,
            config,
            output_format,
        } => cmd_replay(&input, &output, now, config.as_deref(), output_format),

        Commands::Run {
            sections,
            config,
            emit_every,
            now,
        } => cmd_run(sections, config.as_deref(), emit_every, now),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, EngageCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<ScoringConfig, EngageCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            let config = ScoringConfig::from_json(&json)?;
            debug!(path = %path.display(), "loaded scoring config");
            Ok(config)
        }
        None => Ok(ScoringConfig::default()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    now: Option<Millis>,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), EngageCliError> {
    let config = load_config(config)?;
    let session = parse_session(&read_input(input)?)?;
    let report = replay_report(&session, config, now)?;

    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
        info!(path = %output.display(), score = report.snapshot.score, "report written");
    }

    Ok(())
}

/// Score a recorded page view. A session with no sections scores 0.
fn replay_report(
    session: &VisibilitySession,
    config: ScoringConfig,
    now: Option<Millis>,
) -> Result<EngagementReport, EngagementError> {
    if session.sections.is_empty() {
        warn!(session_id = %session.session_id, "session tracks no sections");
    }

    let tracker = replay(session, config)?;
    let now = now.or_else(|| last_event_time(session)).unwrap_or(0);
    Ok(ReportEncoder::new().encode(&tracker, Some(&session.session_id), now))
}

/// Drop blank ids left over from `--sections ""` or stray commas
fn tracked_sections(sections: Vec<String>) -> Vec<String> {
    sections
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn cmd_run(
    sections: Vec<String>,
    config: Option<&Path>,
    emit_every: bool,
    now: Option<Millis>,
) -> Result<(), EngageCliError> {
    let sections = tracked_sections(sections);
    if sections.is_empty() {
        warn!("no sections to track; every snapshot will score 0");
    }

    let config = load_config(config)?;
    let mut tracker = EngagementTracker::with_config(sections, config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_seen: Millis = 0;
    let mut event_count = 0usize;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: VisibilityEvent = serde_json::from_str(trimmed).map_err(|e| {
            EngageCliError::ParseError(format!("Failed to parse event: {}", e))
        })?;

        tracker.apply(&event);
        last_seen = last_seen.max(event.timestamp_ms);
        event_count += 1;

        if emit_every {
            let snapshot = tracker.compute_snapshot(event.timestamp_ms);
            writeln!(stdout, "{}", serde_json::to_string(&snapshot)?)?;
            stdout.flush()?;
        }
    }

    info!(events = event_count, "input stream closed");

    let report = ReportEncoder::new().encode(&tracker, None, now.unwrap_or(last_seen));
    writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), EngageCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => parse_events_ndjson(&input_data)?,
        InputFormat::Json => parse_events_array(&input_data)?,
    };

    let failures = validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - failures.len(),
        invalid_events: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                section_id: f.section_id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Event {} (section '{}'): {}", err.index, err.section_id, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(EngageCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), EngageCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input: visibility session (replay) or event stream (run, validate)");
            println!();
            println!("Session:");
            println!("  - session_id: string (optional, default \"anonymous\")");
            println!("  - sections: [string], tracked section ids in page order");
            println!("  - events: [event]");
            println!();
            println!("Event:");
            println!("  - section_id: string");
            println!("  - visible: bool, or");
            println!("  - intersection_ratio: number in [0, 1], resolved against the threshold");
            println!("  - timestamp_ms: integer milliseconds on the host clock");
        }
        SchemaType::Output => {
            println!("Output: engagement report {}", REPORT_VERSION);
            println!();
            println!("- report_version, producer {{ name, version, instance_id }}");
            println!("- session_id, computed_at_utc, observed_at_ms");
            println!("- snapshot {{ score (0-100), viewed_section_ids }}");
            println!("- level: idle | browsing | interested | engaged");
            println!("- sections: [{{ section_id, visibility, viewed, accumulated_visible_ms,");
            println!("              effective_visible_ms, capped_seconds }}]");
        }
    }

    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), EngageCliError> {
    let mut checks: Vec<DoctorCheck> = vec![DoctorCheck {
        name: "engage_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engage version {}, report schema {}", ENGAGE_VERSION, REPORT_VERSION),
    }];

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(config_path) {
                Ok(content) => match ScoringConfig::from_json(&content) {
                    Ok(cfg) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (coverage {}, time {}, cap {}s, threshold {})",
                            cfg.coverage_weight,
                            cfg.time_weight,
                            cfg.section_cap_sec,
                            cfg.visibility_threshold
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        };
        checks.push(check);
    }

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGAGE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Engage Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EngageCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug, thiserror::Error)]
enum EngageCliError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Engage(#[from] EngagementError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0} events failed validation")]
    ValidationFailed(usize),
    #[error("One or more health checks failed")]
    DoctorFailed,
    #[error("{0}")]
    ParseError(String),
}

/// Error line printed to stderr
#[derive(serde::Serialize)]
struct CliError {
    code: &'static str,
    message: String,
    hint: &'static str,
}

impl From<EngageCliError> for CliError {
    fn from(e: EngageCliError) -> Self {
        let (code, hint) = match &e {
            EngageCliError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
            EngageCliError::Engage(EngagementError::InvalidConfig(_)) => {
                ("CONFIG_ERROR", "Run 'engage doctor --config <file>' for details")
            }
            EngageCliError::Engage(EngagementError::EncodingError(_)) => {
                ("ENCODING_ERROR", "The report could not be serialized; rerun with RUST_LOG=debug")
            }
            EngageCliError::Engage(_) | EngageCliError::ParseError(_) => {
                ("PARSE_ERROR", "Run 'engage schema input' for the expected format")
            }
            EngageCliError::Json(_) => ("JSON_ERROR", "Check JSON syntax"),
            EngageCliError::ValidationFailed(_) => ("VALIDATION_FAILED", "Fix validation errors and retry"),
            EngageCliError::DoctorFailed => ("DOCTOR_FAILED", "Review the doctor report for details"),
        };
        CliError {
            code,
            message: e.to_string(),
            hint,
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    section_id: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
