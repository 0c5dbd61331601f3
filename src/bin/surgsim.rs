//! SurgSim CLI - Command-line interface for SurgSim Score
//!
//! Commands:
//! - score: Score one attempt against a procedure
//! - validate: Check a raw event log for malformed events
//! - summarize: Aggregate scored attempts per procedure
//! - schema: Print the input JSON schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use surgsim_score::analytics::{summarize_by_procedure, ScoredAttempt};
use surgsim_score::baseline::TraineeProgress;
use surgsim_score::config::EvaluatorConfig;
use surgsim_score::encoder::ScoreReportEncoder;
use surgsim_score::evaluator::AttemptEvaluator;
use surgsim_score::feedback::Locale;
use surgsim_score::schema::RawEventAdapter;
use surgsim_score::types::{Attempt, Procedure};
use surgsim_score::{ScoreError, SURGSIM_VERSION};

/// SurgSim - Scoring engine for surgical simulation attempts
#[derive(Parser)]
#[command(name = "surgsim")]
#[command(version = SURGSIM_VERSION)]
#[command(about = "Score surgical simulation attempts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one attempt against a procedure
    Score {
        /// Attempt JSON file (use - for stdin)
        #[arg(short, long)]
        attempt: PathBuf,

        /// Procedure JSON file (use - for stdin)
        #[arg(short, long)]
        procedure: PathBuf,

        /// Evaluator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Feedback language, overrides the configuration
        #[arg(long)]
        locale: Option<Locale>,

        /// Load per-trainee progress windows from file
        #[arg(long)]
        progress_in: Option<PathBuf>,

        /// Save the updated progress windows to file
        #[arg(long)]
        progress_out: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Validate a raw event log
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize scored attempts per procedure
    Summarize {
        /// JSON array of scored attempts (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of events
    Json,
    /// Newline-delimited JSON (one event per line)
    Ndjson,
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
    /// Procedure definition
    Procedure,
    /// Attempt with its event log
    Attempt,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("surgsim_score=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SurgsimCliError> {
    match cli.command {
        Commands::Score {
            attempt,
            procedure,
            config,
            locale,
            progress_in,
            progress_out,
            format,
            output,
        } => cmd_score(ScoreArgs {
            attempt: &attempt,
            procedure: &procedure,
            config: config.as_deref(),
            locale,
            progress_in: progress_in.as_deref(),
            progress_out: progress_out.as_deref(),
            format,
            output: &output,
        }),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Summarize { input } => cmd_summarize(&input),

        Commands::Schema { schema_type } => {
            let schema = match schema_type {
                SchemaType::Procedure => procedure_json_schema(),
                SchemaType::Attempt => attempt_json_schema(),
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

struct ScoreArgs<'a> {
    attempt: &'a Path,
    procedure: &'a Path,
    config: Option<&'a Path>,
    locale: Option<Locale>,
    progress_in: Option<&'a Path>,
    progress_out: Option<&'a Path>,
    format: OutputFormat,
    output: &'a Path,
}

fn cmd_score(args: ScoreArgs<'_>) -> Result<(), SurgsimCliError> {
    if is_stdio(args.attempt) && is_stdio(args.procedure) {
        return Err(SurgsimCliError::StdinTwice);
    }

    let mut config = match args.config {
        Some(path) => EvaluatorConfig::from_path(path)?,
        None => EvaluatorConfig::default(),
    };
    if let Some(locale) = args.locale {
        config = config.with_locale(locale);
    }

    let attempt = Attempt::from_json(&read_input(args.attempt)?)?;
    let procedure = Procedure::from_json(&read_input(args.procedure)?)?;

    let evaluation = AttemptEvaluator::with_config(config).evaluate_detailed(&attempt, &procedure);

    let progress = if args.progress_in.is_some() || args.progress_out.is_some() {
        let mut store = match args.progress_in {
            Some(path) => TraineeProgress::from_json(&fs::read_to_string(path)?)?,
            None => TraineeProgress::default(),
        };
        let context =
            store.update_and_contextualize(attempt.trainee_id.as_deref(), &evaluation.result);
        if let Some(path) = args.progress_out {
            fs::write(path, store.to_json()?)?;
        }
        Some(context)
    } else {
        None
    };

    let report = ScoreReportEncoder::new().encode(&attempt, &procedure, &evaluation, progress)?;
    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };

    tracing::info!(
        total = report.score.total,
        flags = report.quality.flags.len(),
        "scored attempt"
    );

    write_output(args.output, &rendered)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), SurgsimCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Json => RawEventAdapter::parse_array(&input_data)?,
        InputFormat::Ndjson => RawEventAdapter::parse_ndjson(&input_data)?,
    };

    if events.is_empty() {
        return Err(SurgsimCliError::NoEvents);
    }

    let results = RawEventAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_type: r.event_type.clone(),
                issues: r.issues.iter().map(|issue| issue.to_string()).collect(),
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
            println!("\nIssues:");
            for err in &report.errors {
                println!(
                    "  - {} event (index {}): {}",
                    err.event_type,
                    err.index,
                    err.issues.join("; ")
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(SurgsimCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_summarize(input: &Path) -> Result<(), SurgsimCliError> {
    let attempts: Vec<ScoredAttempt> = serde_json::from_str(&read_input(input)?)?;
    let summaries = summarize_by_procedure(&attempts);
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(path: &Path) -> Result<String, SurgsimCliError> {
    if is_stdio(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), SurgsimCliError> {
    if is_stdio(path) {
        println!("{data}");
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn procedure_json_schema() -> serde_json::Value {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "surgsim.procedure.v1",
        "description": "Reference definition of a training scenario",
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": { "type": ["string", "integer"] },
                        "title": { "type": "string" },
                        "instruments": { "type": "array", "items": { "type": "string" } },
                        "actions": { "type": "array", "items": { "type": "string" } }
                    }
                }
            },
            "rubric": {
                "type": "object",
                "properties": {
                    "version": { "type": "string" },
                    "expected_time_seconds": { "type": "number", "exclusiveMinimum": 0 },
                    "penalties": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "forbidden_hit": { "type": "number", "minimum": 0 },
                            "wrong_action": { "type": "number", "minimum": 0 },
                            "step_omitted": { "type": "number", "minimum": 0 },
                            "time_over": { "type": "number", "minimum": 0 },
                            "wrong_instrument": { "type": "number", "minimum": 0 },
                            "erratic_move": { "type": "number", "minimum": 0 },
                            "forbidden_contact": { "type": "number", "minimum": 0 },
                            "forceful_action": { "type": "number", "minimum": 0 }
                        }
                    }
                }
            },
            "zones": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": {
                        "shape": { "type": "string" },
                        "x": { "type": "number" },
                        "y": { "type": "number" },
                        "z": { "type": "number" },
                        "radius": { "type": "number" }
                    }
                }
            }
        }
    })
}

fn attempt_json_schema() -> serde_json::Value {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "surgsim.attempt.v1",
        "description": "One trainee's run against one procedure",
        "type": "object",
        "properties": {
            "attempt_id": { "type": "string" },
            "trainee_id": { "type": "string" },
            "procedure_id": { "type": "string" },
            "duration_seconds": { "type": "integer" },
            "events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["event_type"],
                    "properties": {
                        "event_type": {
                            "type": "string",
                            "enum": [
                                "hit", "step_completed", "error", "action",
                                "tool_select", "move", "contact_duration"
                            ]
                        },
                        "timestamp_ms": { "type": "integer", "minimum": 0 },
                        "payload": { "type": "object" }
                    }
                }
            }
        }
    })
}

// Error types

#[derive(Debug)]
enum SurgsimCliError {
    Io(io::Error),
    Score(ScoreError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    StdinTwice,
}

impl From<io::Error> for SurgsimCliError {
    fn from(e: io::Error) -> Self {
        SurgsimCliError::Io(e)
    }
}

impl From<ScoreError> for SurgsimCliError {
    fn from(e: ScoreError) -> Self {
        SurgsimCliError::Score(e)
    }
}

impl From<serde_json::Error> for SurgsimCliError {
    fn from(e: serde_json::Error) -> Self {
        SurgsimCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SurgsimCliError> for CliError {
    fn from(e: SurgsimCliError) -> Self {
        match e {
            SurgsimCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SurgsimCliError::Score(e) => {
                let (code, hint) = match &e {
                    ScoreError::InvalidProcedure(_) => (
                        "INVALID_PROCEDURE",
                        "Run 'surgsim schema procedure' for the expected shape",
                    ),
                    ScoreError::ConfigError(_) | ScoreError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Check the evaluator configuration file")
                    }
                    ScoreError::EncodingError(_) => ("ENCODING_ERROR", "Report this as a bug"),
                    ScoreError::ParseError(_) | ScoreError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Run 'surgsim schema attempt' for the expected shape",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SurgsimCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SurgsimCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            SurgsimCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} events have malformed fields"),
                hint: Some("Malformed fields are scored as neutral defaults".to_string()),
            },
            SurgsimCliError::StdinTwice => CliError {
                code: "STDIN_TWICE".to_string(),
                message: "Attempt and procedure cannot both be read from stdin".to_string(),
                hint: Some("Pass one of them as a file path".to_string()),
            },
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
    event_type: String,
    issues: Vec<String>,
}
