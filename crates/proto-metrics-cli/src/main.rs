// crates/proto-metrics-cli/src/main.rs
// ============================================================================
// Module: Proto Metrics CLI Entry Point
// Description: Command dispatcher for metric computation and inspection.
// Purpose: Compute metrics from a config file and inspect schemas and envelopes.
// Dependencies: clap, proto-metrics-config, proto-metrics-core, proto-metrics-sqlite, serde
// ============================================================================

//! ## Overview
//! The proto metrics CLI loads a `proto-metrics.toml`, opens the configured
//! `SQLite` engine, and writes the serialized root message for the requested
//! metrics. Inspection commands describe schema messages and decode envelope
//! blobs as JSON. Every failure prints one line to stderr and exits non-zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use proto_metrics_config::ProtoMetricsConfig;
use proto_metrics_core::Envelope;
use proto_metrics_core::FieldDescriptor;
use proto_metrics_core::RepeatedValue;
use proto_metrics_core::SqlEngine;
use proto_metrics_core::runtime::MAX_MESSAGE_BYTES;
use proto_metrics_core::runtime::envelope;
use proto_metrics_sqlite::SqliteEngine;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an init SQL script.
const MAX_INIT_SQL_BYTES: usize = 16 * 1024 * 1024;
/// Maximum size of an envelope input file.
const MAX_ENVELOPE_BYTES: usize = MAX_MESSAGE_BYTES;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "proto-metrics", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute metrics and write the serialized root message.
    Compute(ComputeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Schema inspection utilities.
    Schema {
        /// Selected schema subcommand.
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Envelope inspection utilities.
    Envelope {
        /// Selected envelope subcommand.
        #[command(subcommand)]
        command: EnvelopeCommand,
    },
}

/// Arguments for the `compute` command.
#[derive(Args, Debug)]
struct ComputeCommand {
    /// Config file path (defaults to proto-metrics.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Metric field names to compute, in output order.
    #[arg(long = "metric", value_name = "NAME", required = true)]
    metrics: Vec<String>,
    /// SQL script executed before any metric, e.g. to load source tables.
    #[arg(long, value_name = "FILE")]
    init_sql: Option<PathBuf>,
    /// Output file for the serialized root message (defaults to stdout).
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a proto metrics configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to proto-metrics.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Schema subcommands.
#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Describe one message type as JSON.
    Describe(SchemaDescribeCommand),
}

/// Arguments for `schema describe`.
#[derive(Args, Debug)]
struct SchemaDescribeCommand {
    /// Config file path (defaults to proto-metrics.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Full message name.
    #[arg(long, value_name = "NAME")]
    message: String,
}

/// Envelope subcommands.
#[derive(Subcommand, Debug)]
enum EnvelopeCommand {
    /// Decode an envelope blob and describe it as JSON.
    Inspect(EnvelopeInspectCommand),
}

/// Arguments for `envelope inspect`.
#[derive(Args, Debug)]
struct EnvelopeInspectCommand {
    /// File holding the raw envelope bytes.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// JSON description of a message type.
#[derive(Debug, Serialize)]
struct MessageDescription<'a> {
    /// Full message name.
    name: &'a str,
    /// Name of the registered build-proto SQL function.
    short_name: &'a str,
    /// Field definitions in declaration order.
    fields: &'a [FieldDescriptor],
}

/// JSON description of a decoded envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EnvelopeDescription {
    /// Single sub-message envelope.
    Single {
        /// Declared full type name.
        type_name: String,
        /// Declared `FieldDescriptorProto.Type` number.
        declared_type: u32,
        /// Declared wire kind label, when known.
        wire_kind: Option<&'static str>,
        /// Payload size, absent when the record omitted it.
        payload_bytes: Option<usize>,
    },
    /// Repeated field envelope.
    Repeated {
        /// Element count.
        count: usize,
        /// Elements in order.
        values: Vec<ElementDescription>,
    },
}

/// JSON description of one repeated element.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ElementDescription {
    /// Integer element.
    Long(i64),
    /// Float element.
    Double(f64),
    /// Text element.
    String(String),
    /// Byte element size.
    Bytes(usize),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compute(command) => command_compute(&command),
        Commands::Config {
            command: ConfigCommand::Validate(command),
        } => command_config_validate(&command),
        Commands::Schema {
            command: SchemaCommand::Describe(command),
        } => command_schema_describe(&command),
        Commands::Envelope {
            command: EnvelopeCommand::Inspect(command),
        } => command_envelope_inspect(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Computes the requested metrics and writes the root message bytes.
fn command_compute(command: &ComputeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let mut engine =
        config.open_engine().map_err(|err| CliError::new(format!("engine setup failed: {err}")))?;
    if let Some(path) = &command.init_sql {
        run_init_sql(&mut engine, path)?;
    }
    let bytes = engine.compute(command.metrics.as_slice()).map_err(|err| {
        CliError::new(format!("metric computation failed ({}): {err}", err.kind()))
    })?;
    match &command.out {
        Some(path) => fs::write(path, &bytes).map_err(|err| {
            CliError::new(format!("failed to write {}: {err}", path.display()))
        })?,
        None => write_stdout_bytes(&bytes).map_err(|err| output_error("stdout", &err))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Validates a configuration file, including its schema and scripts.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    write_stdout_line(&format!(
        "config valid: root {} with {} metric scripts",
        config.root_message,
        config.metrics.len()
    ))
    .map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Describes one message type of the configured schema.
fn command_schema_describe(command: &SchemaDescribeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let registry = config.build_registry().map_err(|err| CliError::new(err.to_string()))?;
    let descriptor =
        registry.message(&command.message).map_err(|err| CliError::new(err.to_string()))?;
    let description = MessageDescription {
        name: descriptor.full_name(),
        short_name: descriptor.short_name(),
        fields: descriptor.fields(),
    };
    write_json(&description)?;
    Ok(ExitCode::SUCCESS)
}

/// Decodes an envelope file and describes it as JSON.
fn command_envelope_inspect(command: &EnvelopeInspectCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes_with_limit(&command.input, MAX_ENVELOPE_BYTES)?;
    let decoded = envelope::decode(&bytes)
        .map_err(|err| CliError::new(format!("envelope decode failed: {err}")))?;
    write_json(&describe_envelope(decoded))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration with the default resolution rules.
fn load_config(path: Option<&Path>) -> CliResult<ProtoMetricsConfig> {
    ProtoMetricsConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

/// Executes an init script on the engine before metrics run.
fn run_init_sql(engine: &mut SqliteEngine, path: &Path) -> CliResult<()> {
    let bytes = read_bytes_with_limit(path, MAX_INIT_SQL_BYTES)?;
    let sql = String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("init sql {} must be utf-8", path.display())))?;
    engine
        .execute(&sql)
        .map_err(|err| CliError::new(format!("init sql {} failed: {err}", path.display())))
}

/// Converts a decoded envelope into its JSON description.
fn describe_envelope(decoded: Envelope) -> EnvelopeDescription {
    match decoded {
        Envelope::Single(single) => EnvelopeDescription::Single {
            wire_kind: single.wire_kind().map(|kind| kind.as_str()),
            payload_bytes: single.payload.as_ref().map(Vec::len),
            type_name: single.type_name,
            declared_type: single.declared_type,
        },
        Envelope::Repeated(values) => EnvelopeDescription::Repeated {
            count: values.len(),
            values: values
                .into_iter()
                .map(|value| match value {
                    RepeatedValue::Long(value) => ElementDescription::Long(value),
                    RepeatedValue::Double(value) => ElementDescription::Double(value),
                    RepeatedValue::String(value) => ElementDescription::String(value),
                    RepeatedValue::Bytes(value) => ElementDescription::Bytes(value.len()),
                })
                .collect(),
        },
    }
}

/// Reads a file, failing closed when it exceeds `max_bytes`.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> CliResult<Vec<u8>> {
    let read_error =
        |err: std::io::Error| CliError::new(format!("failed to read {}: {err}", path.display()));
    let file = File::open(path).map_err(read_error)?;
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(read_error)?;
    if bytes.len() > max_bytes {
        return Err(CliError::new(format!(
            "{} exceeds size limit ({max_bytes} bytes)",
            path.display()
        )));
    }
    Ok(bytes)
}

/// Writes pretty JSON followed by a newline to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_stdout_line(&json).map_err(|err| output_error("stdout", &err))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)?;
    stdout.flush()
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================
