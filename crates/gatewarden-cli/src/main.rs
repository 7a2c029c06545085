// gatewarden-cli/src/main.rs
// ============================================================================
// Module: Gatewarden CLI Entry Point
// Description: Command dispatcher for the HTTP server and offline artifact
//              verification tooling.
// Purpose: Provide a single operator-facing binary over `gatewarden-api`,
//          `gatewarden-store-sqlite`, `gatewarden-worm`, and
//          `gatewarden-core::chain`.
// Dependencies: clap, gatewarden-api, gatewarden-config, gatewarden-core,
//               gatewarden-store-sqlite, gatewarden-worm, tokio.
// ============================================================================

//! ## Overview
//! Three subcommands: `serve` boots the HTTP API over a SQLite instance
//! store and a filesystem WORM store; `verify-artifact` and
//! `verify-chain` run [`gatewarden_core::verify_artifact`] and
//! [`gatewarden_core::verify_chain`] against artifact files directly,
//! with no database connection at all.

use std::io::Write as _;
use std::net::SocketAddr;
use std::net::SocketAddrV4;
use std::net::Ipv4Addr;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use gatewarden_api::AppState;
use gatewarden_config::GatewardenConfig;
use gatewarden_core::verify_artifact;
use gatewarden_core::verify_chain;
use gatewarden_store_sqlite::SqliteInstanceStore;
use gatewarden_store_sqlite::SqliteStoreConfig;
use gatewarden_worm::FsWormStore;
use gatewarden_worm::WormStore;
use gatewarden_worm::load_all_from_directory;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "gatewarden", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot the HTTP API over the configured instance and WORM stores.
    Serve,
    /// Verify a single artifact file's self-seal.
    VerifyArtifact {
        /// Path to the artifact's JSON file.
        path: PathBuf,
    },
    /// Verify every artifact in a directory as a linked chain.
    VerifyChain {
        /// Directory containing `<ArtifactID>.json` files.
        dir: PathBuf,
    },
}

/// CLI error wrapper carrying a single human-readable message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct CliError {
    /// What went wrong.
    message: String,
}

impl CliError {
    /// Builds a [`CliError`] from anything `Display`-able.
    fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => command_serve().await,
        Commands::VerifyArtifact { path } => command_verify_artifact(&path),
        Commands::VerifyChain { dir } => command_verify_chain(&dir),
    }
}

/// Executes the `serve` command: loads configuration, opens the instance
/// and WORM stores, and serves the HTTP API until terminated.
async fn command_serve() -> CliResult<ExitCode> {
    let config = GatewardenConfig::load().map_err(CliError::new)?;
    write_stdout_line(&format!("booting gatewarden with {config}"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;

    let store_config = SqliteStoreConfig::new(config.database_url.clone());
    let store = Arc::new(SqliteInstanceStore::open(&store_config).map_err(CliError::new)?);

    let worm: Arc<dyn WormStore> = Arc::new(
        FsWormStore::open(config.artifact_storage_path.clone()).map_err(CliError::new)?,
    );

    let state = Arc::new(AppState::new(store, worm));
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));

    gatewarden_api::serve(addr, state).await.map_err(CliError::new)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `verify-artifact` command: reads one artifact file and
/// checks its self-seal.
fn command_verify_artifact(path: &Path) -> CliResult<ExitCode> {
    let bytes = std::fs::read(path)
        .map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
    let artifact = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("failed to parse {}: {err}", path.display())))?;

    let result = verify_artifact(&artifact).map_err(CliError::new)?;
    let rendered = serde_json::to_string_pretty(&ResultView {
        valid: result.valid,
        artifact_id: result.artifact_id.as_str(),
        calculated_hash: result.calculated_hash.as_str(),
        reason: result.error.as_deref(),
    })
    .map_err(CliError::new)?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;

    Ok(exit_code_for(result.valid))
}

/// Executes the `verify-chain` command: loads every artifact file in
/// `dir`, orders them by timestamp, and checks the chain is unbroken.
fn command_verify_chain(dir: &Path) -> CliResult<ExitCode> {
    let mut artifacts = load_all_from_directory(dir)
        .map_err(|err| CliError::new(format!("failed to load {}: {err}", dir.display())))?;
    artifacts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let result = verify_chain(&artifacts).map_err(CliError::new)?;
    let rendered = serde_json::to_string_pretty(&ChainResultView {
        valid: result.valid,
        checked: artifacts.len(),
        broken_at: result.broken_at,
        reason: result.reason.as_deref(),
    })
    .map_err(CliError::new)?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;

    Ok(exit_code_for(result.valid))
}

/// `ExitCode::SUCCESS` when `valid`, `ExitCode::FAILURE` otherwise — used
/// for both verify subcommands so a broken seal or chain fails a script
/// that calls this binary, not just a human reading the JSON.
fn exit_code_for(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// JSON rendering of a single-artifact verification result.
#[derive(serde::Serialize)]
struct ResultView<'a> {
    /// Whether the artifact's claimed ID matches its recomputed seal.
    valid: bool,
    /// The artifact's claimed ID.
    artifact_id: &'a str,
    /// The freshly recomputed seal.
    calculated_hash: &'a str,
    /// A human-readable reason when `valid` is false.
    reason: Option<&'a str>,
}

/// JSON rendering of a chain verification result.
#[derive(serde::Serialize)]
struct ChainResultView<'a> {
    /// Whether every link in the chain holds.
    valid: bool,
    /// How many artifacts were loaded from the directory.
    checked: usize,
    /// The index of the first broken link, if any.
    broken_at: Option<usize>,
    /// A human-readable reason for the break, if any.
    reason: Option<&'a str>,
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an I/O failure that happened while writing output itself.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns the fatal-boot-error exit
/// code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
