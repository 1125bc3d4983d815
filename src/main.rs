//! `drawcmp`: native harness for the comparison viewer engine.
//!
//! Replays recorded input against a processing result without a browser and
//! inspects deep-zoom descriptors. Logs go to stderr (`RUST_LOG`), machine
//! output to stdout as JSON.

mod inspect;
mod replay;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use viewer::backend::GpuCaps;
use viewer::config::ViewerConfig;
use viewer::error::ViewerError;
use viewer::session::SessionResult;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

#[derive(Parser, Debug)]
#[command(name = "drawcmp", about = "Comparison viewer engine harness")]
struct Cli {
    /// JSON viewer config; `VIEWER_*` environment variables are used when absent.
    #[arg(long, env = "DRAWCMP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an input script against a processing result.
    Replay(ReplayCommand),
    /// Print the level table of a deep-zoom descriptor.
    InspectDzi(InspectCommand),
}

#[derive(Args, Debug)]
struct ReplayCommand {
    #[arg(long)]
    session: PathBuf,
    #[arg(long)]
    script: PathBuf,
    /// Simulate a host without a GPU context.
    #[arg(long)]
    no_gpu: bool,
    #[arg(long, default_value_t = GpuCaps::default().max_texture_size)]
    max_texture_size: u32,
}

#[derive(Args, Debug)]
struct InspectCommand {
    file: PathBuf,
    /// Top level when the producer cut a shorter pyramid.
    #[arg(long)]
    max_level: Option<u32>,
}

fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, ".env could not be loaded"),
    }

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ViewerConfig::from_json(&read(path)?)?,
        None => ViewerConfig::from_env()?,
    };

    match cli.command {
        Command::Replay(cmd) => run_replay(config, &cmd),
        Command::InspectDzi(cmd) => run_inspect(&cmd),
    }
}

fn run_replay(config: ViewerConfig, cmd: &ReplayCommand) -> Result<(), CliError> {
    let session = SessionResult::from_json(&read(&cmd.session)?)?;
    let script = replay::Script::from_json(&read(&cmd.script)?)?;
    let gpu = GpuCaps { available: !cmd.no_gpu, max_texture_size: cmd.max_texture_size };

    let report = replay::run(config, gpu, &session, &script);
    for line in report.lines() {
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn run_inspect(cmd: &InspectCommand) -> Result<(), CliError> {
    let xml = read(&cmd.file)?;
    let table = inspect::level_table(&xml, &cmd.file.display().to_string(), cmd.max_level)?;
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read { path: path.display().to_string(), source })
}
