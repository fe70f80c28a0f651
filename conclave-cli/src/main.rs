//! Conclave CLI - planner and group chat demos.
//!
//! `conclave math` answers a math question by planning over the math plugin;
//! `conclave career` runs a two-agent career advisor conversation.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

mod career;
mod config;
mod error;
mod math;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use conclave::chat::CompletionMode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::career::CareerOptions;
use crate::error::Result;

/// Conclave - tool planning and agent group chat over hosted LLMs
#[derive(Parser)]
#[command(name = "conclave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "CONCLAVE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a math question with a generated plan
    Math(MathArgs),

    /// Run the career advisor group chat
    Career(CareerArgs),
}

/// Arguments for the math command
#[derive(Args)]
struct MathArgs {
    /// The question to answer
    question: String,

    /// Completion mode (overrides config)
    #[arg(short, long)]
    mode: Option<CompletionMode>,
}

/// Arguments for the career command
#[derive(Args)]
struct CareerArgs {
    /// Seed question (defaults to the built-in candidate profile)
    #[arg(short, long)]
    question: Option<String>,

    /// Turn ceiling
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Per-turn timeout in seconds
    #[arg(long)]
    turn_timeout: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let dotenv = load_dotenv(Path::new(".env"));

    init_logging(cli.verbose);
    if let Err(e) = dotenv {
        tracing::warn!("ignoring .env: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Load environment variables from `path`.
///
/// Returns whether a file was loaded; a missing file is not an error.
fn load_dotenv(path: &Path) -> std::result::Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "conclave_cli={level},conclave={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let mut settings = config::load_settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Math(args) => {
            if let Some(mode) = args.mode {
                settings.completion.mode = Some(mode);
            }
            math::run(&settings, &args.question).await.map(drop)
        }
        Commands::Career(args) => {
            let mut options = CareerOptions::from_settings(&settings);
            if let Some(question) = args.question {
                options.question = question;
            }
            if let Some(max) = args.max_iterations {
                options.maximum_iterations = max;
            }
            if let Some(secs) = args.turn_timeout {
                options.turn_timeout = Some(Duration::from_secs(secs));
            }
            career::run(&settings, &options).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dotenv_is_skipped() {
        let path = std::env::temp_dir().join("conclave-no-such-dir").join(".env");
        assert!(!load_dotenv(&path).unwrap());
    }

    #[test]
    fn test_malformed_dotenv_is_reported() {
        let path = std::env::temp_dir().join(format!("conclave-bad-{}.env", std::process::id()));
        std::fs::write(&path, "CONCLAVE_TEST_UNTERMINATED='oops\n").unwrap();
        let result = load_dotenv(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
