// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! cliprobe - read usage limits out of interactive AI coding CLIs.
//!
//! # Examples
//!
//! ```bash
//! # Usage of every enabled provider
//! cliprobe
//!
//! # One provider, JSON output
//! cliprobe usage --provider codex --format json --pretty
//!
//! # Legacy tmux transport with the envelope format
//! cliprobe usage --provider claude --transport tmux --format envelope
//!
//! # Raw capture of the second (larger) tier
//! cliprobe debug claude --tier 2
//!
//! # Providers and resolved binaries
//! cliprobe providers
//! ```

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cliprobe_fetch::ProbeError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{debug, providers, usage};
use config::Config;

// ============================================================================
// CLI Definition
// ============================================================================

/// cliprobe - usage limits of interactive AI coding CLIs.
#[derive(Parser)]
#[command(name = "cliprobe")]
#[command(about = "Reads usage limits out of interactive AI coding CLIs")]
#[command(long_about = r#"
cliprobe launches an AI coding CLI inside a pseudo-terminal, types its
usage command, waits for the screen to render and parses the limits.

Supported providers:
  • Claude Code (claude)   /usage
  • OpenAI Codex (codex)   /status

Examples:
  cliprobe                              # Every enabled provider
  cliprobe usage --provider codex       # Single provider
  cliprobe --format json                # JSON output
  cliprobe debug claude --tier 2        # Raw capture
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format.
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Probe usage limits (default if no command specified).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// Print the raw capture of one probe attempt.
    #[command(visible_alias = "d")]
    Debug(debug::DebugArgs),

    /// List providers and where their binaries resolve.
    #[command(visible_alias = "p")]
    Providers,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
    /// Flat `{ok, ...}` objects of the tmux-era scripts.
    Envelope,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error, including launch failures.
    Error = 1,
    /// CLI binary not installed.
    ProviderMissing = 2,
    /// Parse error.
    ParseError = 3,
    /// Timeout.
    Timeout = 4,
    /// CLI needs a login.
    AuthRequired = 5,
    /// CLI needs an update.
    UpdateRequired = 6,
}

impl ExitCode {
    /// Maps a probe failure to its exit code.
    pub fn for_probe_error(err: &ProbeError) -> Self {
        match err {
            ProbeError::BinaryNotFound(_) => Self::ProviderMissing,
            ProbeError::LaunchFailed(_) => Self::Error,
            ProbeError::TimedOut => Self::Timeout,
            ProbeError::ParseFailed(_) => Self::ParseError,
            ProbeError::UpdateRequired(_) => Self::UpdateRequired,
            ProbeError::AuthRequired => Self::AuthRequired,
        }
    }

    /// The process exit status.
    pub fn code(self) -> i32 {
        self as i32
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, configured: Option<&str>) {
    if quiet {
        return;
    }

    let fallback = if verbose {
        "cliprobe=debug,info"
    } else {
        configured.unwrap_or("cliprobe=warn")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error.code());
        }
    };

    setup_logging(cli.verbose, cli.quiet, config.general.log_level.as_deref());

    let result = match &cli.command {
        Some(Commands::Usage(args)) => usage::run(args, &cli, &config).await,
        Some(Commands::Debug(args)) => debug::run(args, &cli, &config).await,
        Some(Commands::Providers) => providers::run(&cli, &config).await,
        None => usage::run(&usage::UsageArgs::default(), &cli, &config).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code.code()),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error.code());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
