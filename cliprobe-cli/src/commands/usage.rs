//! Usage command - probe and display provider usage.

use anyhow::Result;
use clap::{Args, ValueEnum};
use cliprobe_core::{FetchSource, ProviderKind};
use cliprobe_providers::{ProbeRun, ProviderRegistry};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::output::{EnvelopeFormatter, JsonFormatter, ProviderReport, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Provider to query (`claude`, `codex`, `all`).
    /// Can be comma-separated: "codex,claude"
    #[arg(long, short)]
    pub provider: Option<String>,

    /// Transport used to drive the CLI.
    #[arg(long, short)]
    pub transport: Option<TransportArg>,
}

/// Transport choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Native pseudo-terminal.
    Pty,
    /// Detached tmux session.
    Tmux,
}

impl From<TransportArg> for FetchSource {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Pty => FetchSource::Pty,
            TransportArg::Tmux => FetchSource::Tmux,
        }
    }
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let providers = parse_provider_selection(args.provider.as_deref(), config)?;
    let transport = args.transport.map(FetchSource::from);

    info!(providers = ?providers, "Probing usage");

    let reports = fetch_all(&providers, transport, config).await;
    output_reports(&reports, cli)?;

    Ok(exit_code(&reports))
}

/// Probes every provider concurrently.
async fn fetch_all(
    providers: &[ProviderKind],
    transport: Option<FetchSource>,
    config: &Config,
) -> Vec<ProviderReport> {
    let probes = providers.iter().map(|&provider| {
        let settings = config.probe_settings(provider, transport);
        let probe = ProviderRegistry::probe(provider, &settings);
        async move {
            debug!(provider = ?provider, binary = probe.binary(), "Starting probe");
            let run = probe.run().await;
            log_run(provider, &run);
            ProviderReport { provider, run }
        }
    });

    join_all(probes).await
}

fn log_run(provider: ProviderKind, run: &ProbeRun) {
    match &run.result {
        Ok(_) => debug!(provider = ?provider, "Probe successful"),
        Err(e) => warn!(provider = ?provider, error = %e, "Probe failed"),
    }
}

/// Parses provider selection from argument.
///
/// Without an argument every enabled provider is probed; naming a provider
/// probes it even when the configuration disables it.
pub(crate) fn parse_provider_selection(
    arg: Option<&str>,
    config: &Config,
) -> Result<Vec<ProviderKind>> {
    let providers: Vec<ProviderKind> = match arg.map(str::to_lowercase).as_deref() {
        None | Some("default") => ProviderRegistry::kinds()
            .iter()
            .copied()
            .filter(|&kind| config.is_provider_enabled(kind))
            .collect(),
        Some("all" | "both") => ProviderRegistry::kinds().to_vec(),
        Some(names) => {
            let mut providers = Vec::new();
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let Some(kind) = ProviderRegistry::get_by_cli_name(name) else {
                    anyhow::bail!("Unknown provider: {name}");
                };
                if !providers.contains(&kind) {
                    providers.push(kind);
                }
            }
            providers
        }
    };

    if providers.is_empty() {
        anyhow::bail!("No providers selected");
    }
    Ok(providers)
}

/// Prints the reports in the requested format.
fn output_reports(reports: &[ProviderReport], cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_reports(reports)?);
        }
        OutputFormat::Envelope => {
            println!("{}", EnvelopeFormatter::new(cli.pretty).format_reports(reports)?);
        }
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = reports
                .iter()
                .filter(|r| !cli.quiet || r.run.result.is_ok())
                .map(|r| formatter.format_report(r))
                .collect();
            if !blocks.is_empty() {
                println!("{}", blocks.join("\n\n"));
            }
        }
    }
    Ok(())
}

/// Success when any provider produced a snapshot, otherwise the code of
/// the first failure.
pub(crate) fn exit_code(reports: &[ProviderReport]) -> ExitCode {
    if reports.iter().any(|r| r.run.result.is_ok()) {
        return ExitCode::Success;
    }
    reports
        .iter()
        .find_map(|r| r.run.result.as_ref().err())
        .map_or(ExitCode::Error, ExitCode::for_probe_error)
}

// ============================================================================
// Tests
// ============================================================================
