//! Debug command - print the raw capture of one probe attempt.

use anyhow::Result;
use clap::Args;
use cliprobe_core::ProviderKind;
use cliprobe_fetch::{DriveOutcome, ProbeCapture};
use cliprobe_providers::ProviderRegistry;
use serde::Serialize;
use tracing::info;

use crate::commands::usage::TransportArg;
use crate::config::Config;
use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the debug command.
#[derive(Args)]
pub struct DebugArgs {
    /// Provider to probe (`claude` or `codex`).
    pub provider: String,

    /// Escalation tier (1 = small screen and short timeout, 2 = large).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub tier: u8,

    /// Transport used to drive the CLI.
    #[arg(long, short)]
    pub transport: Option<TransportArg>,
}

/// Machine-readable capture.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugOutput {
    provider: String,
    source: String,
    tier: u8,
    outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    trace: Vec<String>,
    enter_retries: u32,
    command_resends: u32,
    prompt_responses: u32,
    cursor_reports: u32,
    elapsed_ms: u64,
    text: String,
}

impl DebugOutput {
    fn new(provider: ProviderKind, tier: u8, capture: &ProbeCapture) -> Self {
        let report = &capture.report;
        Self {
            provider: provider.cli_name().to_string(),
            source: capture.source.label().to_string(),
            tier,
            outcome: outcome_label(&report.outcome).to_string(),
            error: report.error().map(ToString::to_string),
            trace: report.trace.iter().map(ToString::to_string).collect(),
            enter_retries: report.enter_retries,
            command_resends: report.command_resends,
            prompt_responses: report.prompt_responses,
            cursor_reports: report.cursor_reports,
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            text: report.text.clone(),
        }
    }
}

fn outcome_label(outcome: &DriveOutcome) -> &'static str {
    match outcome {
        DriveOutcome::Completed => "completed",
        DriveOutcome::ChildExited => "child_exited",
        DriveOutcome::Failed(e) => e.code(),
    }
}

/// Runs the debug command.
pub async fn run(args: &DebugArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let Some(provider) = ProviderRegistry::get_by_cli_name(&args.provider.to_lowercase()) else {
        anyhow::bail!("Unknown provider: {}", args.provider);
    };

    let settings = config.probe_settings(provider, args.transport.map(Into::into));
    let probe = ProviderRegistry::probe(provider, &settings);
    info!(provider = ?provider, tier = args.tier, "Capturing raw output");

    let capture = match probe.debug_raw(usize::from(args.tier)).await {
        Ok(capture) => capture,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e}");
                eprintln!("Hint: {}", e.hint());
            }
            return Ok(ExitCode::for_probe_error(&e));
        }
    };

    if cli.format == OutputFormat::Text {
        println!("{}", capture.text());
        if !cli.quiet {
            eprintln!("{}", summary_line(&capture));
        }
    } else {
        let output = DebugOutput::new(provider, args.tier, &capture);
        println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
    }

    Ok(capture
        .report
        .error()
        .map_or(ExitCode::Success, ExitCode::for_probe_error))
}

/// One-line summary written to stderr after the capture.
fn summary_line(capture: &ProbeCapture) -> String {
    let report = &capture.report;
    let trace: Vec<String> = report.trace.iter().map(ToString::to_string).collect();
    format!(
        "[{} via {}] {} bytes in {}ms; states: {}; enter retries: {}, resends: {}, dialogs: {}",
        outcome_label(&report.outcome),
        capture.source.label(),
        report.raw.len(),
        report.elapsed.as_millis(),
        trace.join(" -> "),
        report.enter_retries,
        report.command_resends,
        report.prompt_responses,
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cliprobe_core::FetchSource;
    use cliprobe_fetch::{DriveReport, DriveState, ProbeError};

    use super::*;

    fn capture(outcome: DriveOutcome) -> ProbeCapture {
        ProbeCapture {
            source: FetchSource::Pty,
            report: DriveReport {
                raw: b"5h limit: 3% used".to_vec(),
                text: "5h limit: 3% used".to_string(),
                trace: vec![DriveState::Booting, DriveState::AwaitingData],
                enter_retries: 2,
                command_resends: 0,
                prompt_responses: 1,
                cursor_reports: 1,
                elapsed: Duration::from_millis(1500),
                outcome,
            },
        }
    }

    #[test]
    fn test_debug_output_fields() {
        let output = DebugOutput::new(
            ProviderKind::Codex,
            2,
            &capture(DriveOutcome::Failed(ProbeError::TimedOut)),
        );
        let json = serde_json::to_value(&output).unwrap();

        assert_eq!(json["provider"], "codex");
        assert_eq!(json["source"], "PTY");
        assert_eq!(json["outcome"], "timed_out");
        assert_eq!(json["trace"][1], "awaiting-data");
        assert_eq!(json["enterRetries"], 2);
        assert_eq!(json["elapsedMs"], 1500);
        assert!(json["error"].as_str().unwrap().contains("Timed out"));
    }

    #[test]
    fn test_summary_line() {
        let line = summary_line(&capture(DriveOutcome::Completed));
        assert!(line.starts_with("[completed via PTY] 17 bytes"));
        assert!(line.contains("booting -> awaiting-data"));
    }
}
