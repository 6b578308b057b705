//! Providers command - list providers and their binaries.

use anyhow::Result;
use cliprobe_core::ProviderKind;
use cliprobe_fetch::StrategyInfo;
use cliprobe_providers::{ProviderRegistry, strategy_for};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// One row of the provider listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub id: String,
    pub display_name: String,
    pub strategy: String,
    pub source: String,
    pub binary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    pub enabled: bool,
    pub command: String,
    pub launch_args: Vec<String>,
    pub tiers: Vec<TierOutput>,
}

/// One escalation tier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierOutput {
    pub rows: u16,
    pub cols: u16,
    pub timeout_secs: u64,
}

impl ProviderInfoOutput {
    async fn collect(kind: ProviderKind, config: &Config) -> Self {
        let settings = config.probe_settings(kind, None);
        let probe = ProviderRegistry::probe(kind, &settings);
        let strategy = StrategyInfo::from_strategy(strategy_for(kind, &settings).as_ref()).await;

        Self {
            id: kind.cli_name().to_string(),
            display_name: kind.display_name().to_string(),
            strategy: strategy.id,
            source: strategy.source.label().to_string(),
            binary: probe.binary().to_string(),
            resolved_path: ProviderRegistry::resolved_binary(kind, &settings),
            enabled: config.is_provider_enabled(kind),
            command: probe.script().command.clone(),
            launch_args: probe.base_options().extra_args.clone(),
            tiers: probe
                .policy()
                .tiers()
                .iter()
                .map(|t| TierOutput {
                    rows: t.rows,
                    cols: t.cols,
                    timeout_secs: t.timeout.as_secs(),
                })
                .collect(),
        }
    }
}

/// Runs the providers command.
pub async fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    info!("Listing providers");

    let mut rows = Vec::new();
    for kind in ProviderRegistry::kinds() {
        rows.push(ProviderInfoOutput::collect(*kind, config).await);
    }

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(70));
            for row in &rows {
                println!("{}", formatter.format_provider_line(row));
            }

            println!();
            println!(
                "Total: {} providers ({} installed)",
                rows.len(),
                rows.iter().filter(|r| r.resolved_path.is_some()).count()
            );
        }
        OutputFormat::Json | OutputFormat::Envelope => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&rows)?);
        }
    }

    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[tokio::test]
    async fn test_collect_applies_config() {
        let mut config = Config::default();
        config.providers.insert(
            "codex".to_string(),
            ProviderConfig {
                enabled: false,
                binary: Some("definitely_not_a_real_command_xyz123".to_string()),
                extra_args: None,
                timeout_secs: Some(30),
            },
        );

        let row = ProviderInfoOutput::collect(ProviderKind::Codex, &config).await;
        assert_eq!(row.id, "codex");
        assert_eq!(row.strategy, "codex.pty");
        assert_eq!(row.binary, "definitely_not_a_real_command_xyz123");
        assert!(row.resolved_path.is_none());
        assert!(!row.enabled);
        assert_eq!(row.command, "/status");
        assert_eq!(row.launch_args, vec!["-s", "read-only", "-a", "untrusted"]);
        assert_eq!(row.tiers.len(), 2);
        assert_eq!(row.tiers[0].timeout_secs, 30);
        assert_eq!(row.tiers[1].timeout_secs, 60);
    }
}
