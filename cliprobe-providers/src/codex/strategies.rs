//! Codex fetch strategy.

use async_trait::async_trait;
use cliprobe_core::{FetchSource, ProviderKind};
use cliprobe_fetch::{FetchResult, FetchStrategy, ProbeError};
use tracing::instrument;

use super::pty_probe::codex_probe;
use crate::probe::{CliProbe, strategy_id};

/// Fetches Codex usage through the `/status` probe.
#[derive(Debug, Clone)]
pub struct CodexProbeStrategy {
    id: String,
    probe: CliProbe,
}

impl CodexProbeStrategy {
    /// Creates the strategy with the default probe.
    pub fn new() -> Self {
        Self::with_probe(codex_probe())
    }

    /// Creates the strategy around a configured probe.
    pub fn with_probe(probe: CliProbe) -> Self {
        Self {
            id: strategy_id(ProviderKind::Codex, probe.source()),
            probe,
        }
    }

    /// The underlying probe.
    pub fn probe(&self) -> &CliProbe {
        &self.probe
    }
}

impl Default for CodexProbeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchStrategy for CodexProbeStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn source(&self) -> FetchSource {
        self.probe.source()
    }

    async fn is_available(&self) -> bool {
        self.probe.is_available()
    }

    #[instrument(skip(self), fields(strategy = %self.id))]
    async fn fetch(&self) -> Result<FetchResult, ProbeError> {
        let snapshot = self.probe.fetch_usage().await?;
        Ok(FetchResult::new(snapshot, self.id(), self.source()))
    }
}
