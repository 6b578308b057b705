//! Claude fetch strategy.

use async_trait::async_trait;
use cliprobe_core::{FetchSource, ProviderKind};
use cliprobe_fetch::{FetchResult, FetchStrategy, ProbeError};
use tracing::instrument;

use super::pty_probe::claude_probe;
use crate::probe::{CliProbe, strategy_id};

/// Fetches Claude usage through the `/usage` probe.
#[derive(Debug, Clone)]
pub struct ClaudeProbeStrategy {
    id: String,
    probe: CliProbe,
}

impl ClaudeProbeStrategy {
    /// Creates the strategy with the default probe.
    pub fn new() -> Self {
        Self::with_probe(claude_probe())
    }

    /// Creates the strategy around a configured probe.
    pub fn with_probe(probe: CliProbe) -> Self {
        Self {
            id: strategy_id(ProviderKind::Claude, probe.source()),
            probe,
        }
    }

    /// The underlying probe.
    pub fn probe(&self) -> &CliProbe {
        &self.probe
    }
}

impl Default for ClaudeProbeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchStrategy for ClaudeProbeStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Claude
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
