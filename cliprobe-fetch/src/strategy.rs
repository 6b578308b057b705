//! Strategy seam between probes and callers.
//!
//! A strategy is the caller-facing wrapper around one provider probe: it
//! knows whether the CLI is installed and how to turn a probe into a
//! [`UsageSnapshot`]. Callers that only need the snapshot or availability
//! go through a strategy. The `usage` and `debug` commands drive the probe
//! itself, since they also report the raw capture.

use std::fmt;

use async_trait::async_trait;
use cliprobe_core::{FetchSource, ProviderKind, UsageSnapshot};
use serde::Serialize;

use crate::error::ProbeError;

// ============================================================================
// Fetch Result
// ============================================================================

/// A parsed snapshot tagged with the strategy that produced it.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// What the usage screen showed.
    pub snapshot: UsageSnapshot,
    /// Id of the strategy, e.g. `claude.pty`.
    pub strategy_id: String,
    /// The transport used.
    pub source: FetchSource,
}

impl FetchResult {
    /// Creates a new fetch result.
    pub fn new(snapshot: UsageSnapshot, strategy_id: impl Into<String>, source: FetchSource) -> Self {
        Self {
            snapshot,
            strategy_id: strategy_id.into(),
            source,
        }
    }
}

// ============================================================================
// Fetch Strategy Trait
// ============================================================================

/// A way of fetching usage data from one provider's CLI.
///
/// ## Implementing a Strategy
///
/// ```ignore
/// struct ClaudeProbeStrategy { probe: ClaudeProbe }
///
/// #[async_trait]
/// impl FetchStrategy for ClaudeProbeStrategy {
///     fn id(&self) -> &str {
///         "claude.pty"
///     }
///
///     fn provider(&self) -> ProviderKind {
///         ProviderKind::Claude
///     }
///
///     fn source(&self) -> FetchSource {
///         FetchSource::Pty
///     }
///
///     async fn is_available(&self) -> bool {
///         self.probe.is_available()
///     }
///
///     async fn fetch(&self) -> Result<FetchResult, ProbeError> {
///         let snapshot = self.probe.fetch_usage().await?;
///         Ok(FetchResult::new(snapshot, self.id(), self.source()))
///     }
/// }
/// ```
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Unique identifier, formatted `{provider}.{transport}` (e.g. `codex.pty`).
    fn id(&self) -> &str;

    /// The provider this strategy probes.
    fn provider(&self) -> ProviderKind;

    /// The transport this strategy uses.
    fn source(&self) -> FetchSource;

    /// Id plus transport label.
    fn display_name(&self) -> String {
        format!("{} ({})", self.id(), self.source().label())
    }

    /// Quick check that the CLI can be launched at all (no process is started).
    async fn is_available(&self) -> bool;

    /// Runs the probe, with escalation, and returns the parsed snapshot.
    async fn fetch(&self) -> Result<FetchResult, ProbeError>;
}

// ============================================================================
// Strategy Info
// ============================================================================

/// Strategy summary for the `providers` listing.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    /// Strategy ID.
    pub id: String,
    /// Provider.
    pub provider: ProviderKind,
    /// Transport.
    pub source: FetchSource,
    /// Whether the binary resolved.
    pub available: bool,
}

impl StrategyInfo {
    /// Creates strategy info from a strategy implementation.
    pub async fn from_strategy(strategy: &dyn FetchStrategy) -> Self {
        Self {
            id: strategy.id().to_string(),
            provider: strategy.provider(),
            source: strategy.source(),
            available: strategy.is_available().await,
        }
    }
}

impl fmt::Display for StrategyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.available { "available" } else { "unavailable" };
        write!(f, "{} via {} ({status})", self.id, self.source.label())
    }
}

// ============================================================================
// Tests
// ============================================================================
