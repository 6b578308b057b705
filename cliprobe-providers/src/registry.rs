//! Provider registry.
//!
//! Maps a [`ProviderKind`] to its configured probe and strategy. Runtime
//! settings arrive as a [`ProbeSettings`] value; nothing here reads files
//! or the environment.

use std::time::Duration;

use cliprobe_core::{FetchSource, ProviderKind};
use cliprobe_fetch::{DriveTimings, FetchStrategy, resolve_binary};

use crate::claude::{ClaudeProbeStrategy, claude_probe};
use crate::codex::{CodexProbeStrategy, codex_probe};
use crate::probe::CliProbe;

// ============================================================================
// Probe Settings
// ============================================================================

/// Per-provider overrides applied on top of the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeSettings {
    /// Binary name or path instead of the provider's default.
    pub binary: Option<String>,
    /// Launch flags replacing the defaults.
    pub extra_args: Option<Vec<String>>,
    /// First-tier timeout; the second tier keeps its ratio.
    pub first_timeout: Option<Duration>,
    /// Transport.
    pub transport: FetchSource,
    /// Drive loop timings.
    pub timings: DriveTimings,
}

impl ProbeSettings {
    /// Settings for a transport, everything else default.
    pub fn for_transport(transport: FetchSource) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Static lookup of the supported providers.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns every supported provider.
    pub fn kinds() -> &'static [ProviderKind] {
        ProviderKind::all()
    }

    /// Looks up a provider by CLI name (`claude`, `codex`).
    pub fn get_by_cli_name(name: &str) -> Option<ProviderKind> {
        name.parse().ok()
    }

    /// The probe with built-in defaults.
    pub fn default_probe(kind: ProviderKind) -> CliProbe {
        match kind {
            ProviderKind::Claude => claude_probe(),
            ProviderKind::Codex => codex_probe(),
        }
    }

    /// The probe with `settings` applied.
    pub fn probe(kind: ProviderKind, settings: &ProbeSettings) -> CliProbe {
        let mut probe = Self::default_probe(kind)
            .with_transport(settings.transport, settings.timings.clone());
        if let Some(binary) = &settings.binary {
            probe = probe.with_binary(binary.clone());
        }
        if let Some(args) = &settings.extra_args {
            probe = probe.with_extra_args(args.iter().cloned());
        }
        if let Some(timeout) = settings.first_timeout {
            probe = probe.with_first_timeout(timeout);
        }
        probe
    }

    /// Where the provider's binary resolves to, if anywhere.
    pub fn resolved_binary(kind: ProviderKind, settings: &ProbeSettings) -> Option<String> {
        let binary = settings
            .binary
            .as_deref()
            .unwrap_or_else(|| kind.binary_name());
        resolve_binary(binary).map(|p| p.display().to_string())
    }
}

/// Returns the fetch strategy for a provider.
pub fn strategy_for(kind: ProviderKind, settings: &ProbeSettings) -> Box<dyn FetchStrategy> {
    let probe = ProviderRegistry::probe(kind, settings);
    match kind {
        ProviderKind::Claude => Box::new(ClaudeProbeStrategy::with_probe(probe)),
        ProviderKind::Codex => Box::new(CodexProbeStrategy::with_probe(probe)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_name_lookup() {
        assert_eq!(
            ProviderRegistry::get_by_cli_name("claude"),
            Some(ProviderKind::Claude)
        );
        assert_eq!(
            ProviderRegistry::get_by_cli_name("codex"),
            Some(ProviderKind::Codex)
        );
        assert!(ProviderRegistry::get_by_cli_name("cursor").is_none());
        assert_eq!(ProviderRegistry::kinds().len(), 2);
    }

    #[test]
    fn test_settings_are_applied() {
        let settings = ProbeSettings {
            binary: Some("/usr/local/bin/codex-beta".to_string()),
            extra_args: Some(vec!["--oss".to_string()]),
            first_timeout: Some(Duration::from_secs(6)),
            ..ProbeSettings::for_transport(FetchSource::Tmux)
        };
        let probe = ProviderRegistry::probe(ProviderKind::Codex, &settings);

        assert_eq!(probe.binary(), "/usr/local/bin/codex-beta");
        assert_eq!(probe.base_options().extra_args, vec!["--oss"]);
        assert_eq!(probe.policy().tiers()[0].timeout, Duration::from_secs(6));
        assert_eq!(probe.policy().tiers()[1].timeout, Duration::from_secs(12));
        assert_eq!(probe.source(), FetchSource::Tmux);
    }

    #[test]
    fn test_defaults_keep_provider_flags() {
        let probe = ProviderRegistry::probe(ProviderKind::Codex, &ProbeSettings::default());
        assert_eq!(probe.base_options().extra_args.len(), 4);
        assert_eq!(probe.source(), FetchSource::Pty);
    }

    #[test]
    fn test_strategy_for() {
        let settings = ProbeSettings::default();
        for kind in ProviderRegistry::kinds() {
            let strategy = strategy_for(*kind, &settings);
            assert_eq!(strategy.provider(), *kind);
            assert_eq!(strategy.id(), format!("{}.pty", kind.cli_name()));
        }
    }

    #[test]
    fn test_resolved_binary_missing() {
        let settings = ProbeSettings {
            binary: Some("definitely_not_a_real_command_xyz123".to_string()),
            ..ProbeSettings::default()
        };
        assert!(ProviderRegistry::resolved_binary(ProviderKind::Claude, &settings).is_none());
    }
}
