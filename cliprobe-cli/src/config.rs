//! Configuration file.
//!
//! ```json
//! {
//!   "general": { "log_level": "info", "transport": "pty" },
//!   "providers": {
//!     "codex": { "extra_args": ["-s", "read-only"], "timeout_secs": 20 },
//!     "claude": { "binary": "/opt/claude/bin/claude", "enabled": true }
//!   }
//! }
//! ```
//!
//! A missing file means defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cliprobe_core::{FetchSource, ProviderKind};
use cliprobe_providers::ProbeSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-provider settings keyed by CLI name (`claude`, `codex`).
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// General settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: Option<String>,
    /// Default transport.
    #[serde(default)]
    pub transport: Option<FetchSource>,
}

/// Per-provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether `usage` probes this provider by default.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Binary name or path.
    #[serde(default)]
    pub binary: Option<String>,
    /// Launch flags replacing the built-in ones.
    #[serde(default)]
    pub extra_args: Option<Vec<String>>,
    /// First-tier timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: None,
            extra_args: None,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cliprobe")
            .join("config.json")
    }

    /// Loads from `path`, or from the default path when `None`.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);
        Self::load_from(&path)
    }

    /// Loads from a specific path.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Returns the settings block of a provider, if any.
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(kind.cli_name())
    }

    /// Returns whether a provider is enabled.
    pub fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        self.provider(kind).is_none_or(|p| p.enabled)
    }

    /// Builds the probe settings of a provider.
    ///
    /// `transport` (from the command line) wins over the file.
    pub fn probe_settings(&self, kind: ProviderKind, transport: Option<FetchSource>) -> ProbeSettings {
        let mut settings = ProbeSettings::for_transport(
            transport
                .or(self.general.transport)
                .unwrap_or_default(),
        );
        if let Some(provider) = self.provider(kind) {
            settings.binary.clone_from(&provider.binary);
            settings.extra_args.clone_from(&provider.extra_args);
            settings.first_timeout = provider
                .timeout_secs
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs);
        }
        settings
    }
}

// ============================================================================
// Tests
// ============================================================================
