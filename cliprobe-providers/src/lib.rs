// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `cliprobe` Providers
//!
//! The two interactive CLIs the probe engine is tuned for.
//!
//! Each provider module contains:
//!
//! - **Script**: marker table, dialog answers, target command, escalation tiers
//! - **Parser**: cleaned capture → [`UsageSnapshot`](cliprobe_core::UsageSnapshot)
//! - **Probe**: a configured [`CliProbe`]
//! - **Strategy**: the [`FetchStrategy`](cliprobe_fetch::FetchStrategy) callers use
//!
//! | Provider | Binary | Command | Tier 1 | Tier 2 |
//! |----------|--------|---------|--------|--------|
//! | Claude | `claude` | `/usage` | 50×160, 20 s | 70×220, 35 s |
//! | Codex | `codex -s read-only -a untrusted` | `/status` | 60×200, 12 s | 70×220, 24 s |
//!
//! ## Usage
//!
//! ```ignore
//! use cliprobe_core::ProviderKind;
//! use cliprobe_providers::{ProbeSettings, strategy_for};
//!
//! let strategy = strategy_for(ProviderKind::Claude, &ProbeSettings::default());
//! let result = strategy.fetch().await?;
//! ```

pub mod claude;
pub mod codex;
pub mod probe;
pub mod registry;


pub use claude::ClaudeProbeStrategy;
pub use codex::CodexProbeStrategy;
pub use probe::{CliProbe, ParseFn, ProbeRun};
pub use registry::{ProbeSettings, ProviderRegistry, strategy_for};
