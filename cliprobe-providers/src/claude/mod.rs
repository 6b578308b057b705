//! Claude (Anthropic) provider.
//!
//! The `claude` CLI has no machine-readable usage endpoint we can rely on,
//! so usage is read from its interactive `/usage` view.
//!
//! ## Interaction
//!
//! 1. Wait for the prompt (`? for shortcuts`), accepting the folder trust
//!    and workspace dialogs with Enter and dismissing telemetry with Escape
//! 2. Type `/usage` and wait for both the `Current session` and the
//!    `Current week (all models)` blocks
//! 3. Read trailing redraws, then quit with `/exit`
//!
//! A login wall fails immediately with `AuthRequired`.
//!
//! ## Usage
//!
//! ```ignore
//! use cliprobe_providers::claude::claude_probe;
//!
//! let snapshot = claude_probe().fetch_usage().await?;
//! ```

pub(crate) mod parser;
mod pty_probe;
mod script;
mod strategies;

pub use parser::parse_usage;
pub use pty_probe::claude_probe;
pub use script::{claude_escalation, claude_markers, usage_script};
pub use strategies::ClaudeProbeStrategy;
