//! Codex (OpenAI) provider.
//!
//! Usage is read from the `/status` panel of the interactive `codex` TUI:
//! the 5-hour and weekly limits, the credit balance and the account line.
//!
//! The TUI is launched with `-s read-only -a untrusted`. The folder trust
//! dialog is accepted with Enter; a login screen fails immediately with
//! `AuthRequired`.

pub(crate) mod parser;
mod pty_probe;
mod script;
mod strategies;

pub use parser::parse_status;
pub use pty_probe::codex_probe;
pub use script::{codex_escalation, codex_markers, status_script};
pub use strategies::CodexProbeStrategy;
