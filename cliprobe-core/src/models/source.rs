//! Transport that captured a screen.

use serde::{Deserialize, Serialize};

/// Which transport captured the terminal output a snapshot was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Native pseudo-terminal driven by the probe engine.
    #[default]
    Pty,
    /// Legacy transport through a detached tmux session.
    Tmux,
}

impl FetchSource {
    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pty => "PTY",
            Self::Tmux => "tmux",
        }
    }
}
