// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `cliprobe` Fetch
//!
//! The interactive CLI probe engine.
//!
//! Interactive CLIs such as `claude` and `codex` have no machine-readable
//! usage API; their only integration surface is the text UI. This crate
//! drives such a CLI inside a pseudo-terminal, waits for it to reach a
//! known screen, types the command that shows usage, and hands the captured
//! text to a provider-specific parser.
//!
//! ## Engine
//!
//! - [`host::pty`] - PTY session runner (non-blocking master, guaranteed reaping)
//! - [`host::tmux`] - legacy transport over a detached tmux pane
//! - [`detect`] - marker tables and the cursor position query responder
//! - [`drive`] - the polling state machine with Enter/command re-sends
//! - [`runner`] - the `run(binary, script, options)` seam
//! - [`escalation`] - two-tier retry with a larger screen and longer timeout
//!
//! ## Parsing Helpers
//!
//! - [`text`] - ANSI stripping, excerpts, percentages
//! - [`reset`] - reset-time parsing against an injected clock
//!
//! ## Example
//!
//! ```ignore
//! use cliprobe_fetch::{PtyOptions, PtyProbeRunner, ProbeRunner, ProbeScript};
//!
//! let script = ProbeScript::new("/usage", markers).exit_with("/exit");
//! let capture = PtyProbeRunner::new().run("claude", &script, &PtyOptions::default())?;
//! println!("{}", capture.text());
//! ```

pub mod buffer;
pub mod detect;
pub mod drive;
pub mod error;
pub mod escalation;
pub mod host;
pub mod reset;
pub mod runner;
pub mod strategy;
pub mod text;

// Errors
pub use error::{ProbeError, PtyError};

// Engine
pub use buffer::CapturedBuffer;
pub use detect::{CursorQueryResponder, Marker, MarkerKind, MarkerSet, Matcher};
pub use drive::{
    DriveLoop, DriveOutcome, DriveReport, DriveState, DriveTimings, ProbeScript, PromptResponse,
};
pub use escalation::{EscalationPolicy, ProbeTier};
pub use host::{PtyOptions, PtySession, ReadStatus, Terminal, TmuxSession, resolve_binary};
pub use runner::{ProbeCapture, ProbeRunner, PtyProbeRunner, TmuxProbeRunner, runner_for};

// Parsing helpers
pub use reset::{ParseClock, parse_reset_time};
pub use text::{clean_terminal_bytes, excerpt};

// Strategy
pub use strategy::{FetchResult, FetchStrategy, StrategyInfo};
