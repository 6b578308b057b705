//! Legacy transport: drive the CLI inside a detached tmux session.
//!
//! Instead of reading a PTY stream, each poll captures the visible pane
//! with `tmux capture-pane -p`. Whenever the snapshot differs from the
//! previous one it is appended to the capture buffer as a "redraw", so the
//! detector and parsers see the same kind of accumulated text as with the
//! native PTY transport.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use super::pty::{PtyOptions, resolve_binary};
use super::{ReadStatus, Terminal};
use crate::buffer::CapturedBuffer;
use crate::error::PtyError;

/// Time the CLI gets to act on its exit command before the session is killed.
const EXIT_COMMAND_GRACE: Duration = Duration::from_millis(500);

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One keystroke batch for `tmux send-keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyChunk {
    /// Sent with `-l`, no key-name lookup.
    Literal(String),
    /// A named key such as `Enter` or `Escape`.
    Named(&'static str),
}

/// Splits text into literal runs and named control keys.
fn split_keys(text: &str) -> Vec<KeyChunk> {
    let mut chunks = Vec::new();
    let mut literal = String::new();
    for c in text.chars() {
        let named = match c {
            '\r' | '\n' => Some("Enter"),
            '\x1b' => Some("Escape"),
            '\t' => Some("Tab"),
            _ => None,
        };
        match named {
            Some(key) => {
                if !literal.is_empty() {
                    chunks.push(KeyChunk::Literal(std::mem::take(&mut literal)));
                }
                chunks.push(KeyChunk::Named(key));
            }
            None => literal.push(c),
        }
    }
    if !literal.is_empty() {
        chunks.push(KeyChunk::Literal(literal));
    }
    chunks
}

/// A CLI running in a private, detached tmux session.
#[derive(Debug)]
pub struct TmuxSession {
    tmux: PathBuf,
    name: String,
    last_snapshot: String,
    finished: bool,
}

impl TmuxSession {
    /// Starts `binary` in a new detached tmux session sized like the PTY would be.
    ///
    /// # Errors
    ///
    /// - [`PtyError::NotFound`] if either tmux or the binary is missing
    /// - [`PtyError::SpawnFailed`] if tmux refuses to create the session
    #[instrument(skip(options), fields(rows = options.rows, cols = options.cols))]
    pub fn spawn(binary: &str, options: &PtyOptions) -> Result<Self, PtyError> {
        let tmux = resolve_binary("tmux").ok_or_else(|| PtyError::NotFound("tmux".to_string()))?;
        let binary_path =
            resolve_binary(binary).ok_or_else(|| PtyError::NotFound(binary.to_string()))?;

        let name = format!(
            "cliprobe-{}-{}",
            std::process::id(),
            SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
        );

        let mut cmd = Command::new(&tmux);
        cmd.args(["new-session", "-d", "-s", &name])
            .args(["-x", &options.cols.to_string(), "-y", &options.rows.to_string()]);
        if let Some(ref dir) = options.working_dir {
            cmd.arg("-c").arg(dir);
        }
        for (key, value) in &options.env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg("--").arg(&binary_path).args(&options.extra_args);

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PtyError::SpawnFailed(stderr.trim().to_string()));
        }

        debug!(session = %name, binary_path = %binary_path.display(), "Started tmux session");
        Ok(Self {
            tmux,
            name,
            last_snapshot: String::new(),
            finished: false,
        })
    }

    /// Name of the tmux session.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn tmux(&self, args: &[&str]) -> std::io::Result<Output> {
        Command::new(&self.tmux)
            .args(args)
            .stdin(Stdio::null())
            .output()
    }

    fn send_keys(&self, chunk: &KeyChunk) -> Result<(), PtyError> {
        let output = match chunk {
            KeyChunk::Literal(text) => {
                self.tmux(&["send-keys", "-t", &self.name, "-l", "--", text])?
            }
            KeyChunk::Named(key) => self.tmux(&["send-keys", "-t", &self.name, key])?,
        };
        if output.status.success() {
            Ok(())
        } else {
            Err(PtyError::Io(std::io::Error::other(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )))
        }
    }
}

impl Terminal for TmuxSession {
    fn read_available(&mut self, buffer: &mut CapturedBuffer) -> Result<ReadStatus, PtyError> {
        if self.finished {
            return Ok(ReadStatus::Closed);
        }

        let output = self.tmux(&["capture-pane", "-p", "-J", "-t", &self.name])?;
        if !output.status.success() {
            // The session disappears with the CLI.
            return Ok(ReadStatus::Closed);
        }

        let snapshot = String::from_utf8_lossy(&output.stdout).into_owned();
        if snapshot == self.last_snapshot {
            return Ok(ReadStatus::Idle);
        }

        let mut redraw = snapshot.clone().into_bytes();
        redraw.push(b'\n');
        buffer.extend(&redraw);
        trace!(bytes = redraw.len(), "Pane redraw");
        self.last_snapshot = snapshot;
        Ok(ReadStatus::Data(redraw.len()))
    }

    fn write_str(&mut self, text: &str) -> Result<(), PtyError> {
        if self.finished {
            return Err(PtyError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        for chunk in split_keys(text) {
            self.send_keys(&chunk)?;
        }
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        !self.finished
            && self
                .tmux(&["has-session", "-t", &self.name])
                .map(|o| o.status.success())
                .unwrap_or(false)
    }

    #[instrument(skip(self), fields(session = %self.name))]
    fn shutdown(&mut self, exit_command: Option<&str>) {
        if self.finished {
            return;
        }

        if let Some(command) = exit_command {
            if self.is_alive() && self.write_str(&format!("{command}\r")).is_ok() {
                thread::sleep(EXIT_COMMAND_GRACE);
            }
        }

        match self.tmux(&["kill-session", "-t", &self.name]) {
            Ok(_) => debug!("tmux session closed"),
            Err(e) => warn!(error = %e, "Failed to kill tmux session"),
        }
        self.finished = true;
    }
}

impl Drop for TmuxSession {
    fn drop(&mut self) {
        self.shutdown(None);
    }
}

// ============================================================================
// Tests
// ============================================================================
