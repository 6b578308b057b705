//! Terminal transports for interactive CLIs.
//!
//! - [`pty`] - native pseudo-terminal sessions (the default)
//! - [`tmux`] - legacy transport driving a detached tmux pane
//!
//! Both implement [`Terminal`], the narrow seam the drive loop is written
//! against. Tests substitute a scripted in-memory terminal.

pub mod pty;
pub mod tmux;

use crate::buffer::CapturedBuffer;
use crate::error::PtyError;

pub use pty::{PtyOptions, PtySession, resolve_binary};
pub use tmux::TmuxSession;

/// Maximum number of bytes taken by one non-blocking read.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Outcome of one non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were appended to the buffer.
    Data(usize),
    /// Nothing ready right now.
    Idle,
    /// The other side is gone (EOF, or EIO once the slave closed).
    Closed,
}

/// A live interactive session the drive loop can poll and type into.
pub trait Terminal {
    /// Performs one non-blocking read of at most [`READ_CHUNK_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected I/O failures; "no data yet"
    /// is [`ReadStatus::Idle`].
    fn read_available(&mut self, buffer: &mut CapturedBuffer) -> Result<ReadStatus, PtyError>;

    /// Writes text (commands or single control characters) to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session no longer accepts input.
    fn write_str(&mut self, text: &str) -> Result<(), PtyError>;

    /// Returns true while the child process is running.
    fn is_alive(&mut self) -> bool;

    /// Ends the session and reaps the child. Safe to call more than once.
    fn shutdown(&mut self, exit_command: Option<&str>);
}
