//! Native pseudo-terminal sessions for interactive CLI tools.
//!
//! A [`PtySession`] owns one child process attached to the slave side of a
//! freshly allocated PTY. The master side is switched to non-blocking mode
//! so [`Terminal::read_available`] returns immediately when the CLI is
//! quiet; the drive loop does its own pacing.
//!
//! Cleanup is tied to the session value: [`Terminal::shutdown`] runs the
//! full exit sequence (exit command, SIGTERM, bounded wait, force kill,
//! reap) and `Drop` calls it, so an early return can never leak the child.
//!
//! # Example
//!
//! ```no_run
//! use cliprobe_fetch::buffer::CapturedBuffer;
//! use cliprobe_fetch::host::{PtyOptions, PtySession, Terminal};
//!
//! # fn example() -> Result<(), cliprobe_fetch::PtyError> {
//! let mut session = PtySession::spawn("claude", &PtyOptions::default())?;
//! session.write_str("/usage\r")?;
//! let mut buffer = CapturedBuffer::new();
//! let _status = session.read_available(&mut buffer)?;
//! session.shutdown(Some("/exit"));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::RawFd;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::{debug, instrument, trace, warn};

use super::{READ_CHUNK_SIZE, ReadStatus, Terminal};
use crate::buffer::CapturedBuffer;
use crate::error::PtyError;

// ============================================================================
// Constants
// ============================================================================

/// Default terminal height in rows.
pub const DEFAULT_ROWS: u16 = 50;

/// Default terminal width in columns.
pub const DEFAULT_COLS: u16 = 160;

/// Default overall timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// How long the CLI gets to honour its own exit command.
const EXIT_COMMAND_GRACE: Duration = Duration::from_millis(500);

/// How long the child gets after SIGTERM before it is force-killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// Polling interval while waiting for the child to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pause between attempts when the PTY input queue is full.
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Number of full-queue retries before a write gives up (about one second).
const WRITE_RETRY_LIMIT: u32 = 200;

/// Directories searched when the binary is not on `PATH`, relative to `$HOME`.
const HOME_FALLBACK_DIRS: &[&str] = &[
    ".local/bin",
    ".npm-global/bin",
    ".bun/bin",
    ".claude/local",
];

/// Absolute directories searched when the binary is not on `PATH`.
const SYSTEM_FALLBACK_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];

// ============================================================================
// PTY Options
// ============================================================================

/// Configuration for one PTY invocation. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyOptions {
    /// Terminal height. Larger screens truncate long status views less.
    pub rows: u16,

    /// Terminal width.
    pub cols: u16,

    /// Overall deadline for one probe attempt.
    pub timeout: Duration,

    /// Launch arguments passed to the binary (e.g. sandboxing flags).
    pub extra_args: Vec<String>,

    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            timeout: DEFAULT_TIMEOUT,
            extra_args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

impl PtyOptions {
    /// Create options with just a timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the screen size.
    #[must_use]
    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Replace the launch arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Binary Resolution
// ============================================================================

/// Resolves a binary name to an executable path.
///
/// Names containing a path separator are taken verbatim. Otherwise `PATH`
/// is searched first, then the usual Homebrew and per-user install
/// directories (GUI launches often run with a minimal `PATH`).
pub fn resolve_binary(binary: &str) -> Option<PathBuf> {
    if binary.contains(MAIN_SEPARATOR) {
        let path = PathBuf::from(binary);
        return is_executable(&path).then_some(path);
    }

    if let Ok(path) = which::which(binary) {
        return Some(path);
    }

    fallback_dirs()
        .into_iter()
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

fn fallback_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = SYSTEM_FALLBACK_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = dirs::home_dir() {
        dirs.extend(HOME_FALLBACK_DIRS.iter().map(|rel| home.join(rel)));
    }
    dirs
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

// ============================================================================
// PTY Session
// ============================================================================

/// One child process running on a non-blocking PTY.
pub struct PtySession {
    binary: PathBuf,
    child: Box<dyn Child + Send + Sync>,
    master: Box<dyn MasterPty + Send>,
    reader: Box<dyn Read + Send>,
    writer: Option<Box<dyn Write + Send>>,
    finished: bool,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("binary", &self.binary)
            .field("pid", &self.child.process_id())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl PtySession {
    /// Resolves `binary`, allocates a PTY of the requested size and spawns
    /// the child on its slave side.
    ///
    /// # Errors
    ///
    /// - [`PtyError::NotFound`] if the binary cannot be resolved
    /// - [`PtyError::CreateFailed`] if the PTY cannot be allocated or configured
    /// - [`PtyError::SpawnFailed`] if the process cannot be started
    #[instrument(skip(options), fields(rows = options.rows, cols = options.cols))]
    pub fn spawn(binary: &str, options: &PtyOptions) -> Result<Self, PtyError> {
        let binary_path = resolve_binary(binary).ok_or_else(|| {
            warn!(binary = %binary, "Binary not found");
            PtyError::NotFound(binary.to_string())
        })?;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: options.rows,
                cols: options.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&binary_path);
        cmd.args(&options.extra_args);
        if let Some(ref dir) = options.working_dir {
            cmd.cwd(dir);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;
        // The child holds its own copy; ours would keep EOF from ever arriving.
        drop(pair.slave);

        let master = pair.master;
        let reader = master
            .try_clone_reader()
            .map_err(|e| PtyError::CreateFailed(format!("Failed to get PTY reader: {e}")))?;
        let writer = master
            .take_writer()
            .map_err(|e| PtyError::CreateFailed(format!("Failed to get PTY writer: {e}")))?;

        let session = Self {
            binary: binary_path,
            child,
            master,
            reader,
            writer: Some(writer),
            finished: false,
        };

        // From here on `session` owns the child; an error drops it, which reaps.
        let fd = session
            .master
            .as_raw_fd()
            .ok_or_else(|| PtyError::CreateFailed("PTY master has no file descriptor".into()))?;
        set_nonblocking(fd).map_err(|e| PtyError::CreateFailed(format!("fcntl: {e}")))?;

        debug!(
            binary_path = %session.binary.display(),
            pid = ?session.child.process_id(),
            "Spawned PTY session"
        );
        Ok(session)
    }

    /// Path of the running binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// OS process id of the child, while it has one.
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Polls until the child exits or `timeout` elapses.
    fn wait_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(exit_code = status.exit_code(), "Child exited");
                    return true;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to poll child status");
                    return false;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn terminate(&self) {
        let Some(pid) = self.child.process_id() else {
            return;
        };
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return;
        };
        // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            debug!(error = %io::Error::last_os_error(), "SIGTERM failed");
        }
    }
}

impl Terminal for PtySession {
    fn read_available(&mut self, buffer: &mut CapturedBuffer) -> Result<ReadStatus, PtyError> {
        if self.finished {
            return Ok(ReadStatus::Closed);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.reader.read(&mut chunk) {
            Ok(0) => Ok(ReadStatus::Closed),
            Ok(n) => {
                trace!(bytes = n, "PTY read");
                buffer.extend(&chunk[..n]);
                Ok(ReadStatus::Data(n))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                Ok(ReadStatus::Idle)
            }
            // Linux reports EIO on the master once every slave fd is closed.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => Ok(ReadStatus::Closed),
            Err(e) => Err(PtyError::Io(e)),
        }
    }

    fn write_str(&mut self, text: &str) -> Result<(), PtyError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PtyError::Io(io::Error::from(io::ErrorKind::BrokenPipe)))?;

        let data = text.as_bytes();
        let mut written = 0;
        let mut retries = 0u32;
        while written < data.len() {
            match writer.write(&data[written..]) {
                Ok(0) => return Err(PtyError::Io(io::Error::from(io::ErrorKind::WriteZero))),
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    retries += 1;
                    if retries > WRITE_RETRY_LIMIT {
                        return Err(PtyError::Io(e));
                    }
                    thread::sleep(WRITE_RETRY_DELAY);
                }
                Err(e) => return Err(PtyError::Io(e)),
            }
        }
        match writer.flush() {
            Err(e) if e.kind() != io::ErrorKind::WouldBlock => Err(PtyError::Io(e)),
            _ => Ok(()),
        }
    }

    fn is_alive(&mut self) -> bool {
        !self.finished && matches!(self.child.try_wait(), Ok(None))
    }

    #[instrument(skip(self), fields(binary = %self.binary.display()))]
    fn shutdown(&mut self, exit_command: Option<&str>) {
        if self.finished {
            return;
        }

        if let Some(command) = exit_command {
            if self.is_alive() {
                match self.write_str(&format!("{command}\r")) {
                    Ok(()) => {
                        self.wait_exit(EXIT_COMMAND_GRACE);
                    }
                    Err(e) => debug!(error = %e, "Exit command not delivered"),
                }
            }
        }

        if !self.wait_exit(Duration::ZERO) {
            self.terminate();
            if !self.wait_exit(TERMINATE_GRACE) {
                debug!("Child ignored SIGTERM, killing");
                if let Err(e) = self.child.kill() {
                    warn!(error = %e, "Failed to kill child");
                }
            }
        }

        if let Err(e) = self.child.wait() {
            warn!(error = %e, "Failed to reap child");
        }

        self.writer = None;
        self.finished = true;
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.shutdown(None);
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` belongs to the live master PTY for the duration of both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
