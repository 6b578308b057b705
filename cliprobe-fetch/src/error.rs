//! Probe error types.

use thiserror::Error;

// ============================================================================
// Probe Error
// ============================================================================

/// Caller-visible failure of one probe invocation.
///
/// This is a closed taxonomy: every failure inside the session runner or the
/// drive loop is classified into one of these before it leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The CLI binary could not be resolved on PATH or in the well-known
    /// install directories.
    #[error("CLI binary not found: {0}")]
    BinaryNotFound(String),

    /// PTY allocation or process spawn failed.
    #[error("Failed to launch CLI: {0}")]
    LaunchFailed(String),

    /// The target screen never appeared before the deadline.
    #[error("Timed out waiting for the CLI")]
    TimedOut,

    /// The screen was captured but no usage fields could be extracted.
    #[error("Could not parse CLI output: {0}")]
    ParseFailed(String),

    /// The CLI is blocked on an update banner.
    #[error("CLI update required: {0}")]
    UpdateRequired(String),

    /// The CLI wants an interactive login first.
    #[error("CLI is not signed in")]
    AuthRequired,
}

impl ProbeError {
    /// Returns true if a fresh attempt with relaxed parameters may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut | Self::ParseFailed(_))
    }

    /// Returns a short actionable message for the end user.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::BinaryNotFound(_) => "Install the CLI or add its directory to PATH.",
            Self::LaunchFailed(_) => "Check that the CLI starts in a terminal on this machine.",
            Self::TimedOut => "The CLI did not show its usage screen in time; try again.",
            Self::ParseFailed(_) => {
                "The usage screen changed or is not available yet; try again later."
            }
            Self::UpdateRequired(_) => "Update the CLI, then run it once interactively.",
            Self::AuthRequired => "Run the CLI once and complete its login flow.",
        }
    }

    /// Returns a stable snake_case code for machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BinaryNotFound(_) => "binary_not_found",
            Self::LaunchFailed(_) => "launch_failed",
            Self::TimedOut => "timed_out",
            Self::ParseFailed(_) => "parse_failed",
            Self::UpdateRequired(_) => "update_required",
            Self::AuthRequired => "auth_required",
        }
    }
}

impl From<PtyError> for ProbeError {
    fn from(err: PtyError) -> Self {
        match err {
            PtyError::NotFound(binary) => Self::BinaryNotFound(binary),
            other => Self::LaunchFailed(other.to_string()),
        }
    }
}

// ============================================================================
// PTY Error
// ============================================================================

/// Error type for terminal session operations.
#[derive(Debug, Error)]
pub enum PtyError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Failed to create PTY.
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),

    /// Failed to spawn process.
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
