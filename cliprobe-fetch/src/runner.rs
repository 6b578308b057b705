//! The `run(binary, script, options)` seam.
//!
//! Probes depend on [`ProbeRunner`] rather than on a concrete transport, so
//! parsers and strategies can be exercised against canned captures and the
//! legacy tmux transport can stand in for the native PTY.

use cliprobe_core::FetchSource;
use tracing::instrument;

use crate::drive::{DriveLoop, DriveReport, DriveTimings, ProbeScript};
use crate::error::ProbeError;
use crate::host::{PtyOptions, PtySession, TmuxSession};

/// The capture of one probe attempt.
#[derive(Debug, Clone)]
pub struct ProbeCapture {
    /// Which transport produced it.
    pub source: FetchSource,
    /// What the drive loop saw and did.
    pub report: DriveReport,
}

impl ProbeCapture {
    /// Cleaned text of the whole capture.
    pub fn text(&self) -> &str {
        &self.report.text
    }
}

/// Runs a probe script against a binary.
///
/// `Err` is reserved for failures to start the session at all. Failures
/// during the attempt are reported in [`DriveReport::outcome`] so the
/// capture stays available for diagnostics.
pub trait ProbeRunner: Send + Sync {
    /// The transport used.
    fn source(&self) -> FetchSource;

    /// Runs one attempt from scratch: fresh process, fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::BinaryNotFound`] or [`ProbeError::LaunchFailed`].
    fn run(
        &self,
        binary: &str,
        script: &ProbeScript,
        options: &PtyOptions,
    ) -> Result<ProbeCapture, ProbeError>;
}

/// Runs probes on a native PTY.
#[derive(Debug, Clone, Default)]
pub struct PtyProbeRunner {
    timings: DriveTimings,
}

impl PtyProbeRunner {
    /// Creates a runner with the default timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner with custom timings.
    pub fn with_timings(timings: DriveTimings) -> Self {
        Self { timings }
    }
}

impl ProbeRunner for PtyProbeRunner {
    fn source(&self) -> FetchSource {
        FetchSource::Pty
    }

    #[instrument(skip(self, script, options), fields(rows = options.rows, cols = options.cols))]
    fn run(
        &self,
        binary: &str,
        script: &ProbeScript,
        options: &PtyOptions,
    ) -> Result<ProbeCapture, ProbeError> {
        let mut session = PtySession::spawn(binary, options)?;
        let report = DriveLoop::new(script, &self.timings).run(&mut session, options.timeout);
        Ok(ProbeCapture {
            source: self.source(),
            report,
        })
    }
}

/// Runs probes inside a detached tmux session.
#[derive(Debug, Clone, Default)]
pub struct TmuxProbeRunner {
    timings: DriveTimings,
}

impl TmuxProbeRunner {
    /// Creates a runner with the default timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner with custom timings.
    pub fn with_timings(timings: DriveTimings) -> Self {
        Self { timings }
    }
}

impl ProbeRunner for TmuxProbeRunner {
    fn source(&self) -> FetchSource {
        FetchSource::Tmux
    }

    #[instrument(skip(self, script, options), fields(rows = options.rows, cols = options.cols))]
    fn run(
        &self,
        binary: &str,
        script: &ProbeScript,
        options: &PtyOptions,
    ) -> Result<ProbeCapture, ProbeError> {
        let mut session = TmuxSession::spawn(binary, options)?;
        let report = DriveLoop::new(script, &self.timings).run(&mut session, options.timeout);
        Ok(ProbeCapture {
            source: self.source(),
            report,
        })
    }
}

/// Returns the runner for a transport.
pub fn runner_for(source: FetchSource, timings: DriveTimings) -> Box<dyn ProbeRunner> {
    match source {
        FetchSource::Pty => Box::new(PtyProbeRunner::with_timings(timings)),
        FetchSource::Tmux => Box::new(TmuxProbeRunner::with_timings(timings)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::MarkerSet;

    #[test]
    fn test_missing_binary_is_classified() {
        let runner = PtyProbeRunner::new();
        let script = ProbeScript::new("/usage", MarkerSet::new());
        let err = runner
            .run("definitely_not_a_real_command_xyz123", &script, &PtyOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            ProbeError::BinaryNotFound("definitely_not_a_real_command_xyz123".to_string())
        );
    }

    #[test]
    fn test_runner_for_source() {
        assert_eq!(
            runner_for(FetchSource::Pty, DriveTimings::default()).source(),
            FetchSource::Pty
        );
        assert_eq!(
            runner_for(FetchSource::Tmux, DriveTimings::default()).source(),
            FetchSource::Tmux
        );
    }
}
