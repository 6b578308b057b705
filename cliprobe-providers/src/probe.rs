//! Shared probe plumbing.
//!
//! A [`CliProbe`] bundles everything one tuned CLI needs: the binary, its
//! [`ProbeScript`], default launch flags, the escalation ladder and the
//! output parser. Each attempt goes through a [`ProbeRunner`], so tests can
//! swap the native PTY for canned captures.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cliprobe_core::{FetchSource, ProviderKind, UsageSnapshot};
use cliprobe_fetch::{
    DriveOutcome, DriveTimings, EscalationPolicy, ParseClock, ProbeCapture, ProbeError,
    ProbeRunner, ProbeScript, ProbeTier, PtyOptions, resolve_binary, runner_for,
};
use tracing::{debug, instrument, warn};

/// Parses a cleaned capture into a snapshot.
pub type ParseFn = fn(&str, &ParseClock) -> Result<UsageSnapshot, ProbeError>;

/// Strategy identifier, `{provider}.{transport}`.
pub fn strategy_id(provider: ProviderKind, source: FetchSource) -> String {
    let transport = match source {
        FetchSource::Pty => "pty",
        FetchSource::Tmux => "tmux",
    };
    format!("{}.{transport}", provider.cli_name())
}

/// A full probe run: the parsed result and the capture behind it.
#[derive(Debug, Clone)]
pub struct ProbeRun {
    /// Snapshot or classified failure.
    pub result: Result<UsageSnapshot, ProbeError>,
    /// Last capture taken across the ladder.
    pub capture: Option<ProbeCapture>,
}

/// One tuned interactive CLI, ready to be probed.
#[derive(Clone)]
pub struct CliProbe {
    provider: ProviderKind,
    binary: String,
    script: Arc<ProbeScript>,
    base_options: PtyOptions,
    policy: EscalationPolicy,
    runner: Arc<dyn ProbeRunner>,
    parse: ParseFn,
}

impl fmt::Debug for CliProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliProbe")
            .field("provider", &self.provider)
            .field("binary", &self.binary)
            .field("command", &self.script.command)
            .field("source", &self.runner.source())
            .field("tiers", &self.policy.tiers().len())
            .finish_non_exhaustive()
    }
}

impl CliProbe {
    /// Creates a probe on the native PTY transport with default timings.
    pub fn new(
        provider: ProviderKind,
        script: ProbeScript,
        base_options: PtyOptions,
        policy: EscalationPolicy,
        parse: ParseFn,
    ) -> Self {
        Self {
            provider,
            binary: provider.binary_name().to_string(),
            script: Arc::new(script),
            base_options,
            policy,
            runner: runner_for(FetchSource::Pty, DriveTimings::default()).into(),
            parse,
        }
    }

    /// Overrides the binary name or path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Replaces the default launch flags.
    #[must_use]
    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.base_options.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the first tier's timeout; the second keeps its ratio.
    #[must_use]
    pub fn with_first_timeout(mut self, timeout: Duration) -> Self {
        self.policy = self.policy.with_first_timeout(timeout);
        self
    }

    /// Switches the transport.
    #[must_use]
    pub fn with_transport(mut self, source: FetchSource, timings: DriveTimings) -> Self {
        self.runner = runner_for(source, timings).into();
        self
    }

    /// Uses a custom runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProbeRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// The provider probed.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// The binary name or path launched.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// The interaction script.
    pub fn script(&self) -> &ProbeScript {
        &self.script
    }

    /// The escalation ladder.
    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Launch options before a tier's size and deadline are applied.
    pub fn base_options(&self) -> &PtyOptions {
        &self.base_options
    }

    /// The transport used.
    pub fn source(&self) -> FetchSource {
        self.runner.source()
    }

    /// Returns true if the binary resolves. No process is started.
    pub fn is_available(&self) -> bool {
        resolve_binary(&self.binary).is_some()
    }

    /// Runs one attempt on `tier` and hands the capture to the parser.
    ///
    /// # Errors
    ///
    /// Returns the drive loop's classified failure or the parser's
    /// [`ProbeError::ParseFailed`].
    #[instrument(skip(self, clock), fields(provider = %self.provider.cli_name(), cols = tier.cols))]
    pub fn attempt(&self, tier: &ProbeTier, clock: &ParseClock) -> Result<UsageSnapshot, ProbeError> {
        let capture = self.capture(tier)?;
        self.evaluate(&capture, clock)
    }

    /// Runs the whole ladder synchronously.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error or the last tier's error.
    pub fn fetch_blocking(&self, clock: &ParseClock) -> Result<UsageSnapshot, ProbeError> {
        self.policy.run(|tier| self.attempt(tier, clock))
    }

    /// Runs the whole ladder and keeps the last capture taken.
    ///
    /// The capture is `None` only when no session could be started.
    #[instrument(skip(self, clock), fields(provider = %self.provider.cli_name()))]
    pub fn run_blocking(&self, clock: &ParseClock) -> ProbeRun {
        let mut last = None;
        let result = self.policy.run(|tier| {
            let capture = self.capture(tier)?;
            let parsed = self.evaluate(&capture, clock);
            last = Some(capture);
            parsed
        });
        ProbeRun {
            result,
            capture: last,
        }
    }

    /// Async form of [`CliProbe::run_blocking`].
    pub async fn run(&self) -> ProbeRun {
        let probe = self.clone();
        match tokio::task::spawn_blocking(move || probe.run_blocking(&ParseClock::system())).await {
            Ok(run) => run,
            Err(e) => ProbeRun {
                result: Err(ProbeError::LaunchFailed(format!("probe task failed: {e}"))),
                capture: None,
            },
        }
    }

    /// Runs the ladder on the blocking pool.
    ///
    /// # Errors
    ///
    /// See [`CliProbe::fetch_blocking`].
    #[instrument(skip(self), fields(provider = %self.provider.cli_name()))]
    pub async fn fetch_usage(&self) -> Result<UsageSnapshot, ProbeError> {
        let probe = self.clone();
        tokio::task::spawn_blocking(move || probe.fetch_blocking(&ParseClock::system()))
            .await
            .map_err(|e| ProbeError::LaunchFailed(format!("probe task failed: {e}")))?
    }

    /// Runs one attempt on the 1-based `tier` and returns the capture
    /// unparsed, through the same drive loop as [`CliProbe::fetch_usage`].
    ///
    /// Tier numbers past the ladder use its last tier.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::BinaryNotFound`] or [`ProbeError::LaunchFailed`].
    pub fn debug_raw_blocking(&self, tier: usize) -> Result<ProbeCapture, ProbeError> {
        let tier = self
            .policy
            .tier(tier)
            .or_else(|| self.policy.tiers().last())
            .copied()
            .ok_or_else(|| ProbeError::LaunchFailed("no escalation tiers configured".to_string()))?;
        self.capture(&tier)
    }

    /// Async form of [`CliProbe::debug_raw_blocking`].
    ///
    /// # Errors
    ///
    /// See [`CliProbe::debug_raw_blocking`].
    pub async fn debug_raw(&self, tier: usize) -> Result<ProbeCapture, ProbeError> {
        let probe = self.clone();
        tokio::task::spawn_blocking(move || probe.debug_raw_blocking(tier))
            .await
            .map_err(|e| ProbeError::LaunchFailed(format!("probe task failed: {e}")))?
    }

    fn evaluate(&self, capture: &ProbeCapture, clock: &ParseClock) -> Result<UsageSnapshot, ProbeError> {
        let report = &capture.report;
        debug!(
            outcome = ?report.outcome,
            enter_retries = report.enter_retries,
            command_resends = report.command_resends,
            elapsed_ms = report.elapsed.as_millis(),
            "Attempt finished"
        );

        match &report.outcome {
            DriveOutcome::Failed(e) => Err(e.clone()),
            DriveOutcome::ChildExited => {
                warn!("CLI exited before the usage screen settled, parsing what was captured");
                self.parse_capture(capture, clock)
            }
            DriveOutcome::Completed => self.parse_capture(capture, clock),
        }
    }

    fn capture(&self, tier: &ProbeTier) -> Result<ProbeCapture, ProbeError> {
        let options = tier.apply(&self.base_options);
        self.runner.run(&self.binary, &self.script, &options)
    }

    fn parse_capture(
        &self,
        capture: &ProbeCapture,
        clock: &ParseClock,
    ) -> Result<UsageSnapshot, ProbeError> {
        let mut snapshot = (self.parse)(capture.text(), clock)?;
        if let Err(e) = snapshot.validate() {
            warn!(error = %e, "Clamping out-of-range usage");
            snapshot.sanitize();
        }
        snapshot.fetch_source = capture.source;
        Ok(snapshot)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use cliprobe_core::RateWindow;
    use cliprobe_fetch::{DriveReport, DriveState, MarkerSet};

    use super::*;

    /// Replays one outcome per call and records the sizes it was asked for.
    struct CannedRunner {
        outcomes: Mutex<Vec<(DriveOutcome, &'static str)>>,
        sizes: Mutex<Vec<(u16, u16)>>,
    }

    impl CannedRunner {
        fn new(outcomes: Vec<(DriveOutcome, &'static str)>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                sizes: Mutex::new(Vec::new()),
            })
        }
    }

    impl ProbeRunner for CannedRunner {
        fn source(&self) -> FetchSource {
            FetchSource::Tmux
        }

        fn run(
            &self,
            _binary: &str,
            _script: &ProbeScript,
            options: &PtyOptions,
        ) -> Result<ProbeCapture, ProbeError> {
            self.sizes.lock().unwrap().push((options.rows, options.cols));
            let (outcome, text) = self.outcomes.lock().unwrap().remove(0);
            Ok(ProbeCapture {
                source: FetchSource::Tmux,
                report: DriveReport {
                    raw: text.as_bytes().to_vec(),
                    text: text.to_string(),
                    trace: vec![DriveState::Booting],
                    enter_retries: 0,
                    command_resends: 0,
                    prompt_responses: 0,
                    cursor_reports: 0,
                    elapsed: Duration::from_millis(5),
                    outcome,
                },
            })
        }
    }

    fn parse_number(text: &str, clock: &ParseClock) -> Result<UsageSnapshot, ProbeError> {
        let used: f64 = text
            .trim()
            .parse()
            .map_err(|_| ProbeError::ParseFailed(text.to_string()))?;
        let mut snapshot = UsageSnapshot::at(clock.now_utc());
        snapshot.primary = Some(RateWindow::new(used));
        Ok(snapshot)
    }

    fn probe(runner: Arc<CannedRunner>) -> CliProbe {
        CliProbe::new(
            ProviderKind::Claude,
            ProbeScript::new("/usage", MarkerSet::new()),
            PtyOptions::default(),
            EscalationPolicy::two_tier(
                ProbeTier::new(50, 160, Duration::from_secs(20)),
                ProbeTier::new(70, 220, Duration::from_secs(35)),
            ),
            parse_number,
        )
        .with_runner(runner)
    }

    fn clock() -> ParseClock {
        ParseClock::utc(Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_completed_capture_is_parsed() {
        let runner = CannedRunner::new(vec![(DriveOutcome::Completed, "42")]);
        let snapshot = probe(runner.clone()).fetch_blocking(&clock()).unwrap();

        assert!((snapshot.primary.unwrap().used_percent - 42.0).abs() < 0.01);
        assert_eq!(snapshot.fetch_source, FetchSource::Tmux);
        assert_eq!(snapshot.updated_at, clock().now_utc());
        assert_eq!(runner.sizes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_failure_escalates_to_larger_screen() {
        let runner = CannedRunner::new(vec![
            (DriveOutcome::Completed, "garbage"),
            (DriveOutcome::ChildExited, "17"),
        ]);
        let snapshot = probe(runner.clone()).fetch_blocking(&clock()).unwrap();

        assert!((snapshot.primary.unwrap().used_percent - 17.0).abs() < 0.01);
        assert_eq!(*runner.sizes.lock().unwrap(), vec![(50, 160), (70, 220)]);
    }

    #[test]
    fn test_auth_failure_is_not_retried() {
        let runner = CannedRunner::new(vec![(
            DriveOutcome::Failed(ProbeError::AuthRequired),
            "Please run /login",
        )]);
        let err = probe(runner.clone()).fetch_blocking(&clock()).unwrap_err();

        assert_eq!(err, ProbeError::AuthRequired);
        assert_eq!(runner.sizes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_run_keeps_last_capture() {
        let runner = CannedRunner::new(vec![
            (DriveOutcome::Completed, "garbage"),
            (DriveOutcome::Failed(ProbeError::TimedOut), "still booting"),
        ]);
        let run = probe(runner).run_blocking(&clock());

        assert_eq!(run.result.unwrap_err(), ProbeError::TimedOut);
        assert_eq!(run.capture.unwrap().text(), "still booting");
    }

    #[test]
    fn test_debug_raw_uses_requested_tier() {
        let runner = CannedRunner::new(vec![(DriveOutcome::Completed, "raw screen")]);
        let capture = probe(runner.clone()).debug_raw_blocking(2).unwrap();

        assert_eq!(capture.text(), "raw screen");
        assert_eq!(*runner.sizes.lock().unwrap(), vec![(70, 220)]);
    }

    #[test]
    fn test_overrides() {
        let runner = CannedRunner::new(Vec::new());
        let probe = probe(runner)
            .with_binary("/opt/claude/bin/claude")
            .with_extra_args(["--debug"])
            .with_first_timeout(Duration::from_secs(40));

        assert_eq!(probe.binary(), "/opt/claude/bin/claude");
        assert_eq!(probe.base_options().extra_args, vec!["--debug".to_string()]);
        assert_eq!(probe.policy().tiers()[1].timeout, Duration::from_secs(70));
        assert_eq!(probe.source(), FetchSource::Tmux);
        assert!(!probe.with_binary("definitely_not_a_real_command_xyz123").is_available());
    }

    #[tokio::test]
    async fn test_fetch_usage_runs_on_blocking_pool() {
        let runner = CannedRunner::new(vec![(DriveOutcome::Completed, "5")]);
        let snapshot = probe(runner).fetch_usage().await.unwrap();
        assert!((snapshot.primary.unwrap().used_percent - 5.0).abs() < 0.01);
    }
}
