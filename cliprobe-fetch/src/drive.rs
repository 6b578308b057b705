//! The drive loop.
//!
//! One probe attempt is a synchronous polling state machine:
//!
//! ```text
//! Booting -> AwaitingTargetCommand -> AwaitingData -> Settling -> Done
//! ```
//!
//! Every iteration drains whatever the terminal has ready, answers cursor
//! position queries, consults the [`MarkerSet`] and then either answers a
//! dialog, (re)sends keystrokes or advances the state. The only suspension
//! points are the sleeps between polls; the deadline is checked on every
//! iteration and there is no other cancellation.
//!
//! Keystrokes get lost. A CLI that is still painting may drop the Enter of
//! a slash command, or the command text itself. The loop therefore re-sends
//! Enter on a short cadence, and once that budget is spent re-types the
//! whole command on a longer one.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace, warn};

use crate::buffer::CapturedBuffer;
use crate::detect::{CURSOR_POSITION_REPORT, CursorQueryResponder, MarkerKind, MarkerSet};
use crate::error::{ProbeError, PtyError};
use crate::host::{ReadStatus, Terminal};

/// Upper bound on reads per poll, so a chatty child cannot starve the deadline check.
const MAX_READS_PER_POLL: usize = 64;

// ============================================================================
// Timings
// ============================================================================

/// Retry and settle cadence of the drive loop.
///
/// The defaults are empirically tuned against the real CLIs' boot and
/// render latency. Keep their ratios when adjusting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveTimings {
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Longest wait for a boot-complete marker before typing anyway.
    pub boot_grace: Duration,
    /// Pause after answering a dialog.
    pub prompt_settle: Duration,
    /// Minimum gap between Enter re-sends.
    pub enter_retry_interval: Duration,
    /// Enter re-send budget.
    pub max_enter_retries: u32,
    /// Minimum gap before re-typing the whole command.
    pub resend_interval: Duration,
    /// Command re-send budget, used once the Enter budget is spent.
    pub max_resends: u32,
    /// Extra read time once all required markers are present.
    pub settle_window: Duration,
    /// Cap on automatic dialog answers per attempt.
    pub max_prompt_responses: u32,
}

impl Default for DriveTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            boot_grace: Duration::from_secs(3),
            prompt_settle: Duration::from_millis(800),
            enter_retry_interval: Duration::from_millis(1500),
            max_enter_retries: 10,
            resend_interval: Duration::from_secs(3),
            max_resends: 3,
            settle_window: Duration::from_secs(2),
            max_prompt_responses: 6,
        }
    }
}

// ============================================================================
// Probe Script
// ============================================================================

/// A keystroke answer for a known dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptResponse {
    /// The dialog this answers.
    pub kind: MarkerKind,
    /// What to type (e.g. `"\r"` to accept, `"\x1b"` to dismiss).
    pub keys: String,
}

/// What to type into a CLI and what to wait for.
#[derive(Debug, Clone)]
pub struct ProbeScript {
    /// The target interaction, typed followed by Enter (e.g. `/usage`).
    pub command: String,
    /// Typed on shutdown before signals are used.
    pub exit_command: Option<String>,
    /// Automatic answers for dialogs.
    pub responses: Vec<PromptResponse>,
    /// Markers that must all be present before settling.
    pub required: Vec<MarkerKind>,
    /// The CLI's marker table.
    pub markers: MarkerSet,
}

impl ProbeScript {
    /// Creates a script that types `command` and detects with `markers`.
    pub fn new(command: impl Into<String>, markers: MarkerSet) -> Self {
        Self {
            command: command.into(),
            exit_command: None,
            responses: Vec::new(),
            required: Vec::new(),
            markers,
        }
    }

    /// Sets the graceful exit command.
    #[must_use]
    pub fn exit_with(mut self, command: impl Into<String>) -> Self {
        self.exit_command = Some(command.into());
        self
    }

    /// Adds an automatic dialog answer.
    #[must_use]
    pub fn respond(mut self, kind: MarkerKind, keys: impl Into<String>) -> Self {
        self.responses.push(PromptResponse {
            kind,
            keys: keys.into(),
        });
        self
    }

    /// Adds a required data marker.
    #[must_use]
    pub fn require(mut self, kind: MarkerKind) -> Self {
        if !self.required.contains(&kind) {
            self.required.push(kind);
        }
        self
    }

    /// Returns the configured answer for a dialog, if any.
    pub fn response_for(&self, kind: MarkerKind) -> Option<&str> {
        self.responses
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.keys.as_str())
    }
}

// ============================================================================
// States and Report
// ============================================================================

/// Drive loop states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    /// Waiting for the CLI to become ready; dialogs are answered here.
    Booting,
    /// Ready to type the target command.
    AwaitingTargetCommand,
    /// Command sent; waiting for every required marker.
    AwaitingData,
    /// Data found; reading trailing redraws.
    Settling,
    /// Finished.
    Done,
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Booting => "booting",
            Self::AwaitingTargetCommand => "awaiting-target-command",
            Self::AwaitingData => "awaiting-data",
            Self::Settling => "settling",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Every required marker was seen and the settle window elapsed.
    Completed,
    /// The child exited before the data appeared; the capture is still parsed.
    ChildExited,
    /// Classified failure.
    Failed(ProbeError),
}

/// Everything one attempt produced.
#[derive(Debug, Clone)]
pub struct DriveReport {
    /// Raw bytes read from the terminal.
    pub raw: Vec<u8>,
    /// Cleaned text of the whole capture.
    pub text: String,
    /// States visited, in order.
    pub trace: Vec<DriveState>,
    /// Enter keystrokes re-sent.
    pub enter_retries: u32,
    /// Whole-command re-sends.
    pub command_resends: u32,
    /// Dialogs answered automatically.
    pub prompt_responses: u32,
    /// Cursor position reports sent.
    pub cursor_reports: u32,
    /// Wall time of the attempt, excluding shutdown.
    pub elapsed: Duration,
    /// How it ended.
    pub outcome: DriveOutcome,
}

impl DriveReport {
    /// Returns true if the capture should be handed to a parser.
    pub fn has_capture(&self) -> bool {
        matches!(self.outcome, DriveOutcome::Completed | DriveOutcome::ChildExited)
    }

    /// Returns the classified failure, if any.
    pub fn error(&self) -> Option<&ProbeError> {
        match &self.outcome {
            DriveOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Drive Loop
// ============================================================================

/// Runs probe scripts against a [`Terminal`].
#[derive(Debug, Clone)]
pub struct DriveLoop<'a> {
    script: &'a ProbeScript,
    timings: &'a DriveTimings,
}

impl<'a> DriveLoop<'a> {
    /// Creates a loop for one script.
    pub fn new(script: &'a ProbeScript, timings: &'a DriveTimings) -> Self {
        Self { script, timings }
    }

    /// Drives `terminal` until done, fatal, or `timeout`, then shuts it down.
    ///
    /// The terminal is always shut down with the script's exit command,
    /// whatever the outcome.
    #[instrument(skip_all, fields(command = %self.script.command, timeout = ?timeout))]
    pub fn run<T: Terminal>(&self, terminal: &mut T, timeout: Duration) -> DriveReport {
        let mut attempt = Attempt::new(self.script, self.timings, timeout);
        let outcome = attempt.drive(terminal);
        let elapsed = attempt.started.elapsed();

        terminal.shutdown(self.script.exit_command.as_deref());

        match &outcome {
            DriveOutcome::Failed(e) => warn!(error = %e, ?elapsed, "Probe attempt failed"),
            other => debug!(outcome = ?other, ?elapsed, "Probe attempt finished"),
        }

        let text = attempt.buffer.full_text();
        DriveReport {
            raw: attempt.buffer.into_bytes(),
            text,
            trace: attempt.trace,
            enter_retries: attempt.enter_retries,
            command_resends: attempt.command_resends,
            prompt_responses: attempt.prompt_responses,
            cursor_reports: attempt.cursor_reports,
            elapsed,
            outcome,
        }
    }
}

/// Mutable state of one attempt.
struct Attempt<'a> {
    script: &'a ProbeScript,
    timings: &'a DriveTimings,
    started: Instant,
    deadline: Instant,
    buffer: CapturedBuffer,
    responder: CursorQueryResponder,
    state: DriveState,
    trace: Vec<DriveState>,
    last_enter: Instant,
    settle_started: Instant,
    update_pending: bool,
    enter_retries: u32,
    command_resends: u32,
    prompt_responses: u32,
    cursor_reports: u32,
}

impl<'a> Attempt<'a> {
    fn new(script: &'a ProbeScript, timings: &'a DriveTimings, timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            script,
            timings,
            started,
            deadline: started + timeout,
            buffer: CapturedBuffer::new(),
            responder: CursorQueryResponder::new(),
            state: DriveState::Booting,
            trace: vec![DriveState::Booting],
            last_enter: started,
            settle_started: started,
            update_pending: false,
            enter_retries: 0,
            command_resends: 0,
            prompt_responses: 0,
            cursor_reports: 0,
        }
    }

    fn transition(&mut self, next: DriveState) {
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        self.trace.push(next);
    }

    fn drive<T: Terminal>(&mut self, terminal: &mut T) -> DriveOutcome {
        loop {
            let closed = self.pump(terminal);
            let now = Instant::now();
            let text = self.buffer.detection_text();
            let matched = self.script.markers.matched(&text);

            if matched.contains(&MarkerKind::SignInRequired) {
                return DriveOutcome::Failed(ProbeError::AuthRequired);
            }

            if matched.contains(&MarkerKind::UpdateAvailable) {
                self.update_pending = true;
            }

            let data_ready = self.script.required.iter().all(|k| matched.contains(k));

            if self.state != DriveState::Settling {
                if let Some((kind, keys)) = self.pending_dialog(&matched) {
                    if self.answer(terminal, kind, keys).is_err() {
                        return self.exited(data_ready);
                    }
                    continue;
                }
            }

            let step = match self.state {
                DriveState::Booting => {
                    if matched.contains(&MarkerKind::BootComplete)
                        || now.duration_since(self.started) >= self.timings.boot_grace
                    {
                        self.transition(DriveState::AwaitingTargetCommand);
                    }
                    Ok(())
                }
                DriveState::AwaitingTargetCommand => {
                    let sent = self.send_command(terminal);
                    self.transition(DriveState::AwaitingData);
                    sent
                }
                DriveState::AwaitingData => {
                    if data_ready {
                        self.settle_started = now;
                        self.transition(DriveState::Settling);
                        Ok(())
                    } else {
                        self.nudge(terminal, now)
                    }
                }
                DriveState::Settling => {
                    if now.duration_since(self.settle_started) >= self.timings.settle_window {
                        self.transition(DriveState::Done);
                        return DriveOutcome::Completed;
                    }
                    Ok(())
                }
                DriveState::Done => return DriveOutcome::Completed,
            };

            if closed || step.is_err() {
                return self.exited(data_ready);
            }

            if now >= self.deadline {
                return self.classify_deadline();
            }

            thread::sleep(self.timings.poll_interval);
        }
    }

    /// Reads until idle, answering every cursor position query. Returns true once closed.
    fn pump<T: Terminal>(&mut self, terminal: &mut T) -> bool {
        for _ in 0..MAX_READS_PER_POLL {
            match terminal.read_available(&mut self.buffer) {
                Ok(ReadStatus::Data(n)) => {
                    let start = self.buffer.len().saturating_sub(n);
                    let queries = self.responder.scan(&self.buffer.as_bytes()[start..]);
                    for _ in 0..queries {
                        if let Err(e) = terminal.write_str(CURSOR_POSITION_REPORT) {
                            debug!(error = %e, "Cursor position report not delivered");
                        }
                        self.cursor_reports += 1;
                    }
                }
                Ok(ReadStatus::Idle) => return false,
                Ok(ReadStatus::Closed) => return true,
                Err(e) => {
                    warn!(error = %e, "Terminal read failed");
                    return true;
                }
            }
        }
        false
    }

    fn pending_dialog(&self, matched: &[MarkerKind]) -> Option<(MarkerKind, &'a str)> {
        if self.prompt_responses >= self.timings.max_prompt_responses {
            return None;
        }
        let script = self.script;
        matched
            .iter()
            .filter(|k| k.is_dialog() || **k == MarkerKind::UpdateAvailable)
            .find_map(|k| script.response_for(*k).map(|keys| (*k, keys)))
    }

    fn answer<T: Terminal>(
        &mut self,
        terminal: &mut T,
        kind: MarkerKind,
        keys: &str,
    ) -> Result<(), PtyError> {
        debug!(marker = %kind, keys = ?keys, "Answering dialog");
        terminal.write_str(keys)?;
        self.prompt_responses += 1;
        if kind == MarkerKind::UpdateAvailable {
            self.update_pending = false;
        }
        thread::sleep(self.timings.prompt_settle);
        // The answered dialog must not match again.
        self.buffer.mark_consumed();
        Ok(())
    }

    fn send_command<T: Terminal>(&mut self, terminal: &mut T) -> Result<(), PtyError> {
        debug!(command = %self.script.command, "Sending command");
        terminal.write_str(&format!("{}\r", self.script.command))?;
        self.last_enter = Instant::now();
        Ok(())
    }

    /// Re-sends Enter, then the whole command, when the data does not show up.
    fn nudge<T: Terminal>(
        &mut self,
        terminal: &mut T,
        now: Instant,
    ) -> Result<(), PtyError> {
        let since_enter = now.duration_since(self.last_enter);

        if self.enter_retries < self.timings.max_enter_retries {
            if since_enter >= self.timings.enter_retry_interval {
                self.enter_retries += 1;
                trace!(attempt = self.enter_retries, "Re-sending Enter");
                terminal.write_str("\r")?;
                self.last_enter = now;
            }
        } else if self.command_resends < self.timings.max_resends
            && since_enter >= self.timings.resend_interval
        {
            self.command_resends += 1;
            debug!(attempt = self.command_resends, "Re-sending command");
            self.send_command(terminal)?;
        }
        Ok(())
    }

    fn exited(&mut self, data_ready: bool) -> DriveOutcome {
        if self.state == DriveState::Settling || data_ready {
            if self.state != DriveState::Settling {
                self.transition(DriveState::Settling);
            }
            self.transition(DriveState::Done);
            DriveOutcome::Completed
        } else {
            debug!(state = %self.state, "Child exited before data appeared");
            DriveOutcome::ChildExited
        }
    }

    fn classify_deadline(&mut self) -> DriveOutcome {
        if self.state == DriveState::Settling {
            self.transition(DriveState::Done);
            return DriveOutcome::Completed;
        }
        if self.update_pending {
            return DriveOutcome::Failed(ProbeError::UpdateRequired(
                "the CLI is showing an update prompt".to_string(),
            ));
        }
        DriveOutcome::Failed(ProbeError::TimedOut)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::detect::Matcher;

    const SCREEN: &str = "Current session\n42% used\nCurrent week (all models)\n17% used\n";

    /// In-memory terminal that replays canned output and reacts to writes.
    #[derive(Default)]
    struct ScriptedTerminal {
        pending: VecDeque<Vec<u8>>,
        /// (exact write, output, writes to ignore first)
        reactions: Vec<(String, String, usize)>,
        writes: Vec<String>,
        close_when_drained: bool,
        shutdowns: Vec<Option<String>>,
    }

    impl ScriptedTerminal {
        fn printing(chunks: &[&str]) -> Self {
            Self {
                pending: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                ..Default::default()
            }
        }

        fn on_write(mut self, input: &str, output: &str, ignore_first: usize) -> Self {
            self.reactions
                .push((input.to_string(), output.to_string(), ignore_first));
            self
        }

        fn count_writes(&self, text: &str) -> usize {
            self.writes.iter().filter(|w| *w == text).count()
        }
    }

    impl Terminal for ScriptedTerminal {
        fn read_available(&mut self, buffer: &mut CapturedBuffer) -> Result<ReadStatus, PtyError> {
            match self.pending.pop_front() {
                Some(chunk) => {
                    buffer.extend(&chunk);
                    Ok(ReadStatus::Data(chunk.len()))
                }
                None if self.close_when_drained => Ok(ReadStatus::Closed),
                None => Ok(ReadStatus::Idle),
            }
        }

        fn write_str(&mut self, text: &str) -> Result<(), PtyError> {
            self.writes.push(text.to_string());
            for (input, output, ignore) in &mut self.reactions {
                if input == text {
                    if *ignore > 0 {
                        *ignore -= 1;
                    } else {
                        self.pending.push_back(output.as_bytes().to_vec());
                    }
                }
            }
            Ok(())
        }

        fn is_alive(&mut self) -> bool {
            self.shutdowns.is_empty()
        }

        fn shutdown(&mut self, exit_command: Option<&str>) {
            self.shutdowns.push(exit_command.map(str::to_string));
        }
    }

    fn markers() -> MarkerSet {
        MarkerSet::new()
            .with(MarkerKind::SignInRequired, Matcher::substring("please run /login"))
            .with(MarkerKind::UpdateAvailable, Matcher::substring("update available"))
            .with(MarkerKind::TrustDialog, Matcher::substring("do you trust the files"))
            .with(MarkerKind::SessionData, Matcher::substring("current session"))
            .with(MarkerKind::WeeklyData, Matcher::substring("current week (all models)"))
            .with(MarkerKind::BootComplete, Matcher::substring("? for shortcuts"))
    }

    fn script() -> ProbeScript {
        ProbeScript::new("/usage", markers())
            .exit_with("/exit")
            .respond(MarkerKind::TrustDialog, "\r")
            .require(MarkerKind::SessionData)
            .require(MarkerKind::WeeklyData)
    }

    fn fast_timings() -> DriveTimings {
        DriveTimings {
            poll_interval: Duration::from_millis(5),
            boot_grace: Duration::from_millis(50),
            prompt_settle: Duration::from_millis(5),
            enter_retry_interval: Duration::from_millis(20),
            max_enter_retries: 10,
            resend_interval: Duration::from_millis(40),
            max_resends: 3,
            settle_window: Duration::from_millis(30),
            max_prompt_responses: 6,
        }
    }

    fn run(terminal: &mut ScriptedTerminal, timings: &DriveTimings, timeout: Duration) -> DriveReport {
        let script = script();
        DriveLoop::new(&script, timings).run(terminal, timeout)
    }

    #[test]
    fn test_happy_path_visits_every_state_without_retries() {
        let mut terminal =
            ScriptedTerminal::printing(&["Welcome\n? for shortcuts\n"]).on_write("/usage\r", SCREEN, 0);

        let report = run(&mut terminal, &fast_timings(), Duration::from_secs(5));

        assert_eq!(report.outcome, DriveOutcome::Completed);
        assert_eq!(
            report.trace,
            vec![
                DriveState::Booting,
                DriveState::AwaitingTargetCommand,
                DriveState::AwaitingData,
                DriveState::Settling,
                DriveState::Done
            ]
        );
        assert_eq!(report.enter_retries, 0);
        assert_eq!(report.command_resends, 0);
        assert!(report.text.contains("42% used"));
        assert_eq!(terminal.shutdowns, vec![Some("/exit".to_string())]);
    }

    #[test]
    fn test_dropped_enter_is_resent() {
        let mut terminal = ScriptedTerminal::printing(&["? for shortcuts"]).on_write("\r", SCREEN, 2);

        let report = run(&mut terminal, &fast_timings(), Duration::from_secs(5));

        assert_eq!(report.outcome, DriveOutcome::Completed);
        assert_eq!(report.enter_retries, 3);
        assert_eq!(report.command_resends, 0);
    }

    #[test]
    fn test_whole_command_resent_after_enter_budget() {
        let timings = DriveTimings {
            max_enter_retries: 2,
            ..fast_timings()
        };
        let mut terminal =
            ScriptedTerminal::printing(&["? for shortcuts"]).on_write("/usage\r", SCREEN, 1);

        let report = run(&mut terminal, &timings, Duration::from_secs(5));

        assert_eq!(report.outcome, DriveOutcome::Completed);
        assert_eq!(report.enter_retries, 2);
        assert_eq!(report.command_resends, 1);
        assert_eq!(terminal.count_writes("/usage\r"), 2);
    }

    #[test]
    fn test_sign_in_fails_fast() {
        let mut terminal = ScriptedTerminal::printing(&["Please run /login to continue"]);

        let report = run(&mut terminal, &fast_timings(), Duration::from_secs(30));

        assert_eq!(report.outcome, DriveOutcome::Failed(ProbeError::AuthRequired));
        assert!(report.elapsed < Duration::from_secs(2));
        assert_eq!(terminal.shutdowns.len(), 1);
    }

    #[test]
    fn test_update_prompt_at_deadline() {
        let mut terminal = ScriptedTerminal::printing(&["Update available! Run: npm i -g"]);

        let report = run(&mut terminal, &fast_timings(), Duration::from_millis(300));

        assert!(matches!(
            report.outcome,
            DriveOutcome::Failed(ProbeError::UpdateRequired(_))
        ));
    }

    #[test]
    fn test_silence_times_out() {
        let mut terminal = ScriptedTerminal::default();

        let report = run(&mut terminal, &fast_timings(), Duration::from_millis(600));

        assert_eq!(report.outcome, DriveOutcome::Failed(ProbeError::TimedOut));
        assert_eq!(report.enter_retries, 10);
        assert!(report.command_resends >= 1);
    }

    #[test]
    fn test_trust_dialog_answered_once() {
        let mut terminal = ScriptedTerminal::printing(&["Do you trust the files in this folder?"])
            .on_write("/usage\r", SCREEN, 0);
        // The answer to the dialog doubles as an Enter; only react to the first one.
        terminal = terminal.on_write("\r", "? for shortcuts", 0);

        let report = run(&mut terminal, &fast_timings(), Duration::from_secs(5));

        assert_eq!(report.outcome, DriveOutcome::Completed);
        assert_eq!(report.prompt_responses, 1);
        assert_eq!(terminal.writes[0], "\r");
    }

    #[test]
    fn test_cursor_queries_answered_once_each() {
        let mut terminal = ScriptedTerminal::printing(&["\x1b[6nboot\x1b[", "6n? for shortcuts"])
            .on_write("/usage\r", SCREEN, 0);

        let report = run(&mut terminal, &fast_timings(), Duration::from_secs(5));

        assert_eq!(report.outcome, DriveOutcome::Completed);
        assert_eq!(report.cursor_reports, 2);
        assert_eq!(terminal.count_writes(CURSOR_POSITION_REPORT), 2);
        assert_eq!(report.enter_retries, 0);
    }

    #[test]
    fn test_child_exit_hands_over_capture() {
        let mut terminal = ScriptedTerminal::printing(&["Current session\n42% used\n"]);
        terminal.close_when_drained = true;

        let report = run(&mut terminal, &fast_timings(), Duration::from_secs(5));

        assert_eq!(report.outcome, DriveOutcome::ChildExited);
        assert!(report.has_capture());
        assert!(report.text.contains("42% used"));
    }

    #[test]
    fn test_default_timings_keep_their_ordering() {
        let t = DriveTimings::default();
        assert!(t.poll_interval < t.prompt_settle);
        assert!(t.prompt_settle < t.enter_retry_interval);
        assert!(t.enter_retry_interval < t.resend_interval);
        assert!(t.settle_window < t.boot_grace);
    }
}
