//! End-to-end drive loop tests against fake CLI binaries on a real PTY.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use cliprobe_fetch::{
    DriveOutcome, DriveState, DriveTimings, MarkerKind, MarkerSet, Matcher, ProbeError,
    ProbeRunner, ProbeScript, PtyOptions, PtyProbeRunner,
};
use tempfile::TempDir;

const USAGE_SCREEN: &str = r"printf 'Current session\r\n42%% used\r\nCurrent week (all models)\r\n17%% used\r\n'";

fn fake_cli(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-cli");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn script() -> ProbeScript {
    let markers = MarkerSet::new()
        .with(MarkerKind::SignInRequired, Matcher::substring("please run /login"))
        .with(MarkerKind::SessionData, Matcher::substring("current session"))
        .with(MarkerKind::WeeklyData, Matcher::substring("current week (all models)"))
        .with(MarkerKind::BootComplete, Matcher::substring("? for shortcuts"));
    ProbeScript::new("/usage", markers)
        .exit_with("/exit")
        .require(MarkerKind::SessionData)
        .require(MarkerKind::WeeklyData)
}

fn runner() -> PtyProbeRunner {
    PtyProbeRunner::with_timings(DriveTimings {
        poll_interval: Duration::from_millis(20),
        boot_grace: Duration::from_millis(500),
        prompt_settle: Duration::from_millis(50),
        enter_retry_interval: Duration::from_millis(300),
        max_enter_retries: 10,
        resend_interval: Duration::from_millis(600),
        max_resends: 3,
        settle_window: Duration::from_millis(200),
        max_prompt_responses: 6,
    })
}

#[test]
fn test_immediate_screen_completes_without_retries() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "printf 'Welcome to Fake CLI\\r\\n? for shortcuts\\r\\n'\n{USAGE_SCREEN}\nexec sleep 30"
    );
    let binary = fake_cli(&dir, &body);
    let options = PtyOptions::with_timeout(Duration::from_secs(10));

    let capture = runner()
        .run(binary.to_str().unwrap(), &script(), &options)
        .unwrap();
    let report = capture.report;

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
    assert!(report.elapsed < Duration::from_secs(10));
    assert!(report.text.contains("42% used"));
}

#[test]
fn test_screen_printed_after_command_is_typed() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "printf '? for shortcuts\\r\\n'\nread cmd\nif [ \"$cmd\" = \"/usage\" ]; then\n{USAGE_SCREEN}\nfi\nexec sleep 30"
    );
    let binary = fake_cli(&dir, &body);
    let options = PtyOptions::with_timeout(Duration::from_secs(10));

    let report = runner()
        .run(binary.to_str().unwrap(), &script(), &options)
        .unwrap()
        .report;

    assert_eq!(report.outcome, DriveOutcome::Completed);
    assert!(report.text.contains("17% used"));
}

#[test]
fn test_cursor_position_query_unblocks_boot() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "stty -icanon -echo min 6 time 50\nprintf '\\033[6n'\nresp=$(dd bs=6 count=1 2>/dev/null)\ncase \"$resp\" in\n  *'[1;1R'*) printf '? for shortcuts\\r\\n'; {USAGE_SCREEN} ;;\nesac\nexec sleep 30"
    );
    let binary = fake_cli(&dir, &body);
    let options = PtyOptions::with_timeout(Duration::from_secs(10));

    let report = runner()
        .run(binary.to_str().unwrap(), &script(), &options)
        .unwrap()
        .report;

    assert_eq!(report.outcome, DriveOutcome::Completed);
    assert_eq!(report.cursor_reports, 1);
}

#[test]
fn test_login_wall_fails_fast() {
    let dir = TempDir::new().unwrap();
    let binary = fake_cli(
        &dir,
        "printf 'Invalid session. Please run /login\\r\\n'\nexec sleep 30",
    );
    let options = PtyOptions::with_timeout(Duration::from_secs(20));

    let report = runner()
        .run(binary.to_str().unwrap(), &script(), &options)
        .unwrap()
        .report;

    assert_eq!(report.outcome, DriveOutcome::Failed(ProbeError::AuthRequired));
    assert!(report.elapsed < Duration::from_secs(5));
}

#[test]
fn test_early_exit_keeps_capture() {
    let dir = TempDir::new().unwrap();
    let binary = fake_cli(&dir, "printf 'Current session\\r\\n5%% used\\r\\n'");
    let options = PtyOptions::with_timeout(Duration::from_secs(10));

    let report = runner()
        .run(binary.to_str().unwrap(), &script(), &options)
        .unwrap()
        .report;

    assert_eq!(report.outcome, DriveOutcome::ChildExited);
    assert!(report.text.contains("5% used"));
}
