//! What to type into `codex` and what to look for.

use std::time::Duration;

use cliprobe_fetch::{EscalationPolicy, MarkerKind, MarkerSet, Matcher, ProbeScript, ProbeTier};

/// Slash command that opens the status panel.
pub const STATUS_COMMAND: &str = "/status";

/// Slash command that quits the CLI.
pub const EXIT_COMMAND: &str = "/quit";

/// Launch flags: no writes, ask before running anything.
pub const DEFAULT_ARGS: &[&str] = &["-s", "read-only", "-a", "untrusted"];

/// First tier.
pub const FIRST_TIER: ProbeTier = ProbeTier::new(60, 200, Duration::from_secs(12));

/// Second tier.
pub const SECOND_TIER: ProbeTier = ProbeTier::new(70, 220, Duration::from_secs(24));

/// Marker table for the Codex CLI.
///
/// The status panel is painted in one go, so any of its lines counts as
/// [`MarkerKind::StatusData`]; this includes the note shown before the
/// first request of a session, which the parser then reports as a parse
/// failure instead of waiting out the deadline.
pub fn codex_markers() -> MarkerSet {
    MarkerSet::new()
        .with(
            MarkerKind::SignInRequired,
            Matcher::any_of(&[
                "sign in with chatgpt",
                "please login",
                "codex login",
                "not logged in",
            ]),
        )
        .with(
            MarkerKind::UpdateAvailable,
            Matcher::any_of(&["update available", "a new version of codex"]),
        )
        .with(
            MarkerKind::TrustDialog,
            Matcher::any_of(&[
                "allow codex to work in this folder",
                "do you trust the contents of this directory",
            ]),
        )
        .with(MarkerKind::SessionData, Matcher::substring("5h limit"))
        .with(MarkerKind::WeeklyData, Matcher::substring("weekly limit"))
        .with(
            MarkerKind::StatusData,
            Matcher::any_of(&["5h limit", "weekly limit", "credits:", "not available yet"]),
        )
        .with(
            MarkerKind::BootComplete,
            Matcher::any_of(&["openai codex", "to get started"]),
        )
}

/// The `/status` interaction.
pub fn status_script() -> ProbeScript {
    ProbeScript::new(STATUS_COMMAND, codex_markers())
        .exit_with(EXIT_COMMAND)
        .respond(MarkerKind::TrustDialog, "\r")
        .require(MarkerKind::StatusData)
}

/// The escalation ladder for `codex`.
pub fn codex_escalation() -> EscalationPolicy {
    EscalationPolicy::two_tier(FIRST_TIER, SECOND_TIER)
}
