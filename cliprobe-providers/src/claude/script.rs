//! What to type into `claude` and what to look for.

use std::time::Duration;

use cliprobe_fetch::{EscalationPolicy, MarkerKind, MarkerSet, Matcher, ProbeScript, ProbeTier};

/// Slash command that opens the usage view.
pub const USAGE_COMMAND: &str = "/usage";

/// Slash command that quits the CLI.
pub const EXIT_COMMAND: &str = "/exit";

/// First tier: the usual screen, a 20 s deadline.
pub const FIRST_TIER: ProbeTier = ProbeTier::new(50, 160, Duration::from_secs(20));

/// Second tier: a larger screen so long usage views are not truncated.
pub const SECOND_TIER: ProbeTier = ProbeTier::new(70, 220, Duration::from_secs(35));

/// Marker table for the Claude CLI.
pub fn claude_markers() -> MarkerSet {
    MarkerSet::new()
        .with(
            MarkerKind::SignInRequired,
            Matcher::any_of(&[
                "please run /login",
                "invalid api key",
                "select login method",
                "oauth token has expired",
            ]),
        )
        .with(
            MarkerKind::UpdateAvailable,
            Matcher::any_of(&["update available", "please update claude"]),
        )
        .with(
            MarkerKind::TrustDialog,
            Matcher::any_of(&["do you trust the files", "trust this folder"]),
        )
        .with(
            MarkerKind::WorkspaceSelection,
            Matcher::any_of(&["select a workspace", "choose a project"]),
        )
        .with(
            MarkerKind::TelemetryConsent,
            Matcher::any_of(&["help improve claude", "share usage data"]),
        )
        .with(MarkerKind::SessionData, Matcher::substring("current session"))
        .with(
            MarkerKind::WeeklyData,
            Matcher::substring("current week (all models)"),
        )
        .with(
            MarkerKind::OpusData,
            Matcher::any_of(&["current week (opus", "current week (sonnet"]),
        )
        .with(
            MarkerKind::BootComplete,
            Matcher::any_of(&["? for shortcuts", "/help for help", "welcome to claude"]),
        )
}

/// The `/usage` interaction.
///
/// Trust and workspace dialogs are accepted with Enter, the telemetry
/// prompt is dismissed with Escape.
pub fn usage_script() -> ProbeScript {
    ProbeScript::new(USAGE_COMMAND, claude_markers())
        .exit_with(EXIT_COMMAND)
        .respond(MarkerKind::TrustDialog, "\r")
        .respond(MarkerKind::WorkspaceSelection, "\r")
        .respond(MarkerKind::TelemetryConsent, "\x1b")
        .require(MarkerKind::SessionData)
        .require(MarkerKind::WeeklyData)
}

/// The escalation ladder for `claude`.
pub fn claude_escalation() -> EscalationPolicy {
    EscalationPolicy::two_tier(FIRST_TIER, SECOND_TIER)
}
