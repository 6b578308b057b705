//! Parser for the Codex `/status` panel.
//!
//! ```text
//! │  Account:       dev@example.com (Plus)                              │
//! │  5h limit:      [██████░░░░░░░░░░░░░░] 28% used (resets 14:30)      │
//! │  Weekly limit:  [██░░░░░░░░░░░░░░░░░░] 9% used (resets 09:00 on 5 Jan) │
//! │  Credits:       112.45 credits                                      │
//! ```
//!
//! Older builds print `72% left` instead of `28% used`; both are accepted.
//! The last occurrence of each line wins.

use std::sync::LazyLock;

use cliprobe_core::{Credits, LoginMethod, ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot};
use cliprobe_fetch::text::parse_percent;
use cliprobe_fetch::{ParseClock, ProbeError, excerpt, parse_reset_time};
use regex::Regex;
use tracing::{debug, instrument};

/// Primary window length in minutes.
pub const FIVE_HOUR_WINDOW_MINUTES: u32 = 300;

/// Secondary window length in minutes.
pub const WEEKLY_WINDOW_MINUTES: u32 = 10_080;

// ============================================================================
// Regex Patterns
// ============================================================================

/// "5h limit: [███░░] 28% used (resets 14:30)"
static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(5h|weekly)\s+limit\s*:[^\n%]*?(\d{1,3}(?:\.\d+)?)\s*%\s*(used|left)([^\n]*)")
        .expect("Invalid regex")
});

/// "(resets 09:00 on 5 Jan)"
static RESET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bresets?\s+(?:at\s+)?([^)\n│]+)").expect("Invalid regex")
});

/// "Credits: 112.45 credits", "Credits: $1,024"
static CREDITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcredits\s*:\s*\$?(\d[\d,]*(?:\.\d+)?)").expect("Invalid regex")
});

/// "Account: dev@example.com (Plus)"
static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\baccount\s*:\s*([^\s@│()]+@[^\s│()]+)(?:\s*\(([^)\n]+)\))?")
        .expect("Invalid regex")
});

// ============================================================================
// Field Extraction
// ============================================================================

fn parse_limit(caps: &regex::Captures<'_>, clock: &ParseClock) -> Option<RateWindow> {
    let value = parse_percent(&caps[2])?;
    let window = if caps[3].eq_ignore_ascii_case("used") {
        RateWindow::new(value)
    } else {
        RateWindow::from_remaining(value)
    };

    let reset = caps
        .get(4)
        .and_then(|tail| RESET_RE.captures(tail.as_str()))
        .map(|r| r[1].trim().to_string())
        .filter(|r| !r.is_empty());
    let resets_at = reset.as_deref().and_then(|r| parse_reset_time(r, clock));
    Some(window.with_reset(resets_at, reset))
}

fn parse_credits(text: &str) -> Option<Credits> {
    let caps = CREDITS_RE.captures_iter(text).last()?;
    let remaining: f64 = caps[1].replace(',', "").parse().ok()?;
    remaining.is_finite().then(|| Credits::new(remaining))
}

fn parse_identity(text: &str) -> Option<ProviderIdentity> {
    let caps = ACCOUNT_RE.captures_iter(text).last()?;
    let mut identity = ProviderIdentity::new(ProviderKind::Codex);
    identity.account_email = Some(caps[1].to_string());
    if let Some(plan) = caps.get(2).map(|m| m.as_str().trim()).filter(|p| !p.is_empty()) {
        identity.login_method = LoginMethod::from_label(plan);
        identity.plan_name = Some(plan.to_string());
    }
    Some(identity)
}

// ============================================================================
// Entry Point
// ============================================================================

/// Parses a cleaned `/status` capture.
///
/// `5h limit` becomes the primary window and `Weekly limit` the secondary
/// one; credits and the account line are optional.
///
/// # Errors
///
/// Returns [`ProbeError::ParseFailed`] with an excerpt of the capture when
/// neither limit line is present, which includes the panel shown before
/// the first request of a session ("data not available yet").
#[instrument(skip_all, fields(len = text.len()))]
pub fn parse_status(text: &str, clock: &ParseClock) -> Result<UsageSnapshot, ProbeError> {
    let mut snapshot = UsageSnapshot::at(clock.now_utc());

    for caps in LIMIT_RE.captures_iter(text) {
        let Some(window) = parse_limit(&caps, clock) else {
            continue;
        };
        if caps[1].eq_ignore_ascii_case("5h") {
            snapshot.primary = Some(window.with_window_minutes(FIVE_HOUR_WINDOW_MINUTES));
        } else {
            snapshot.secondary = Some(window.with_window_minutes(WEEKLY_WINDOW_MINUTES));
        }
    }

    if snapshot.primary.is_none() && snapshot.secondary.is_none() {
        debug!("No limit lines in capture");
        return Err(ProbeError::ParseFailed(excerpt(text)));
    }

    snapshot.credits = parse_credits(text);
    snapshot.identity = parse_identity(text);
    snapshot.raw_text = Some(text.to_string());
    Ok(snapshot)
}

// ============================================================================
// Tests
// ============================================================================
