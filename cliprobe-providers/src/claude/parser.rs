//! Parser for the Claude `/usage` view.
//!
//! The view looks like this once ANSI codes are stripped:
//!
//! ```text
//! Current session
//! █████████▌                    42% used
//! Resets 3pm (Europe/Berlin)
//!
//! Current week (all models)
//! ███▌                          17% used
//! Resets Jan 5 at 9am (Europe/Berlin)
//!
//! Current week (Opus)
//!                               0% used
//! ```
//!
//! A capture usually holds several redraws of this screen. Sections are
//! located by their headers and the last section of each kind that carries
//! a percentage wins.

use std::sync::LazyLock;

use cliprobe_core::{LoginMethod, ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot};
use cliprobe_fetch::text::parse_percent;
use cliprobe_fetch::{ParseClock, ProbeError, excerpt, parse_reset_time};
use regex::Regex;
use tracing::{debug, instrument};

/// Session window length in minutes.
pub const SESSION_WINDOW_MINUTES: u32 = 300;

/// Weekly window length in minutes.
pub const WEEKLY_WINDOW_MINUTES: u32 = 10_080;

// ============================================================================
// Regex Patterns
// ============================================================================

/// "Current session", "Current week (all models)", "Current week (Opus)"
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)current\s+(?:(session)|week\s*\(([^)\n]*)\))").expect("Invalid regex")
});

/// "42% used", "58% left", "58 % remaining"
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:\.\d+)?)\s*%\s*(used|left|remaining)").expect("Invalid regex")
});

/// "Resets 3pm (Europe/Berlin)"
static RESET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bresets?\s*:?\s+([^\n]+)").expect("Invalid regex"));

/// "Email: user@example.com" or "Account: user@example.com"
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s│]*(?:email|account)\s*:\s*(\S+@[^\s│]+)").expect("Invalid regex")
});

/// "Organization: Acme"
static ORG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s│]*org(?:anization)?\s*:\s*([^\n│]+)").expect("Invalid regex")
});

/// "Login method: Claude Max Account"
static LOGIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s│]*login\s+method\s*:\s*([^\n│]+)").expect("Invalid regex")
});

// ============================================================================
// Sections
// ============================================================================

/// Which usage block a header opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Session,
    Weekly,
    Premium,
}

/// A header and the text up to the next header.
struct SectionSpan<'a> {
    section: Section,
    body: &'a str,
}

fn split_sections(text: &str) -> Vec<SectionSpan<'_>> {
    let headers: Vec<(Section, usize, usize)> = HEADER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let section = if caps.get(1).is_some() {
                Section::Session
            } else {
                let label = caps.get(2)?.as_str().to_lowercase();
                if label.contains("all models") {
                    Section::Weekly
                } else {
                    Section::Premium
                }
            };
            Some((section, whole.start(), whole.end()))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(i, &(section, _, end))| {
            let next = headers.get(i + 1).map_or(text.len(), |&(_, start, _)| start);
            SectionSpan {
                section,
                body: &text[end..next],
            }
        })
        .collect()
}

/// Reads the percentage and reset line of one section body.
fn parse_window(body: &str, clock: &ParseClock) -> Option<RateWindow> {
    let caps = PERCENT_RE.captures(body)?;
    let value = parse_percent(&caps[1])?;
    let window = if caps[2].eq_ignore_ascii_case("used") {
        RateWindow::new(value)
    } else {
        RateWindow::from_remaining(value)
    };

    let reset = RESET_RE
        .captures(body)
        .and_then(|caps| clean_reset(&caps[1]));
    let resets_at = reset.as_deref().and_then(|r| parse_reset_time(r, clock));
    Some(window.with_reset(resets_at, reset))
}

/// Trims box-drawing and punctuation left around a reset description.
fn clean_reset(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric() && c != ')')
        .trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn last_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_identity(text: &str) -> Option<ProviderIdentity> {
    let mut identity = ProviderIdentity::new(ProviderKind::Claude);
    identity.account_email = last_capture(&EMAIL_RE, text);
    identity.account_organization = last_capture(&ORG_RE, text);
    if let Some(label) = last_capture(&LOGIN_RE, text) {
        identity.login_method = LoginMethod::from_label(&label);
        identity.plan_name = Some(label);
    }
    (!identity.is_empty()).then_some(identity)
}

// ============================================================================
// Entry Point
// ============================================================================

/// Parses a cleaned `/usage` capture.
///
/// The session block becomes the primary window, the all-models weekly
/// block the secondary one and a premium-model weekly block (Opus, Sonnet)
/// the optional tertiary one. Reset times that cannot be read are kept as
/// text with `resets_at` left empty.
///
/// # Errors
///
/// Returns [`ProbeError::ParseFailed`] with an excerpt of the capture when
/// neither the session nor the weekly block is present.
#[instrument(skip_all, fields(len = text.len()))]
pub fn parse_usage(text: &str, clock: &ParseClock) -> Result<UsageSnapshot, ProbeError> {
    let mut snapshot = UsageSnapshot::at(clock.now_utc());

    for span in split_sections(text) {
        let Some(window) = parse_window(span.body, clock) else {
            continue;
        };
        match span.section {
            Section::Session => {
                snapshot.primary = Some(window.with_window_minutes(SESSION_WINDOW_MINUTES));
            }
            Section::Weekly => {
                snapshot.secondary = Some(window.with_window_minutes(WEEKLY_WINDOW_MINUTES));
            }
            Section::Premium => {
                snapshot.tertiary = Some(window.with_window_minutes(WEEKLY_WINDOW_MINUTES));
            }
        }
    }

    if snapshot.primary.is_none() && snapshot.secondary.is_none() {
        debug!("No usage sections in capture");
        return Err(ProbeError::ParseFailed(excerpt(text)));
    }

    snapshot.identity = parse_identity(text);
    snapshot.raw_text = Some(text.to_string());
    Ok(snapshot)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    const USAGE_VIEW: &str = "\
Current session
█████████████████████                              42% used
Resets 3pm (UTC)

Current week (all models)
████████                                           17% used
Resets Jan 5 at 9am (UTC)

Current week (Opus)
                                                   0% used
";

    fn clock() -> ParseClock {
        ParseClock::utc(Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_parse_usage_view() {
        let snapshot = parse_usage(USAGE_VIEW, &clock()).unwrap();

        let primary = snapshot.primary.unwrap();
        assert!((primary.used_percent - 42.0).abs() < 0.01);
        assert_eq!(primary.window_minutes, Some(300));
        assert_eq!(
            primary.resets_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 3, 15, 0, 0).unwrap())
        );
        assert_eq!(primary.reset_description.as_deref(), Some("3pm (UTC)"));

        let secondary = snapshot.secondary.unwrap();
        assert!((secondary.used_percent - 17.0).abs() < 0.01);
        assert_eq!(secondary.window_minutes, Some(10_080));
        assert_eq!(
            secondary.resets_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap())
        );

        let tertiary = snapshot.tertiary.unwrap();
        assert!(tertiary.used_percent.abs() < 0.01);
        assert!(tertiary.resets_at.is_none());

        assert_eq!(snapshot.updated_at, clock().now_utc());
    }

    #[test]
    fn test_percent_left_is_converted() {
        let text = "Current session\n72% left\nCurrent week (all models)\n45.5% left\n";
        let snapshot = parse_usage(text, &clock()).unwrap();
        assert!((snapshot.primary.unwrap().used_percent - 28.0).abs() < 0.01);
        assert!((snapshot.secondary.unwrap().used_percent - 54.5).abs() < 0.01);
        assert!(snapshot.tertiary.is_none());
    }

    #[test]
    fn test_later_redraw_wins() {
        let text = "Current session\n10% used\nCurrent week (all models)\n\
                    Current session\n11% used\nCurrent week (all models)\n5% used\n";
        let snapshot = parse_usage(text, &clock()).unwrap();
        assert!((snapshot.primary.unwrap().used_percent - 11.0).abs() < 0.01);
        assert!((snapshot.secondary.unwrap().used_percent - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_partial_redraw_keeps_earlier_values() {
        let text = "Current session\n10% used\nCurrent week (all models)\n5% used\nCurrent session\n";
        let snapshot = parse_usage(text, &clock()).unwrap();
        assert!((snapshot.primary.unwrap().used_percent - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_unreadable_reset_is_unknown_not_error() {
        let text = "Current session\n42% used\nResets whenever the moon is full\n";
        let snapshot = parse_usage(text, &clock()).unwrap();
        let primary = snapshot.primary.unwrap();
        assert!(primary.resets_at.is_none());
        assert_eq!(
            primary.reset_description.as_deref(),
            Some("whenever the moon is full")
        );
    }

    #[test]
    fn test_reset_reads_time_in_named_zone() {
        let text = "Current session\n42% used\nResets 3pm (America/Los_Angeles)\n";
        let primary = parse_usage(text, &clock()).unwrap().primary.unwrap();
        assert_eq!(
            primary.resets_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 3, 23, 0, 0).unwrap())
        );
        assert_eq!(
            primary.reset_description.as_deref(),
            Some("3pm (America/Los_Angeles)")
        );
    }

    #[test]
    fn test_identity_lines() {
        let text = "Current session\n1% used\n\
                    Login method: Claude Max Account\n\
                    Organization: Acme Corp\n\
                    Email: dev@example.com\n";
        let identity = parse_usage(text, &clock()).unwrap().identity.unwrap();
        assert_eq!(identity.account_email.as_deref(), Some("dev@example.com"));
        assert_eq!(identity.account_organization.as_deref(), Some("Acme Corp"));
        assert_eq!(identity.plan_name.as_deref(), Some("Claude Max Account"));
        assert_eq!(identity.login_method, Some(LoginMethod::Subscription));
    }

    #[test]
    fn test_no_identity_is_none() {
        let snapshot = parse_usage(USAGE_VIEW, &clock()).unwrap();
        assert!(snapshot.identity.is_none());
    }

    #[test]
    fn test_missing_sections_is_parse_failed() {
        let text = "Welcome to Claude\n? for shortcuts\n> /usage\n";
        match parse_usage(text, &clock()) {
            Err(ProbeError::ParseFailed(excerpt)) => {
                assert!(excerpt.contains("Welcome to Claude"));
            }
            other => panic!("expected ParseFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_headers_without_percentages_is_parse_failed() {
        let text = "Current session\nLoading…\nCurrent week (all models)\n";
        assert!(matches!(
            parse_usage(text, &clock()),
            Err(ProbeError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse_usage(USAGE_VIEW, &clock()).unwrap();
        let second = parse_usage(USAGE_VIEW, &clock()).unwrap();
        assert_eq!(first, second);
    }
}
