//! Text output formatting with progress bars and colors.
//!
//! ```text
//! Claude (PTY)
//! Session  █████░░░░░ 58% left  resets in 4h 12m
//! Weekly   ████████░░ 83% left  resets Mon Jan 5 at 9:00 AM
//! Account  dev@example.com · Acme · Claude Max
//! ```

use chrono::{DateTime, Duration, Local, Utc};
use cliprobe_core::{ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot};
use cliprobe_fetch::ProbeError;

use super::ProviderReport;
use crate::commands::providers::ProviderInfoOutput;

const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// ANSI styles.
#[derive(Debug, Clone, Copy)]
enum Style {
    Bold,
    Dim,
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Self::Bold => "\x1b[1m",
            Self::Dim => "\x1b[2m",
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Blue => "\x1b[34m",
            Self::Cyan => "\x1b[36m",
        }
    }

    /// Red below 20% remaining, yellow below 50%, green otherwise.
    fn for_remaining(percent: f64) -> Self {
        if percent < 20.0 {
            Self::Red
        } else if percent < 50.0 {
            Self::Yellow
        } else {
            Self::Green
        }
    }
}

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats one provider's result.
    pub fn format_report(&self, report: &ProviderReport) -> String {
        match &report.run.result {
            Ok(snapshot) => self.format_usage(report.provider, snapshot),
            Err(e) => self.format_error(report.provider.display_name(), e),
        }
    }

    /// Formats usage for a provider.
    pub fn format_usage(&self, provider: ProviderKind, snapshot: &UsageSnapshot) -> String {
        let header = format!(
            "{} ({})",
            self.paint(Style::Bold, provider.display_name()),
            snapshot.fetch_source.label()
        );
        let mut lines = vec![header];

        let windows = [
            ("Session", &snapshot.primary),
            ("Weekly", &snapshot.secondary),
            ("Opus", &snapshot.tertiary),
        ];
        for (label, window) in windows {
            if let Some(window) = window {
                lines.push(self.format_window(label, window));
            }
        }

        if let Some(credits) = &snapshot.credits {
            let amount = compact_number(credits.remaining);
            lines.push(format!("{:<8} {}", "Credits", self.paint(Style::Green, &amount)));
        }

        if let Some(account) = snapshot.identity.as_ref().and_then(|i| self.format_account(i)) {
            lines.push(format!("{:<8} {account}", "Account"));
        }

        lines.join("\n")
    }

    fn format_window(&self, label: &str, window: &RateWindow) -> String {
        let remaining = window.remaining_percent();
        let percent = self.paint(
            Style::for_remaining(remaining),
            &format!("{remaining:.0}% left"),
        );
        let mut line = format!("{label:<8} {} {percent}", self.progress_bar(remaining));

        let reset = match (window.resets_at, &window.reset_description) {
            (Some(at), _) => Some(describe_reset(at, Utc::now())),
            (None, Some(text)) => Some(text.clone()),
            (None, None) => None,
        };
        if let Some(reset) = reset {
            line.push_str("  ");
            line.push_str(&self.paint(Style::Dim, &format!("resets {reset}")));
        }
        line
    }

    fn format_account(&self, identity: &ProviderIdentity) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(email) = &identity.account_email {
            parts.push(self.paint(Style::Cyan, email));
        }
        if let Some(org) = &identity.account_organization {
            parts.push(org.clone());
        }
        if let Some(plan) = &identity.plan_name {
            parts.push(self.paint(Style::Blue, plan));
        }
        (!parts.is_empty()).then(|| parts.join(" · "))
    }

    /// Formats a progress bar of the remaining share.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let fraction = (percent_remaining / 100.0).clamp(0.0, 1.0);
        let filled = (fraction * self.bar_width as f64).round() as usize;

        let bar: String = std::iter::repeat_n(BAR_FULL, filled)
            .chain(std::iter::repeat_n(BAR_EMPTY, self.bar_width.saturating_sub(filled)))
            .collect();
        self.paint(Style::for_remaining(percent_remaining), &bar)
    }

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<15} {:<9} {:<8} {:<10} {}",
            self.paint(Style::Bold, "Provider"),
            self.paint(Style::Bold, "Enabled"),
            self.paint(Style::Bold, "Command"),
            self.paint(Style::Bold, "Strategy"),
            self.paint(Style::Bold, "Binary")
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(&self, row: &ProviderInfoOutput) -> String {
        let installed = match row.resolved_path {
            Some(_) => self.paint(Style::Green, "✓"),
            None => self.paint(Style::Red, "✗"),
        };
        let enabled = if row.enabled {
            self.paint(Style::Green, "yes")
        } else {
            self.paint(Style::Dim, "no")
        };
        let binary = match &row.resolved_path {
            Some(path) => path.clone(),
            None => self.paint(Style::Dim, &format!("{} (not found)", row.binary)),
        };

        format!(
            "{:<15} {:<9} {:<8} {:<10} {}",
            format!("{} {installed}", row.display_name),
            enabled,
            row.command,
            row.strategy,
            binary
        )
    }

    /// Formats a probe failure with its hint.
    pub fn format_error(&self, provider: &str, error: &ProbeError) -> String {
        format!(
            "{}: {} - {error}\n  {}",
            self.paint(Style::Bold, provider),
            self.paint(Style::Red, "Error"),
            self.paint(Style::Dim, error.hint())
        )
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.use_colors {
            format!("{}{text}\x1b[0m", style.code())
        } else {
            text.to_string()
        }
    }
}

/// Countdown within a day, local wall-clock time beyond.
fn describe_reset(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let left = resets_at - now;
    if left <= Duration::zero() {
        return "now".to_string();
    }

    if left < Duration::hours(1) {
        let mins = left.num_minutes().max(1);
        return format!("in {mins} min");
    }
    if left < Duration::hours(24) {
        let (hours, mins) = (left.num_hours(), left.num_minutes() % 60);
        return if mins == 0 {
            format!("in {hours}h")
        } else {
            format!("in {hours}h {mins}m")
        };
    }

    let local = resets_at.with_timezone(&Local);
    let time = local.format("%l:%M %p").to_string();
    format!("{} at {}", local.format("%a %b %-d"), time.trim())
}

fn compact_number(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else if n.fract().abs() < f64::EPSILON {
        format!("{n:.0}")
    } else {
        format!("{n:.2}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_describe_reset() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap();
        assert_eq!(describe_reset(now, now), "now");
        assert_eq!(describe_reset(now + Duration::seconds(20), now), "in 1 min");
        assert_eq!(describe_reset(now + Duration::minutes(45), now), "in 45 min");
        assert_eq!(describe_reset(now + Duration::hours(5), now), "in 5h");
        assert_eq!(
            describe_reset(now + Duration::minutes(4 * 60 + 12), now),
            "in 4h 12m"
        );
        assert!(describe_reset(now + Duration::days(2), now).contains(" at "));
    }

    #[test]
    fn test_compact_number() {
        assert_eq!(compact_number(12.0), "12");
        assert_eq!(compact_number(12.5), "12.50");
        assert_eq!(compact_number(1112.45), "1.1K");
        assert_eq!(compact_number(2_500_000.0), "2.5M");
    }
}
