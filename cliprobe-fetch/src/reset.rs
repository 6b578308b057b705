//! Reset-time parsing.
//!
//! Both CLIs print reset times as loose human text ("3pm", "Jan 5 at 9am",
//! "14:30 on 5 Jan"), optionally followed by a parenthesised time zone.
//! [`parse_reset_time`] tries a fixed list of formats in priority order and
//! returns the first match. An unparseable value is `None`, which callers
//! treat as "unknown", never as a failure.
//!
//! Parsing never reads the system clock: "now" comes from a [`ParseClock`],
//! so the same input and clock always produce the same timestamp.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use tracing::debug;

// ============================================================================
// Parse Clock
// ============================================================================

/// The instant, and local offset, that relative reset times are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseClock {
    now: DateTime<FixedOffset>,
}

impl ParseClock {
    /// Creates a clock fixed at `now`.
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// Creates a clock from the current system time and local offset.
    pub fn system() -> Self {
        Self::new(Local::now().fixed_offset())
    }

    /// Creates a clock fixed at a UTC instant.
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now.fixed_offset())
    }

    /// The fixed instant, in UTC.
    pub fn now_utc(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc)
    }

    /// The local offset reset times are interpreted in.
    pub fn offset(&self) -> FixedOffset {
        *self.now.offset()
    }
}

// ============================================================================
// Formats
// ============================================================================

/// Trailing "(Europe/Berlin)" style zone annotation.
static ZONE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\(([^)]*)\)\s*$").expect("Invalid regex"));

/// "Jan 5 at 3pm", "January 5th at 3:45pm"
static DATED_AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{3})[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)$")
        .expect("Invalid regex")
});

/// "Jan 5, 3pm", "Jan 5 3:45pm"
static DATED_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{3})[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)$")
        .expect("Invalid regex")
});

/// "3:45pm"
static TIME_12H_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s*(am|pm)$").expect("Invalid regex"));

/// "3pm"
static HOUR_12H_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s*(am|pm)$").expect("Invalid regex"));

/// "14:30 on 5 Jan"
static TIME_ON_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})\s+on\s+(\d{1,2})\s+([a-z]{3})[a-z]*$").expect("Invalid regex")
});

/// "14:30"
static TIME_24H_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("Invalid regex"));

/// A reset value before it is anchored to a calendar date.
enum ResetValue {
    /// Time of day only; the next occurrence is meant.
    TimeOnly(NaiveTime),
    /// Month, day and time; the year is inferred.
    Dated { month: u32, day: u32, time: NaiveTime },
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses CLI reset text into an absolute instant.
///
/// `text` is what follows "Resets" (e.g. `"3pm (Europe/Berlin)"`). A zone
/// suffix is looked up in the tz database and the time is read in that
/// zone; an unknown name keeps the clock's offset. Time-only values that
/// already passed today roll over to tomorrow; dated values more than a
/// day in the past roll over to next year.
pub fn parse_reset_time(text: &str, clock: &ParseClock) -> Option<DateTime<Utc>> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let (body, zone) = match ZONE_SUFFIX_RE.captures(&normalized) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()).to_string(),
            caps.get(2).map(|m| m.as_str().trim().to_string()),
        ),
        None => (normalized.clone(), None),
    };

    let value = parse_value(&body.trim().to_lowercase())?;
    let now = clock.now_utc();

    match zone.as_deref().map(resolve_zone) {
        Some(ZoneChoice::Utc) => resolve(value, &Utc, now),
        Some(ZoneChoice::Named(tz)) => resolve(value, &tz, now),
        Some(ZoneChoice::Unknown) | None => resolve(value, &clock.offset(), now),
    }
}

/// Where a printed zone name points.
enum ZoneChoice {
    Utc,
    Named(Tz),
    Unknown,
}

fn resolve_zone(name: &str) -> ZoneChoice {
    const UTC_NAMES: [&str; 5] = ["utc", "gmt", "etc/utc", "etc/gmt", "z"];

    if UTC_NAMES.iter().any(|z| name.eq_ignore_ascii_case(z)) {
        return ZoneChoice::Utc;
    }
    match name.parse::<Tz>() {
        Ok(tz) => ZoneChoice::Named(tz),
        Err(_) => {
            debug!(zone = name, "Unknown reset time zone, using local offset");
            ZoneChoice::Unknown
        }
    }
}

/// Anchors `value` to a calendar date in `zone` relative to `now`.
fn resolve<Z: TimeZone>(value: ResetValue, zone: &Z, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let local_now = now.with_timezone(zone);

    let resolved = match value {
        ResetValue::TimeOnly(time) => {
            let today = local_now.date_naive();
            let candidate = zone.from_local_datetime(&today.and_time(time)).earliest()?;
            if candidate < now {
                let tomorrow = today.succ_opt()?;
                zone.from_local_datetime(&tomorrow.and_time(time)).earliest()?
            } else {
                candidate
            }
        }
        ResetValue::Dated { month, day, time } => {
            let year = local_now.year();
            let this_year = anchor(zone, year, month, day, time)?;
            if this_year < now - Duration::days(1) {
                anchor(zone, year + 1, month, day, time)?
            } else {
                this_year
            }
        }
    };

    Some(resolved.with_timezone(&Utc))
}

fn anchor<Z: TimeZone>(
    zone: &Z,
    year: i32,
    month: u32,
    day: u32,
    time: NaiveTime,
) -> Option<DateTime<Z>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    zone.from_local_datetime(&date.and_time(time)).earliest()
}

/// Tries each format in priority order.
fn parse_value(text: &str) -> Option<ResetValue> {
    if let Some(caps) = DATED_AT_RE
        .captures(text)
        .or_else(|| DATED_COMMA_RE.captures(text))
    {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let minute = caps.get(4).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let time = time_12h(caps[3].parse().ok()?, minute, &caps[5])?;
        return Some(ResetValue::Dated { month, day, time });
    }

    if let Some(caps) = TIME_12H_RE.captures(text) {
        let time = time_12h(caps[1].parse().ok()?, caps[2].parse().ok()?, &caps[3])?;
        return Some(ResetValue::TimeOnly(time));
    }

    if let Some(caps) = HOUR_12H_RE.captures(text) {
        let time = time_12h(caps[1].parse().ok()?, 0, &caps[2])?;
        return Some(ResetValue::TimeOnly(time));
    }

    if let Some(caps) = TIME_ON_DATE_RE.captures(text) {
        let time = NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)?;
        let day: u32 = caps[3].parse().ok()?;
        let month = month_number(&caps[4])?;
        return Some(ResetValue::Dated { month, day, time });
    }

    if let Some(caps) = TIME_24H_RE.captures(text) {
        let time = NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)?;
        return Some(ResetValue::TimeOnly(time));
    }

    None
}

fn time_12h(hour: u32, minute: u32, meridiem: &str) -> Option<NaiveTime> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (hour, meridiem) {
        (12, "am") => 0,
        (12, _) => 12,
        (h, "pm") => h + 12,
        (h, _) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn month_number(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .and_then(|i| u32::try_from(i + 1).ok())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> ParseClock {
        // Saturday 2026-01-03 10:00 UTC
        ParseClock::utc(Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap())
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_hour_only_later_today() {
        assert_eq!(parse_reset_time("3pm", &clock()), Some(at(2026, 1, 3, 15, 0)));
        assert_eq!(parse_reset_time("3:45pm", &clock()), Some(at(2026, 1, 3, 15, 45)));
    }

    #[test]
    fn test_time_already_past_rolls_to_tomorrow() {
        assert_eq!(parse_reset_time("9am", &clock()), Some(at(2026, 1, 4, 9, 0)));
        assert_eq!(parse_reset_time("12am", &clock()), Some(at(2026, 1, 4, 0, 0)));
        assert_eq!(parse_reset_time("12pm", &clock()), Some(at(2026, 1, 3, 12, 0)));
    }

    #[test]
    fn test_dated_formats() {
        let expected = Some(at(2026, 1, 5, 9, 0));
        assert_eq!(parse_reset_time("Jan 5 at 9am", &clock()), expected);
        assert_eq!(parse_reset_time("Jan 5, 9am", &clock()), expected);
        assert_eq!(parse_reset_time("January 5th at 9:00am", &clock()), expected);
    }

    #[test]
    fn test_dated_in_past_rolls_to_next_year() {
        assert_eq!(
            parse_reset_time("Dec 31 at 11pm", &clock()),
            Some(at(2026, 12, 31, 23, 0))
        );
        // Less than a day ago stays as is.
        assert_eq!(
            parse_reset_time("Jan 3 at 9am", &clock()),
            Some(at(2026, 1, 3, 9, 0))
        );
    }

    #[test]
    fn test_codex_formats() {
        assert_eq!(
            parse_reset_time("14:30 on 5 Jan", &clock()),
            Some(at(2026, 1, 5, 14, 30))
        );
        assert_eq!(parse_reset_time("14:30", &clock()), Some(at(2026, 1, 3, 14, 30)));
        assert_eq!(parse_reset_time("08:15", &clock()), Some(at(2026, 1, 4, 8, 15)));
    }

    #[test]
    fn test_utc_suffix_overrides_clock_offset() {
        let berlin_clock = ParseClock::new(
            FixedOffset::east_opt(3600)
                .unwrap()
                .with_ymd_and_hms(2026, 1, 3, 11, 0, 0)
                .unwrap(),
        );
        assert_eq!(
            parse_reset_time("3pm", &berlin_clock),
            Some(at(2026, 1, 3, 14, 0))
        );
        assert_eq!(
            parse_reset_time("3pm (UTC)", &berlin_clock),
            Some(at(2026, 1, 3, 15, 0))
        );
    }

    #[test]
    fn test_named_zone_differs_from_clock_offset() {
        assert_eq!(
            parse_reset_time("3pm (America/Los_Angeles)", &clock()),
            Some(at(2026, 1, 3, 23, 0))
        );
        assert_eq!(
            parse_reset_time("Jan 5 at 9am (Asia/Tokyo)", &clock()),
            Some(at(2026, 1, 5, 0, 0))
        );
    }

    #[test]
    fn test_named_zone_follows_daylight_saving() {
        // Berlin is UTC+2 in July.
        assert_eq!(
            parse_reset_time("Jul 5 at 9am (Europe/Berlin)", &clock()),
            Some(at(2026, 7, 5, 7, 0))
        );
    }

    #[test]
    fn test_named_zone_rollover_uses_zone_date() {
        // 10:00 UTC is 02:00 in Los Angeles, so 1am there already passed today.
        assert_eq!(
            parse_reset_time("1am (America/Los_Angeles)", &clock()),
            Some(at(2026, 1, 4, 9, 0))
        );
    }

    #[test]
    fn test_unknown_zone_keeps_clock_offset() {
        let offset_clock = ParseClock::new(
            FixedOffset::east_opt(3600)
                .unwrap()
                .with_ymd_and_hms(2026, 1, 3, 11, 0, 0)
                .unwrap(),
        );
        assert_eq!(
            parse_reset_time("3pm (Mars/Olympus_Mons)", &offset_clock),
            Some(at(2026, 1, 3, 14, 0))
        );
    }

    #[test]
    fn test_unparseable_is_none() {
        assert!(parse_reset_time("tomorrow", &clock()).is_none());
        assert!(parse_reset_time("", &clock()).is_none());
        assert!(parse_reset_time("13pm", &clock()).is_none());
        assert!(parse_reset_time("Feb 30 at 3pm", &clock()).is_none());
        assert!(parse_reset_time("25:00", &clock()).is_none());
    }

    #[test]
    fn test_deterministic() {
        let a = parse_reset_time("Jan 5 at 9am (America/New_York)", &clock());
        let b = parse_reset_time("Jan 5 at 9am (America/New_York)", &clock());
        assert_eq!(a, b);
    }
}
