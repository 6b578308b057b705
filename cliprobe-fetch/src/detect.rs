//! Prompt and completion detection.
//!
//! A [`MarkerSet`] is a read-only table of `(kind, matcher)` pairs that the
//! drive loop consults on every poll. Matching always runs over the whole
//! visible buffer (not the latest chunk) because full-screen CLIs redraw
//! and may rewrite earlier lines.
//!
//! Kinds are ordered by priority: a blocking marker such as
//! [`MarkerKind::SignInRequired`] always outranks the boot heuristic, so
//! [`MarkerSet::detect`] never reports "ready" for a screen that is actually
//! a login wall.

use std::fmt;

use regex::Regex;

use crate::text::fold_case;

// ============================================================================
// Marker Kind
// ============================================================================

/// What a marker signals, in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKind {
    /// The CLI demands an interactive login.
    SignInRequired,
    /// The CLI shows an update banner or blocking update dialog.
    UpdateAvailable,
    /// "Do you trust this folder?" style dialog.
    TrustDialog,
    /// Workspace / project selection dialog.
    WorkspaceSelection,
    /// Telemetry or data-sharing consent dialog.
    TelemetryConsent,
    /// The session (5-hour) usage block is on screen.
    SessionData,
    /// The weekly usage block is on screen.
    WeeklyData,
    /// The premium-model weekly block is on screen.
    OpusData,
    /// A status line such as the credits balance is on screen.
    StatusData,
    /// The CLI finished booting and accepts input.
    BootComplete,
}

impl MarkerKind {
    /// Returns a short stable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SignInRequired => "sign-in-required",
            Self::UpdateAvailable => "update-available",
            Self::TrustDialog => "trust-dialog",
            Self::WorkspaceSelection => "workspace-selection",
            Self::TelemetryConsent => "telemetry-consent",
            Self::SessionData => "session-data-present",
            Self::WeeklyData => "weekly-data-present",
            Self::OpusData => "opus-data-present",
            Self::StatusData => "status-data-present",
            Self::BootComplete => "boot-complete",
        }
    }

    /// Returns true for dialogs that can be answered with a known keystroke.
    pub fn is_dialog(&self) -> bool {
        matches!(
            self,
            Self::TrustDialog | Self::WorkspaceSelection | Self::TelemetryConsent
        )
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Matchers
// ============================================================================

/// How a marker recognises its text.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring.
    Substring(String),
    /// Any of several case-insensitive substrings.
    AnyOf(Vec<String>),
    /// A regular expression, matched against the original text.
    Pattern(Regex),
}

impl Matcher {
    /// Creates a case-insensitive substring matcher.
    pub fn substring(needle: &str) -> Self {
        Self::Substring(needle.to_lowercase())
    }

    /// Creates a matcher that fires on any of the given substrings.
    pub fn any_of(needles: &[&str]) -> Self {
        Self::AnyOf(needles.iter().map(|n| n.to_lowercase()).collect())
    }

    /// Creates a regex matcher.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    fn matches(&self, original: &str, folded: &str) -> bool {
        match self {
            Self::Substring(needle) => folded.contains(needle.as_str()),
            Self::AnyOf(needles) => needles.iter().any(|n| folded.contains(n.as_str())),
            Self::Pattern(re) => re.is_match(original),
        }
    }
}

/// One entry of a marker table.
#[derive(Debug, Clone)]
pub struct Marker {
    /// What the marker signals.
    pub kind: MarkerKind,
    /// How it is recognised.
    pub matcher: Matcher,
}

// ============================================================================
// Marker Set
// ============================================================================

/// Immutable, priority-ordered marker table for one CLI.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    /// Creates an empty marker set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a marker, keeping the table sorted by priority.
    #[must_use]
    pub fn with(mut self, kind: MarkerKind, matcher: Matcher) -> Self {
        self.markers.push(Marker { kind, matcher });
        // Stable sort keeps insertion order within one kind.
        self.markers.sort_by_key(|m| m.kind);
        self
    }

    /// Returns the markers in priority order.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Returns the highest-priority marker matching `text`, if any.
    pub fn detect(&self, text: &str) -> Option<MarkerKind> {
        let folded = fold_case(text);
        self.markers
            .iter()
            .find(|m| m.matcher.matches(text, &folded))
            .map(|m| m.kind)
    }

    /// Returns every kind matching `text`, in priority order, without duplicates.
    pub fn matched(&self, text: &str) -> Vec<MarkerKind> {
        let folded = fold_case(text);
        let mut kinds: Vec<MarkerKind> = Vec::new();
        for marker in &self.markers {
            if kinds.last() != Some(&marker.kind) && marker.matcher.matches(text, &folded) {
                kinds.push(marker.kind);
            }
        }
        kinds.dedup();
        kinds
    }

    /// Returns true if any marker of `kind` matches `text`.
    pub fn contains(&self, kind: MarkerKind, text: &str) -> bool {
        let folded = fold_case(text);
        self.markers
            .iter()
            .filter(|m| m.kind == kind)
            .any(|m| m.matcher.matches(text, &folded))
    }
}

// ============================================================================
// Cursor Position Query
// ============================================================================

/// "Where is the cursor?" query some CLIs send before painting.
pub const CURSOR_POSITION_QUERY: &[u8] = b"\x1b[6n";

/// Synthetic answer: row 1, column 1.
pub const CURSOR_POSITION_REPORT: &str = "\x1b[1;1R";

/// Counts cursor position queries in a byte stream.
///
/// Queries split across read chunks are counted exactly once: the last
/// `len - 1` bytes of each chunk are carried into the next scan.
#[derive(Debug, Default, Clone)]
pub struct CursorQueryResponder {
    tail: Vec<u8>,
}

impl CursorQueryResponder {
    /// Creates a responder with no carried state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans a fresh chunk and returns how many reports must be sent.
    pub fn scan(&mut self, chunk: &[u8]) -> usize {
        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);

        let count = window
            .windows(CURSOR_POSITION_QUERY.len())
            .filter(|w| *w == CURSOR_POSITION_QUERY)
            .count();

        let keep = CURSOR_POSITION_QUERY.len() - 1;
        let start = window.len().saturating_sub(keep);
        self.tail = window.split_off(start);
        count
    }
}

// ============================================================================
// Tests
// ============================================================================
