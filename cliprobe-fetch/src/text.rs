//! Terminal text cleanup.
//!
//! Interactive CLIs paint their screens with cursor movement instead of
//! plain spaces and newlines. Before any marker or field matching the raw
//! PTY bytes go through [`clean_terminal_bytes`], which turns the movement
//! sequences that separate words into whitespace and then strips every
//! remaining CSI/OSC escape.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::bytes::Regex as BytesRegex;

/// Maximum number of characters kept in a parse-failure excerpt.
pub const EXCERPT_LIMIT: usize = 400;

/// Carriage return, with or without a following line feed.
static CARRIAGE_RETURN_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"\r\n?").expect("Invalid regex"));

/// `ESC [ n C` (cursor forward): rendered as a space.
static CURSOR_FORWARD_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"\x1b\[\d*C").expect("Invalid regex"));

/// `ESC [ r ; c H` / `ESC [ r d` (absolute positioning): rendered as a newline.
static CURSOR_POSITION_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"\x1b\[\d*(?:;\d*)?[Hfd]").expect("Invalid regex"));

// ============================================================================
// ANSI Code Stripping
// ============================================================================

/// Converts raw PTY output into plain text suitable for matching.
///
/// Cursor-forward becomes a space, absolute positioning becomes a newline,
/// carriage returns become newlines, all other escapes are removed and
/// remaining control characters (other than `\n` and `\t`) are dropped.
pub fn clean_terminal_bytes(raw: &[u8]) -> String {
    let spaced = CURSOR_FORWARD_RE.replace_all(raw, &b" "[..]);
    let positioned = CURSOR_POSITION_RE.replace_all(&spaced, &b"\n"[..]);
    let lined = CARRIAGE_RETURN_RE.replace_all(&positioned, &b"\n"[..]);
    let stripped = strip_ansi_escapes::strip(lined.as_ref());
    let text = String::from_utf8_lossy(&stripped);

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' | '\t' => out.push(c),
            '\u{a0}' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Collapses every run of whitespace into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns a bounded prefix of cleaned text for diagnostics.
///
/// The result never exceeds [`EXCERPT_LIMIT`] characters plus an ellipsis.
pub fn excerpt(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return "<no output>".to_string();
    }
    match collapsed.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}…", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Lower-cases text for case-insensitive substring matching.
pub fn fold_case(text: &str) -> Cow<'_, str> {
    if text.chars().any(char::is_uppercase) {
        Cow::Owned(text.to_lowercase())
    } else {
        Cow::Borrowed(text)
    }
}

/// Parses a percentage literal like `"42"` or `"45.5"`.
pub fn parse_percent(literal: &str) -> Option<f64> {
    let value: f64 = literal.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

// ============================================================================
// Tests
// ============================================================================
