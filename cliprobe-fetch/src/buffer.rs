//! Per-session capture buffer.

use crate::text::clean_terminal_bytes;

/// Append-only byte sequence read from one terminal session.
///
/// Detection runs on the bytes after the *scan offset*. Answering a prompt
/// moves the offset to the end so the stale prompt text cannot match again,
/// while the full capture stays available for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct CapturedBuffer {
    bytes: Vec<u8>,
    scan_from: usize,
}

impl CapturedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Total number of captured bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing was captured yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Forgets everything captured so far for detection purposes.
    pub fn mark_consumed(&mut self) {
        self.scan_from = self.bytes.len();
    }

    /// Bytes visible to the detector.
    pub fn unscanned(&self) -> &[u8] {
        &self.bytes[self.scan_from..]
    }

    /// Cleaned text visible to the detector.
    pub fn detection_text(&self) -> String {
        clean_terminal_bytes(self.unscanned())
    }

    /// The complete capture, including consumed prompt text.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cleaned text of the complete capture.
    pub fn full_text(&self) -> String {
        clean_terminal_bytes(&self.bytes)
    }

    /// Consumes the buffer, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
