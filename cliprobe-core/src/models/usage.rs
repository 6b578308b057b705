//! What a probe reads off a usage screen.
//!
//! - [`UsageSnapshot`]: up to three rate windows plus credits and identity
//! - [`RateWindow`]: one quota period
//! - [`Credits`]: prepaid balance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderIdentity;
use super::source::FetchSource;
use crate::error::CoreError;

// ============================================================================
// Usage Snapshot
// ============================================================================

/// Result of one successful probe.
///
/// - **Primary** = session window (5 hours for both CLIs)
/// - **Secondary** = weekly window
/// - **Tertiary** = premium-model weekly window (Claude only)
///
/// `updated_at` comes from the caller's clock so that parsing the same
/// capture twice yields equal snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Session window.
    pub primary: Option<RateWindow>,
    /// Weekly window.
    pub secondary: Option<RateWindow>,
    /// Premium-model weekly window.
    pub tertiary: Option<RateWindow>,
    /// Credit balance, for CLIs that show one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Credits>,
    /// When the capture was parsed.
    pub updated_at: DateTime<Utc>,
    /// Who the CLI is signed in as.
    pub identity: Option<ProviderIdentity>,
    /// Transport that produced the capture.
    #[serde(default)]
    pub fetch_source: FetchSource,
    /// Cleaned terminal text the snapshot was parsed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl UsageSnapshot {
    /// Empty snapshot stamped with the wall clock.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Empty snapshot stamped with `updated_at`.
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            primary: None,
            secondary: None,
            tertiary: None,
            credits: None,
            updated_at,
            identity: None,
            fetch_source: FetchSource::default(),
            raw_text: None,
        }
    }

    /// Returns true if any window or a credit balance was found.
    pub fn has_data(&self) -> bool {
        self.windows().next().is_some() || self.credits.is_some()
    }

    /// The windows present, labelled `primary`, `secondary`, `tertiary`.
    pub fn windows(&self) -> impl Iterator<Item = (&'static str, &RateWindow)> {
        [
            ("primary", self.primary.as_ref()),
            ("secondary", self.secondary.as_ref()),
            ("tertiary", self.tertiary.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, w)| w.map(|w| (label, w)))
    }

    /// Checks every window's percentage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidData`] naming the first bad window.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (label, window) in self.windows() {
            window
                .validate()
                .map_err(|e| CoreError::InvalidData(format!("{label} window: {e}")))?;
        }
        Ok(())
    }

    /// Clamps every window into `[0, 100]`.
    pub fn sanitize(&mut self) {
        for window in [&mut self.primary, &mut self.secondary, &mut self.tertiary]
            .into_iter()
            .flatten()
        {
            window.sanitize();
        }
    }
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Rate Window
// ============================================================================

/// One quota period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    /// Percent of the quota used, `[0, 100]`.
    pub used_percent: f64,
    /// Length in minutes (300 for the session, 10080 for the week).
    pub window_minutes: Option<u32>,
    /// When the window resets. `None` means unknown, not an error.
    pub resets_at: Option<DateTime<Utc>>,
    /// Reset text as printed by the CLI, e.g. "3pm (Europe/Berlin)".
    pub reset_description: Option<String>,
}

impl RateWindow {
    /// Creates a window, clamping `used_percent` into `[0, 100]`.
    pub fn new(used_percent: f64) -> Self {
        let mut window = Self {
            used_percent,
            window_minutes: None,
            resets_at: None,
            reset_description: None,
        };
        window.sanitize();
        window
    }

    /// Creates a window from a "N% left" reading.
    pub fn from_remaining(remaining_percent: f64) -> Self {
        Self::new(100.0 - remaining_percent)
    }

    /// Sets the window length.
    #[must_use]
    pub fn with_window_minutes(mut self, minutes: u32) -> Self {
        self.window_minutes = Some(minutes);
        self
    }

    /// Sets the reset time and its original text.
    #[must_use]
    pub fn with_reset(
        mut self,
        resets_at: Option<DateTime<Utc>>,
        description: Option<String>,
    ) -> Self {
        self.resets_at = resets_at;
        self.reset_description = description;
        self
    }

    /// `100 - used_percent`, always within `[0, 100]` even for malformed
    /// windows.
    pub fn remaining_percent(&self) -> f64 {
        let remaining = 100.0 - self.used_percent;
        if remaining.is_finite() {
            remaining.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Checks the percentage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidData`] for NaN, infinities and values
    /// outside `[0, 100]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let used = self.used_percent;
        if used.is_finite() && (0.0..=100.0).contains(&used) {
            Ok(())
        } else {
            Err(CoreError::InvalidData(format!(
                "used_percent {used} is outside [0, 100]"
            )))
        }
    }

    /// Clamps `used_percent` into `[0, 100]`; NaN and infinities become 0.
    pub fn sanitize(&mut self) {
        self.used_percent = if self.used_percent.is_finite() {
            self.used_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }
}

// ============================================================================
// Credits
// ============================================================================

/// Credit balance shown by CLIs that sell prepaid credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    /// Remaining credits.
    pub remaining: f64,
    /// Total credits, when the CLI prints one.
    pub total: Option<f64>,
}

impl Credits {
    /// A balance with no known total.
    pub fn new(remaining: f64) -> Self {
        Self {
            remaining,
            total: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
