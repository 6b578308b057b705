//! Two-tier escalation.
//!
//! A probe first runs with a shorter timeout and a narrower screen. If that
//! attempt times out or its capture cannot be parsed, it is repeated once,
//! from scratch, with a longer timeout and a larger screen (long status
//! views truncate less). Every other failure is surfaced immediately.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::ProbeError;
use crate::host::PtyOptions;

/// Screen size and deadline of one escalation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTier {
    /// Terminal rows.
    pub rows: u16,
    /// Terminal columns.
    pub cols: u16,
    /// Attempt deadline.
    pub timeout: Duration,
}

impl ProbeTier {
    /// Creates a tier.
    pub const fn new(rows: u16, cols: u16, timeout: Duration) -> Self {
        Self {
            rows,
            cols,
            timeout,
        }
    }

    /// Applies this tier's size and deadline on top of `base`.
    pub fn apply(&self, base: &PtyOptions) -> PtyOptions {
        PtyOptions {
            rows: self.rows,
            cols: self.cols,
            timeout: self.timeout,
            ..base.clone()
        }
    }
}

/// The escalation ladder of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    tiers: Vec<ProbeTier>,
}

impl EscalationPolicy {
    /// Creates the usual two-tier policy.
    pub fn two_tier(first: ProbeTier, second: ProbeTier) -> Self {
        Self {
            tiers: vec![first, second],
        }
    }

    /// Creates a policy that runs a single tier and never escalates.
    pub fn single(tier: ProbeTier) -> Self {
        Self { tiers: vec![tier] }
    }

    /// Returns the tiers in order.
    pub fn tiers(&self) -> &[ProbeTier] {
        &self.tiers
    }

    /// Returns the 1-based tier, if it exists.
    pub fn tier(&self, number: usize) -> Option<&ProbeTier> {
        number.checked_sub(1).and_then(|i| self.tiers.get(i))
    }

    /// Overrides the first tier's timeout; later tiers keep their ratio to it.
    /// A zero timeout is ignored and the defaults stay.
    #[must_use]
    pub fn with_first_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            warn!("Ignoring zero probe timeout");
            return self;
        }
        let Some(first) = self.tiers.first().map(|t| t.timeout) else {
            return self;
        };
        if first.is_zero() {
            return self;
        }
        let ratio = timeout.as_secs_f64() / first.as_secs_f64();
        for tier in &mut self.tiers {
            tier.timeout = tier.timeout.mul_f64(ratio);
        }
        self
    }

    /// Runs `attempt` per tier until one succeeds or fails for good.
    ///
    /// Only retryable errors ([`ProbeError::is_retryable`]) move on to the
    /// next tier; the last tier's error is returned as is.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last tier's error.
    #[instrument(skip_all, fields(tiers = self.tiers.len()))]
    pub fn run<T, F>(&self, mut attempt: F) -> Result<T, ProbeError>
    where
        F: FnMut(&ProbeTier) -> Result<T, ProbeError>,
    {
        let mut last_error = ProbeError::TimedOut;
        for (index, tier) in self.tiers.iter().enumerate() {
            match attempt(tier) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && index + 1 < self.tiers.len() => {
                    info!(
                        tier = index + 1,
                        error = %e,
                        "Attempt failed, escalating to a larger screen and longer timeout"
                    );
                    last_error = e;
                }
                Err(e) => {
                    warn!(tier = index + 1, error = %e, "Probe failed");
                    return Err(e);
                }
            }
        }
        Err(last_error)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> EscalationPolicy {
        EscalationPolicy::two_tier(
            ProbeTier::new(50, 160, Duration::from_secs(20)),
            ProbeTier::new(70, 220, Duration::from_secs(35)),
        )
    }

    #[test]
    fn test_first_success_does_not_escalate() {
        let mut seen = Vec::new();
        let result = policy().run(|tier| {
            seen.push(tier.cols);
            Ok::<_, ProbeError>(tier.rows)
        });
        assert_eq!(result, Ok(50));
        assert_eq!(seen, vec![160]);
    }

    #[test]
    fn test_retryable_error_escalates_once() {
        let mut seen = Vec::new();
        let result = policy().run(|tier| {
            seen.push(tier.cols);
            if tier.cols == 160 {
                Err(ProbeError::TimedOut)
            } else {
                Ok(tier.rows)
            }
        });
        assert_eq!(result, Ok(70));
        assert_eq!(seen, vec![160, 220]);
    }

    #[test]
    fn test_last_tier_error_is_surfaced() {
        let mut calls = 0;
        let result: Result<(), _> = policy().run(|_| {
            calls += 1;
            Err(ProbeError::ParseFailed("no data".to_string()))
        });
        assert_eq!(result, Err(ProbeError::ParseFailed("no data".to_string())));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_non_retryable_error_is_not_retried() {
        for error in [
            ProbeError::AuthRequired,
            ProbeError::UpdateRequired("banner".to_string()),
            ProbeError::BinaryNotFound("claude".to_string()),
        ] {
            let mut calls = 0;
            let result: Result<(), _> = policy().run(|_| {
                calls += 1;
                Err(error.clone())
            });
            assert_eq!(result, Err(error));
            assert_eq!(calls, 1);
        }
    }

    #[test]
    fn test_with_first_timeout_keeps_ratio() {
        let policy = EscalationPolicy::two_tier(
            ProbeTier::new(60, 200, Duration::from_secs(12)),
            ProbeTier::new(70, 220, Duration::from_secs(24)),
        )
        .with_first_timeout(Duration::from_secs(30));

        assert_eq!(policy.tiers()[0].timeout, Duration::from_secs(30));
        assert_eq!(policy.tiers()[1].timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_first_timeout_keeps_defaults() {
        let policy = EscalationPolicy::two_tier(
            ProbeTier::new(60, 200, Duration::from_secs(12)),
            ProbeTier::new(70, 220, Duration::from_secs(24)),
        )
        .with_first_timeout(Duration::ZERO);

        assert_eq!(policy.tiers()[0].timeout, Duration::from_secs(12));
        assert_eq!(policy.tiers()[1].timeout, Duration::from_secs(24));
    }

    #[test]
    fn test_apply_keeps_launch_args() {
        let base = PtyOptions::default().with_args(["-s", "read-only"]);
        let applied = policy().tier(2).unwrap().apply(&base);
        assert_eq!((applied.rows, applied.cols), (70, 220));
        assert_eq!(applied.timeout, Duration::from_secs(35));
        assert_eq!(applied.extra_args, base.extra_args);
        assert!(policy().tier(0).is_none());
        assert!(policy().tier(3).is_none());
    }
}
