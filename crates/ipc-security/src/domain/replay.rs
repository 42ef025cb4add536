//! # Replay Guard
//!
//! Tracks which `(timestamp, nonce)` pairs have been accepted so each
//! envelope is honoured at most once.
//!
//! ## Check order
//!
//! 1. age > freshness window        -> `MessageExpired`
//! 2. ahead of now > max skew       -> `ClockSkewRejected`
//! 3. pair already accepted         -> `ReplayDetected`
//! 4. record the pair and accept
//!
//! Steps 3 and 4 run under one lock, so two concurrent checks of the same
//! pair cannot both succeed.
//!
//! ## Eviction
//!
//! - [`EvictionPolicy::TimeIndexed`] (default): the accepted set is ordered by
//!   timestamp and every entry that can no longer pass the freshness check is
//!   dropped. Nothing younger than the window is ever forgotten.
//! - [`EvictionPolicy::WholeCache`]: the sweep clears the whole set once it
//!   grows past the clear threshold (80% of capacity by default). A traffic
//!   burst can trigger a spurious clear, which briefly re-opens the replay
//!   window for still-fresh messages.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::entities::{Nonce, ReplayKey};
use super::errors::SecurityViolation;
use super::keys::RotationListener;

/// Strategy used by [`ReplayGuard::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop only entries older than the freshness window.
    #[default]
    TimeIndexed,
    /// Clear the entire set past the size threshold.
    WholeCache,
}

/// Tuning for [`ReplayGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayGuardConfig {
    pub freshness_window_ms: u64,
    pub max_future_skew_ms: u64,
    pub max_entries: usize,
    pub clear_threshold_percent: u8,
    pub eviction: EvictionPolicy,
}

impl Default for ReplayGuardConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: 30_000,
            max_future_skew_ms: 5_000,
            max_entries: 1_000,
            clear_threshold_percent: 80,
            eviction: EvictionPolicy::TimeIndexed,
        }
    }
}

/// Why a sweep removed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepReason {
    /// Nothing removed.
    Idle,
    /// Entries aged out of the freshness window.
    Expired,
    /// Whole set cleared: above the clear threshold.
    ThresholdExceeded,
    /// Whole set cleared: above the hard cap.
    CapacityExceeded,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub evicted: usize,
    pub remaining: usize,
    pub reason: SweepReason,
}

/// Membership set of accepted envelopes.
pub struct ReplayGuard {
    config: ReplayGuardConfig,
    accepted: Mutex<BTreeSet<ReplayKey>>,
}

impl ReplayGuard {
    pub fn new(config: ReplayGuardConfig) -> Self {
        Self {
            config,
            accepted: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn config(&self) -> &ReplayGuardConfig {
        &self.config
    }

    /// Validate freshness, then atomically test-and-insert the pair.
    pub fn check_and_record(
        &self,
        timestamp: u64,
        nonce: Nonce,
        now: u64,
    ) -> Result<(), SecurityViolation> {
        self.check_freshness(timestamp, now)?;

        let key = ReplayKey { timestamp, nonce };
        let mut accepted = self.accepted.lock();

        if self.config.eviction == EvictionPolicy::TimeIndexed {
            prune_expired(&mut accepted, self.retention_cutoff(now));
        }

        if !accepted.insert(key) {
            return Err(SecurityViolation::ReplayDetected);
        }

        Ok(())
    }

    fn check_freshness(&self, timestamp: u64, now: u64) -> Result<(), SecurityViolation> {
        if timestamp <= now {
            let age_ms = now - timestamp;
            if age_ms > self.config.freshness_window_ms {
                return Err(SecurityViolation::MessageExpired {
                    age_ms,
                    max_age_ms: self.config.freshness_window_ms,
                });
            }
        } else {
            let ahead_ms = timestamp - now;
            if ahead_ms > self.config.max_future_skew_ms {
                return Err(SecurityViolation::ClockSkewRejected {
                    ahead_ms,
                    max_skew_ms: self.config.max_future_skew_ms,
                });
            }
        }
        Ok(())
    }

    /// Entries with a timestamp below this can never pass the freshness
    /// check again. The skew margin absorbs small wall-clock steps backwards.
    fn retention_cutoff(&self, now: u64) -> u64 {
        now.saturating_sub(
            self.config
                .freshness_window_ms
                .saturating_add(self.config.max_future_skew_ms),
        )
    }

    /// Periodic eviction pass, according to the configured policy.
    pub fn sweep(&self, now: u64) -> SweepOutcome {
        let mut accepted = self.accepted.lock();
        let before = accepted.len();

        let reason = match self.config.eviction {
            EvictionPolicy::TimeIndexed => {
                prune_expired(&mut accepted, self.retention_cutoff(now));
                if accepted.len() >= self.config.max_entries {
                    tracing::warn!(
                        entries = accepted.len(),
                        max_entries = self.config.max_entries,
                        "Replay cache holds more fresh entries than its nominal capacity"
                    );
                }
                if accepted.len() < before {
                    SweepReason::Expired
                } else {
                    SweepReason::Idle
                }
            }
            EvictionPolicy::WholeCache => {
                let threshold = self
                    .config
                    .max_entries
                    .saturating_mul(usize::from(self.config.clear_threshold_percent));
                if before > self.config.max_entries {
                    accepted.clear();
                    SweepReason::CapacityExceeded
                } else if before.saturating_mul(100) > threshold {
                    accepted.clear();
                    SweepReason::ThresholdExceeded
                } else {
                    SweepReason::Idle
                }
            }
        };

        let outcome = SweepOutcome {
            evicted: before - accepted.len(),
            remaining: accepted.len(),
            reason,
        };

        if matches!(
            reason,
            SweepReason::CapacityExceeded | SweepReason::ThresholdExceeded
        ) {
            tracing::info!(
                evicted = outcome.evicted,
                reason = ?reason,
                "Replay cache cleared"
            );
        }

        outcome
    }

    /// Forget every accepted pair.
    pub fn clear(&self) -> usize {
        let mut accepted = self.accepted.lock();
        let evicted = accepted.len();
        accepted.clear();
        evicted
    }

    pub fn len(&self) -> usize {
        self.accepted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, timestamp: u64, nonce: &Nonce) -> bool {
        self.accepted.lock().contains(&ReplayKey {
            timestamp,
            nonce: *nonce,
        })
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(ReplayGuardConfig::default())
    }
}

impl RotationListener for ReplayGuard {
    /// Signatures under the old key are dead; their nonces need no tracking.
    fn on_key_rotated(&self, generation: u64) {
        let evicted = self.clear();
        tracing::info!(generation, evicted, "Replay cache cleared after key rotation");
    }
}

fn prune_expired(accepted: &mut BTreeSet<ReplayKey>, cutoff: u64) {
    if accepted
        .first()
        .map_or(true, |oldest| oldest.timestamp >= cutoff)
    {
        return;
    }
    let keep = accepted.split_off(&ReplayKey {
        timestamp: cutoff,
        nonce: Nonce::MIN,
    });
    *accepted = keep;
}
