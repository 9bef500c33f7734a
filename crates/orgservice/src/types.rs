//! Shared value types.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values with invariants (limits are non-zero, timestamps are UTC) and take
//! part in domain computations such as capacity checks and cache expiry.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Time elapsed between `earlier` and `self`.
    ///
    /// Saturates at zero when `earlier` is in the future (clock skew or a
    /// manually rewound clock).
    pub fn elapsed_since(self, earlier: Timestamp) -> Duration {
        (self.0 - earlier.0).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns `self + delta`, or `self` unchanged if the sum is not representable.
    pub fn saturating_add(self, delta: Duration) -> Self {
        TimeDelta::from_std(delta)
            .ok()
            .and_then(|d| self.0.checked_add_signed(d))
            .map_or(self, Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Construction-time limits
// ---------------------------------------------------------------------------

/// Capacity limits enforced by the [`crate::BatchManager`].
///
/// Both checks compare with `count > max`, so the registry (or a batch) may
/// hold exactly one entry more than the configured maximum before further
/// insertions are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum number of batches held at once.
    #[serde(default = "default_max_number_of_batches")]
    pub max_number_of_batches: usize,

    /// Maximum number of requests held by a single batch.
    #[serde(default = "default_max_number_of_requests_in_a_batch")]
    pub max_number_of_requests_in_a_batch: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_number_of_batches: default_max_number_of_batches(),
            max_number_of_requests_in_a_batch: default_max_number_of_requests_in_a_batch(),
        }
    }
}

fn default_max_number_of_batches() -> usize {
    50_000
}

fn default_max_number_of_requests_in_a_batch() -> usize {
    5_000
}

// ---------------------------------------------------------------------------

/// Settings for the [`crate::MetadataCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataCacheSettings {
    /// Whole-cache time-to-live, in seconds. All four tables are cleared once
    /// this much time has passed since the last full fetch.
    #[serde(default = "default_staleness_window_secs")]
    pub staleness_window_secs: u64,
}

impl MetadataCacheSettings {
    /// The staleness window as a [`Duration`].
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }
}

impl Default for MetadataCacheSettings {
    fn default() -> Self {
        Self {
            staleness_window_secs: default_staleness_window_secs(),
        }
    }
}

fn default_staleness_window_secs() -> u64 {
    60 * 60
}
