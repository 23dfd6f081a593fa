//! Garbage collector configuration.
//!
//! # Configuration
//!
//! Scheduling knobs can be set via environment variables:
//! - `BLOBSWEEP_TICK_INTERVAL_SECS` (default: 300)
//! - `BLOBSWEEP_GC_FREQUENCY_HOURS` (default: 2.0)
//! - `BLOBSWEEP_GC_DELAY_HOURS` (default: 6.0)
//! - `BLOBSWEEP_LOCK_TTL_SECS` (default: 1800)
//!
//! Namespace policies themselves come from the host system's configuration;
//! they are consumed read-only through [`GcConfig::namespaces`].
//!
//! # Example
//!
//! ```rust
//! use blobsweep::config::{GcConfig, NamespacePolicy};
//!
//! let config = GcConfig::new()
//!     .with_tick_interval_secs(60)
//!     .with_namespace(NamespacePolicy::new("game.assets"));
//! assert_eq!(config.namespaces.len(), 1);
//! ```

use crate::models::NamespaceId;
use serde::{Deserialize, Serialize};

/// Environment variable for the scheduler tick interval in seconds.
pub const TICK_INTERVAL_ENV: &str = "BLOBSWEEP_TICK_INTERVAL_SECS";

/// Environment variable for the default collection frequency in hours.
pub const GC_FREQUENCY_ENV: &str = "BLOBSWEEP_GC_FREQUENCY_HOURS";

/// Environment variable for the default deletion grace window in hours.
pub const GC_DELAY_ENV: &str = "BLOBSWEEP_GC_DELAY_HOURS";

/// Environment variable for the per-namespace lock TTL in seconds.
pub const LOCK_TTL_ENV: &str = "BLOBSWEEP_LOCK_TTL_SECS";

/// Default scheduler tick interval (5 minutes).
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 300;

/// Default collection frequency in hours.
pub const DEFAULT_GC_FREQUENCY_HOURS: f64 = 2.0;

/// Default deletion grace window in hours.
pub const DEFAULT_GC_DELAY_HOURS: f64 = 6.0;

/// Default per-namespace lock TTL (30 minutes).
pub const DEFAULT_LOCK_TTL_SECS: u64 = 1800;

const SECS_PER_HOUR: f64 = 3600.0;

/// Converts a non-negative hour count to whole seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn hours_to_secs(hours: f64) -> u64 {
    (hours.max(0.0) * SECS_PER_HOUR) as u64
}

/// Per-namespace collection policy, consumed read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespacePolicy {
    /// Namespace this policy applies to.
    pub id: NamespaceId,
    /// How often the namespace is due for collection, in hours.
    pub gc_frequency_hours: f64,
    /// Minimum age an apparently-orphaned blob must reach before deletion,
    /// in hours. Tolerates write/link races.
    pub gc_delay_hours: f64,
}

impl NamespacePolicy {
    /// Creates a policy with default frequency and delay.
    pub fn new(id: impl Into<NamespaceId>) -> Self {
        Self {
            id: id.into(),
            gc_frequency_hours: DEFAULT_GC_FREQUENCY_HOURS,
            gc_delay_hours: DEFAULT_GC_DELAY_HOURS,
        }
    }

    /// Sets the collection frequency.
    #[must_use]
    pub const fn with_frequency_hours(mut self, hours: f64) -> Self {
        self.gc_frequency_hours = hours;
        self
    }

    /// Sets the deletion grace window.
    #[must_use]
    pub const fn with_delay_hours(mut self, hours: f64) -> Self {
        self.gc_delay_hours = hours;
        self
    }

    /// Collection frequency in whole seconds.
    #[must_use]
    pub fn frequency_secs(&self) -> u64 {
        hours_to_secs(self.gc_frequency_hours)
    }

    /// Grace window in whole seconds.
    #[must_use]
    pub fn delay_secs(&self) -> u64 {
        hours_to_secs(self.gc_delay_hours)
    }
}

/// Top-level garbage collector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcConfig {
    /// Scheduler tick interval in seconds.
    pub tick_interval_secs: u64,

    /// TTL on the per-namespace distributed lock, in seconds.
    ///
    /// Bounds how long a crashed holder can stall future cycles; the
    /// scheduler renews the lease at session phase boundaries.
    pub lock_ttl_secs: u64,

    /// Node-record upserts per batch during root discovery.
    ///
    /// Throughput knob only; any value >= 1 preserves semantics.
    pub root_batch_size: usize,

    /// Hashes read from the reachability log per BFS batch.
    ///
    /// Throughput knob only; any value >= 1 preserves semantics.
    pub read_batch_size: usize,

    /// Namespaces under collection.
    pub namespaces: Vec<NamespacePolicy>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            root_batch_size: 20,
            read_batch_size: 128,
            namespaces: Vec::new(),
        }
    }
}

impl GcConfig {
    /// Creates a config with default values and no namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a config from environment variables.
    ///
    /// Reads [`TICK_INTERVAL_ENV`], [`LOCK_TTL_ENV`], and applies
    /// [`GC_FREQUENCY_ENV`] / [`GC_DELAY_ENV`] as the defaults for any
    /// namespaces added afterwards via [`Self::with_namespace_defaults`].
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = std::env::var(TICK_INTERVAL_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.tick_interval_secs = secs;
        }

        if let Some(secs) = std::env::var(LOCK_TTL_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.lock_ttl_secs = secs;
        }

        config
    }

    /// Sets the tick interval.
    #[must_use]
    pub const fn with_tick_interval_secs(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    /// Sets the lock TTL.
    #[must_use]
    pub const fn with_lock_ttl_secs(mut self, secs: u64) -> Self {
        self.lock_ttl_secs = secs;
        self
    }

    /// Sets the root-discovery upsert batch size (clamped to >= 1).
    #[must_use]
    pub fn with_root_batch_size(mut self, size: usize) -> Self {
        self.root_batch_size = size.max(1);
        self
    }

    /// Sets the BFS read batch size (clamped to >= 1).
    #[must_use]
    pub fn with_read_batch_size(mut self, size: usize) -> Self {
        self.read_batch_size = size.max(1);
        self
    }

    /// Adds a namespace policy.
    #[must_use]
    pub fn with_namespace(mut self, policy: NamespacePolicy) -> Self {
        self.namespaces.push(policy);
        self
    }

    /// Adds a namespace using the environment-default frequency and delay.
    #[must_use]
    pub fn with_namespace_defaults(self, id: impl Into<NamespaceId>) -> Self {
        let frequency = std::env::var(GC_FREQUENCY_ENV)
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_GC_FREQUENCY_HOURS);
        let delay = std::env::var(GC_DELAY_ENV)
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_GC_DELAY_HOURS);
        self.with_namespace(
            NamespacePolicy::new(id)
                .with_frequency_hours(frequency)
                .with_delay_hours(delay),
        )
    }

    /// Looks up the policy for a namespace.
    #[must_use]
    pub fn policy(&self, id: &NamespaceId) -> Option<&NamespacePolicy> {
        self.namespaces.iter().find(|p| &p.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GcConfig::default();
        assert_eq!(config.tick_interval_secs, 300);
        assert_eq!(config.lock_ttl_secs, 1800);
        assert_eq!(config.root_batch_size, 20);
        assert_eq!(config.read_batch_size, 128);
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn test_policy_seconds_conversion() {
        let policy = NamespacePolicy::new("ns")
            .with_frequency_hours(2.0)
            .with_delay_hours(6.0);
        assert_eq!(policy.frequency_secs(), 7200);
        assert_eq!(policy.delay_secs(), 21600);

        let fractional = NamespacePolicy::new("ns").with_delay_hours(0.5);
        assert_eq!(fractional.delay_secs(), 1800);
    }

    #[test]
    fn test_batch_sizes_clamped() {
        let config = GcConfig::new()
            .with_root_batch_size(0)
            .with_read_batch_size(0);
        assert_eq!(config.root_batch_size, 1);
        assert_eq!(config.read_batch_size, 1);
    }

    #[test]
    fn test_namespace_defaults_without_env() {
        let config = GcConfig::new().with_namespace_defaults("ns");
        let policy = config.policy(&NamespaceId::new("ns")).expect("policy exists");
        assert!((policy.gc_frequency_hours - DEFAULT_GC_FREQUENCY_HOURS).abs() < f64::EPSILON);
        assert!((policy.gc_delay_hours - DEFAULT_GC_DELAY_HOURS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_policy_lookup() {
        let config = GcConfig::new()
            .with_namespace(NamespacePolicy::new("a"))
            .with_namespace(NamespacePolicy::new("b").with_delay_hours(1.0));
        let ns = NamespaceId::new("b");
        let policy = config.policy(&ns).expect("policy exists");
        assert!((policy.gc_delay_hours - 1.0).abs() < f64::EPSILON);
        assert!(config.policy(&NamespaceId::new("missing")).is_none());
    }
}
