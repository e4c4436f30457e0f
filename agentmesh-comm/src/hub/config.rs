//! Hub configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::deadlock::ResolutionStrategy;

/// Default number of envelopes retained in the history ring
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default bound on detect/resolve passes per deadlock sweep
pub const DEFAULT_MAX_RESOLUTION_PASSES: usize = 4;

/// Hub-wide configuration.
///
/// # Examples
///
/// ```rust
/// use agentmesh_comm::hub::{HubConfig, ResolutionStrategy, DEFAULT_HISTORY_CAPACITY};
/// use std::time::Duration;
///
/// let config = HubConfig::default();
/// assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
///
/// let config = HubConfig::builder()
///     .with_history_capacity(100)
///     .with_deadlock_scan(Duration::from_secs(1), ResolutionStrategy::Youngest)
///     .build()
///     .unwrap();
/// assert_eq!(config.history_capacity, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Envelopes retained in the history ring before eviction
    pub history_capacity: usize,

    /// If set, a periodic deadlock sweep runs at this interval
    pub deadlock_scan_interval: Option<Duration>,

    /// Victim strategy used by the periodic sweep
    pub deadlock_strategy: ResolutionStrategy,

    /// Bound on detect/resolve passes within one sweep
    pub max_resolution_passes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            deadlock_scan_interval: None,
            deadlock_strategy: ResolutionStrategy::Youngest,
            max_resolution_passes: DEFAULT_MAX_RESOLUTION_PASSES,
        }
    }
}

impl HubConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.history_capacity == 0 {
            return Err("history_capacity must be > 0".to_string());
        }
        if self.max_resolution_passes == 0 {
            return Err("max_resolution_passes must be > 0".to_string());
        }
        if let Some(interval) = self.deadlock_scan_interval {
            if interval.is_zero() {
                return Err("deadlock_scan_interval must be > 0".to_string());
            }
        }
        Ok(())
    }
}

/// Builder for [`HubConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct HubConfigBuilder {
    history_capacity: Option<usize>,
    deadlock_scan_interval: Option<Duration>,
    deadlock_strategy: Option<ResolutionStrategy>,
    max_resolution_passes: Option<usize>,
}

impl HubConfigBuilder {
    /// Set the history ring capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Enable the periodic deadlock sweep.
    pub fn with_deadlock_scan(mut self, interval: Duration, strategy: ResolutionStrategy) -> Self {
        self.deadlock_scan_interval = Some(interval);
        self.deadlock_strategy = Some(strategy);
        self
    }

    /// Set the per-sweep pass bound.
    pub fn with_max_resolution_passes(mut self, passes: usize) -> Self {
        self.max_resolution_passes = Some(passes);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<HubConfig, String> {
        let defaults = HubConfig::default();
        let config = HubConfig {
            history_capacity: self.history_capacity.unwrap_or(defaults.history_capacity),
            deadlock_scan_interval: self.deadlock_scan_interval,
            deadlock_strategy: self
                .deadlock_strategy
                .unwrap_or(defaults.deadlock_strategy),
            max_resolution_passes: self
                .max_resolution_passes
                .unwrap_or(defaults.max_resolution_passes),
        };
        config.validate()?;
        Ok(config)
    }
}
