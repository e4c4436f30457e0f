//! Mesh configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Default per-agent mailbox capacity
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Default timeout for graceful system shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default gossip sweep interval
pub const DEFAULT_GOSSIP_INTERVAL: Duration = Duration::from_millis(1000);

/// Default gossip fan-out (peers contacted per round)
pub const DEFAULT_GOSSIP_FANOUT: usize = 3;

/// Default silence before an alive peer becomes suspect
pub const DEFAULT_SUSPECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default silence before a suspect peer is declared dead
pub const DEFAULT_DEAD_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Configuration for the gossip membership protocol.
///
/// # Examples
///
/// ```rust
/// use agentmesh_comm::mesh::GossipConfig;
/// use std::time::Duration;
///
/// let config = GossipConfig::builder()
///     .with_suspect_timeout(Duration::from_millis(50))
///     .with_dead_timeout(Duration::from_millis(120))
///     .build()
///     .unwrap();
/// assert_eq!(config.suspect_timeout, Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipConfig {
    /// Interval between periodic sweeps
    pub interval: Duration,

    /// Maximum peers returned by target selection
    pub fanout: usize,

    /// Silence threshold for the alive -> suspect transition
    pub suspect_timeout: Duration,

    /// Silence threshold for the suspect -> dead transition
    pub dead_timeout: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_GOSSIP_INTERVAL,
            fanout: DEFAULT_GOSSIP_FANOUT,
            suspect_timeout: DEFAULT_SUSPECT_TIMEOUT,
            dead_timeout: DEFAULT_DEAD_TIMEOUT,
        }
    }
}

impl GossipConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GossipConfigBuilder {
        GossipConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval.is_zero() {
            return Err("interval must be > 0".to_string());
        }
        if self.fanout == 0 {
            return Err("fanout must be > 0".to_string());
        }
        if self.dead_timeout <= self.suspect_timeout {
            return Err("dead_timeout must exceed suspect_timeout".to_string());
        }
        Ok(())
    }
}

/// Builder for [`GossipConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct GossipConfigBuilder {
    interval: Option<Duration>,
    fanout: Option<usize>,
    suspect_timeout: Option<Duration>,
    dead_timeout: Option<Duration>,
}

impl GossipConfigBuilder {
    /// Set the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Set the selection fan-out.
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = Some(fanout);
        self
    }

    /// Set the suspect threshold.
    pub fn with_suspect_timeout(mut self, timeout: Duration) -> Self {
        self.suspect_timeout = Some(timeout);
        self
    }

    /// Set the dead threshold.
    pub fn with_dead_timeout(mut self, timeout: Duration) -> Self {
        self.dead_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<GossipConfig, String> {
        let defaults = GossipConfig::default();
        let config = GossipConfig {
            interval: self.interval.unwrap_or(defaults.interval),
            fanout: self.fanout.unwrap_or(defaults.fanout),
            suspect_timeout: self.suspect_timeout.unwrap_or(defaults.suspect_timeout),
            dead_timeout: self.dead_timeout.unwrap_or(defaults.dead_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}

/// System-wide configuration for the mesh runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Default capacity for agent mailboxes
    pub default_mailbox_capacity: usize,

    /// Timeout for graceful system shutdown
    pub shutdown_timeout: Duration,

    /// Gossip membership configuration
    pub gossip: GossipConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            gossip: GossipConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_mailbox_capacity == 0 {
            return Err("default_mailbox_capacity must be > 0".to_string());
        }
        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be > 0".to_string());
        }
        self.gossip.validate()
    }
}

/// Builder for [`SystemConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    default_mailbox_capacity: Option<usize>,
    shutdown_timeout: Option<Duration>,
    gossip: Option<GossipConfig>,
}

impl SystemConfigBuilder {
    /// Set the default mailbox capacity.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.default_mailbox_capacity = Some(capacity);
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Set the gossip configuration.
    pub fn with_gossip(mut self, gossip: GossipConfig) -> Self {
        self.gossip = Some(gossip);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SystemConfig, String> {
        let defaults = SystemConfig::default();
        let config = SystemConfig {
            default_mailbox_capacity: self
                .default_mailbox_capacity
                .unwrap_or(defaults.default_mailbox_capacity),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(defaults.shutdown_timeout),
            gossip: self.gossip.unwrap_or(defaults.gossip),
        };
        config.validate()?;
        Ok(config)
    }
}
