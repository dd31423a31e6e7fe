//! Lifecycle timing and policy settings

use std::time::Duration;

use super::registry::RegistryConfig;
use super::restart::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW};
use crate::error::ConfigError;
use crate::welcome::WelcomeConfig;

/// Delay between `Connected` and the welcome/upload side effects
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Delay between `Connected` and closing the transport
pub const DEFAULT_TEARDOWN_DELAY: Duration = Duration::from_secs(120);

/// Age after which a session that never connected is evicted
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(600);

/// How often the sweeper looks for expired sessions
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Browser name announced by transports
pub const DEFAULT_BROWSER_NAME: &str = "Pairlink";

/// Settings for [`LifecycleController`](super::LifecycleController)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub settle_delay: Duration,
    pub teardown_delay: Duration,
    /// `None` disables eviction of pending sessions
    pub pending_ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub reconnect_max_attempts: u32,
    pub reconnect_window: Duration,
    pub browser_name: String,
    pub welcome: WelcomeConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            teardown_delay: DEFAULT_TEARDOWN_DELAY,
            pending_ttl: Some(DEFAULT_PENDING_TTL),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            reconnect_max_attempts: DEFAULT_MAX_ATTEMPTS,
            reconnect_window: DEFAULT_WINDOW,
            browser_name: DEFAULT_BROWSER_NAME.to_string(),
            welcome: WelcomeConfig::default(),
        }
    }
}

impl LifecycleConfig {
    /// Check the ordering constraints between delays
    ///
    /// Teardown must come strictly after the side effects it would cut off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.teardown_delay <= self.settle_delay {
            return Err(ConfigError::TeardownBeforeSettle {
                settle: self.settle_delay,
                teardown: self.teardown_delay,
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Zero("sweep interval"));
        }
        if self.reconnect_window.is_zero() {
            return Err(ConfigError::Zero("reconnect window"));
        }
        Ok(())
    }

    /// Registry settings derived from this config
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            reconnect_max_attempts: self.reconnect_max_attempts,
            reconnect_window: self.reconnect_window,
        }
    }
}
