//! Catalog client configuration.

use std::time::Duration;

use crate::error::{ConsulError, Result};

/// Smallest accepted gap between the long-poll wait bound and the HTTP
/// request timeout. A request timeout at or below the wait bound makes
/// every blocking query look like a lost connection.
pub const MIN_TIMEOUT_MARGIN: Duration = Duration::from_secs(3);

/// Default port a Consul agent listens on.
pub const DEFAULT_AGENT_PORT: u16 = 8500;

/// Catalog client configuration.
#[derive(Debug, Clone)]
pub struct ConsulConfig {
    /// Wait bound sent with blocking catalog queries. The agent answers
    /// earlier when its index advances.
    pub wait: Duration,
    /// How much the HTTP request timeout exceeds `wait`.
    pub request_timeout_margin: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(50),
            request_timeout_margin: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ConsulConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ConsulConfigBuilder {
        ConsulConfigBuilder::default()
    }

    /// The timeout applied to every catalog request: `wait` plus the margin,
    /// so a blocking query can never outlive its own transport budget.
    pub fn request_timeout(&self) -> Duration {
        self.wait + self.request_timeout_margin
    }

    /// Check the configuration for values that would break the long poll.
    pub fn validate(&self) -> Result<()> {
        if self.wait.is_zero() {
            return Err(ConsulError::InvalidConfiguration(
                "wait must be at least one second".to_string(),
            ));
        }
        if self.request_timeout_margin < MIN_TIMEOUT_MARGIN {
            return Err(ConsulError::InvalidConfiguration(format!(
                "request timeout margin must be at least {}s",
                MIN_TIMEOUT_MARGIN.as_secs()
            )));
        }
        Ok(())
    }
}

/// Builder for catalog client configuration.
#[derive(Debug, Default)]
pub struct ConsulConfigBuilder {
    config: ConsulConfig,
}

impl ConsulConfigBuilder {
    /// Set the blocking-query wait bound.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.config.wait = wait;
        self
    }

    /// Set the margin between the wait bound and the request timeout.
    pub fn request_timeout_margin(mut self, margin: Duration) -> Self {
        self.config.request_timeout_margin = margin;
        self
    }

    /// Set the TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ConsulConfig {
        self.config
    }
}
