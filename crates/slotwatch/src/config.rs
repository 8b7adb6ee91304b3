//! Watcher configuration.

use std::time::Duration;

use crate::registry::DEFAULT_CAPACITY;

pub const ENV_CAPACITY: &str = "SLOTWATCH_CAPACITY";
pub const ENV_POLL_TIMEOUT_MS: &str = "SLOTWATCH_POLL_TIMEOUT_MS";
pub const ENV_IDLE_BACKOFF_MS: &str = "SLOTWATCH_IDLE_BACKOFF_MS";
pub const ENV_MAX_UNAVAILABLE: &str = "SLOTWATCH_MAX_UNAVAILABLE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Maximum number of slots tracked at once.
    pub registry_capacity: usize,
    /// How long a single poll may wait for an event.
    pub poll_timeout: Duration,
    /// Sleep after a poll that produced nothing.
    pub idle_backoff: Duration,
    /// Consecutive unavailable polls tolerated before giving up.
    /// `None` retries forever.
    pub max_unavailable_polls: Option<u32>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            registry_capacity: DEFAULT_CAPACITY,
            poll_timeout: Duration::from_secs(1),
            idle_backoff: Duration::from_secs(1),
            max_unavailable_polls: None,
        }
    }
}

impl WatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `SLOTWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(capacity) = parse_var::<usize>(&lookup, ENV_CAPACITY)? {
            if capacity == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_CAPACITY,
                    value: "0".to_string(),
                });
            }
            self.registry_capacity = capacity;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_POLL_TIMEOUT_MS)? {
            self.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_IDLE_BACKOFF_MS)? {
            self.idle_backoff = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<u32>(&lookup, ENV_MAX_UNAVAILABLE)? {
            if max == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_MAX_UNAVAILABLE,
                    value: "0".to_string(),
                });
            }
            self.max_unavailable_polls = Some(max);
        }
        Ok(self)
    }

    /// Capacity is clamped to at least one slot.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity.max(1);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Clamped to at least one failed poll.
    pub fn with_max_unavailable_polls(mut self, max: u32) -> Self {
        self.max_unavailable_polls = Some(max.max(1));
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(vars: &[(&'static str, &str)]) -> Result<WatcherConfig, ConfigError> {
        let vars: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        WatcherConfig::default().overlay(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = WatcherConfig::new();
        assert_eq!(config.registry_capacity, 255);
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.idle_backoff, Duration::from_secs(1));
        assert_eq!(config.max_unavailable_polls, None);
    }

    #[test]
    fn overlay_without_vars_is_default() {
        assert_eq!(overlay(&[]).unwrap(), WatcherConfig::default());
    }

    #[test]
    fn overlay_reads_all_keys() {
        let config = overlay(&[
            (ENV_CAPACITY, "16"),
            (ENV_POLL_TIMEOUT_MS, "250"),
            (ENV_IDLE_BACKOFF_MS, " 50 "),
            (ENV_MAX_UNAVAILABLE, "3"),
        ])
        .unwrap();

        assert_eq!(config.registry_capacity, 16);
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.idle_backoff, Duration::from_millis(50));
        assert_eq!(config.max_unavailable_polls, Some(3));
    }

    #[test]
    fn overlay_rejects_garbage() {
        assert_eq!(
            overlay(&[(ENV_POLL_TIMEOUT_MS, "soon")]).unwrap_err(),
            ConfigError::Invalid {
                key: ENV_POLL_TIMEOUT_MS,
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn overlay_rejects_zero_capacity() {
        assert!(overlay(&[(ENV_CAPACITY, "0")]).is_err());
    }

    #[test]
    fn overlay_rejects_zero_unavailable_budget() {
        assert_eq!(
            overlay(&[(ENV_MAX_UNAVAILABLE, "0")]).unwrap_err(),
            ConfigError::Invalid {
                key: ENV_MAX_UNAVAILABLE,
                value: "0".to_string()
            }
        );
    }

    #[test]
    fn builder_clamps_zero_to_one() {
        let config = WatcherConfig::new()
            .with_capacity(0)
            .with_max_unavailable_polls(0);
        assert_eq!(config.registry_capacity, 1);
        assert_eq!(config.max_unavailable_polls, Some(1));
    }

    #[test]
    fn builder_setters() {
        let config = WatcherConfig::new()
            .with_capacity(2)
            .with_poll_timeout(Duration::ZERO)
            .with_idle_backoff(Duration::from_millis(5))
            .with_max_unavailable_polls(1);
        assert_eq!(config.registry_capacity, 2);
        assert_eq!(config.poll_timeout, Duration::ZERO);
        assert_eq!(config.idle_backoff, Duration::from_millis(5));
        assert_eq!(config.max_unavailable_polls, Some(1));
    }
}
