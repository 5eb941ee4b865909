use std::time::Duration;

use rwatch_rpc::{AlgodConfig, DEFAULT_NODE_URL};
use rwatch_watcher::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Ledger node connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Base URL of the node's REST API.
    pub url: String,
    /// API token; empty means none.
    pub api_token: String,
    /// TCP connect timeout in milliseconds. Requests themselves have none.
    pub connect_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NODE_URL.to_string(),
            api_token: String::new(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl NodeConfig {
    pub fn to_algod_config(&self) -> AlgodConfig {
        AlgodConfig {
            url: self.url.clone(),
            api_token: Some(self.api_token.clone()).filter(|t| !t.is_empty()),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

/// Backoff settings for node calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per round fetch, including the first. Round waits always
    /// retry until cancelled.
    pub max_attempts: u32,
    /// Delay after the first failure, doubled after each further one.
    pub base_delay_ms: u64,
    /// Upper bound on the doubled delay.
    pub max_delay_ms: u64,
    /// Random extra delay of up to this many milliseconds per retry.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts.unwrap_or(1),
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter_ms: policy.jitter.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: Some(self.max_attempts),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

/// Errors that can occur loading or validating a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_matches_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.jitter_ms, 250);
        assert_eq!(config.to_policy(), RetryPolicy::default());
    }

    #[test]
    fn empty_token_is_not_sent() {
        let node = NodeConfig::default();
        let algod = node.to_algod_config();
        assert_eq!(algod.url, DEFAULT_NODE_URL);
        assert_eq!(algod.api_token, None);
        assert_eq!(algod.connect_timeout, Duration::from_secs(10));

        let node = NodeConfig {
            api_token: "secret".to_string(),
            ..NodeConfig::default()
        };
        assert_eq!(node.to_algod_config().api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn retry_config_serde_roundtrip() {
        let config = RetryConfig {
            max_attempts: 7,
            base_delay_ms: 10,
            max_delay_ms: 100,
            jitter_ms: 0,
        };
        let json = serde_json::to_string(&config).unwrap();
        let config2: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, config2);
    }
}
