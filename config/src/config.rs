use std::path::Path;

use rwatch_rpc::{is_valid_address, DEFAULT_NODE_URL};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::*;

/// Address watched when none is configured.
pub const DEFAULT_ADDRESS: &str = "YX5KZSZT27L7WZAW7TNONVDZHQQAURJKT4BPRS364KTH2DGMEKLLFOPK3U";

/// Everything needed to start a watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Account whose rewards are tracked.
    pub address: String,
    /// Node to poll.
    pub node: NodeConfig,
    /// Backoff for failed node calls.
    pub retry: RetryConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            node: NodeConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Load a config from a TOML file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Save the config as TOML.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the node and retry settings.
    ///
    /// A malformed address is accepted: the watch still runs and reports
    /// zeroed account figures for it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.node.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("node.url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "node.url must be http(s), got '{url}'"
            )));
        }
        if self.node.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "node.connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Whether the configured address is well formed.
    pub fn has_valid_address(&self) -> bool {
        is_valid_address(&self.address)
    }

    /// Apply command-line overrides; `None` keeps the file value.
    pub fn with_overrides(
        mut self,
        address: Option<String>,
        node_url: Option<String>,
        api_token: Option<String>,
    ) -> Self {
        if let Some(address) = address {
            self.address = address;
        }
        if let Some(url) = node_url {
            self.node.url = url;
        }
        if let Some(token) = api_token {
            self.node.api_token = token;
        }
        self
    }

    pub fn uses_default_node(&self) -> bool {
        self.node.url == DEFAULT_NODE_URL
    }
}
