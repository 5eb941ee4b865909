use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{ClientError, LedgerClient};
use crate::types::*;

/// Public mainnet endpoint used when nothing else is configured.
pub const DEFAULT_NODE_URL: &str = "https://mainnet-api.algonode.cloud";

/// Header carrying the node API token.
const TOKEN_HEADER: &str = "X-Algo-API-Token";

/// Pause before asking again when a round wait returns early.
const REPOLL_DELAY: Duration = Duration::from_millis(250);

/// Connection settings for [`AlgodClient`].
#[derive(Debug, Clone)]
pub struct AlgodConfig {
    /// Base URL of the node's REST API.
    pub url: String,
    /// Sent as `X-Algo-API-Token` when set and non-empty.
    pub api_token: Option<String>,
    /// TCP connect timeout. Requests themselves have none.
    pub connect_timeout: Duration,
}

impl Default for AlgodConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NODE_URL.to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Ledger client backed by the node's v2 REST API.
///
/// No overall request timeout is set: the round wait is a long poll.
#[derive(Clone)]
pub struct AlgodClient {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl AlgodClient {
    /// Create a client for the given node.
    pub fn new(config: AlgodConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {e}", config.url)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                base_url.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.filter(|t| !t.is_empty()),
        })
    }

    /// Create a client for `url` with default settings.
    pub fn with_url(url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(AlgodConfig {
            url: url.into(),
            ..AlgodConfig::default()
        })
    }

    /// The node endpoint this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        let request = self.client.get(url);
        match &self.api_token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for AlgodClient {
    async fn status(&self) -> Result<NodeStatus, ClientError> {
        self.fetch(self.get("/v2/status")).await
    }

    async fn wait_for_round(&self, round: u64) -> Result<NodeStatus, ClientError> {
        if round == 0 {
            return self.status().await;
        }

        // The node gives up on the long poll after about a minute and
        // answers with whatever round it is on, so keep asking.
        loop {
            let path = format!("/v2/status/wait-for-block-after/{}", round - 1);
            let status: NodeStatus = self.fetch(self.get(&path)).await?;
            if status.last_round >= round {
                return Ok(status);
            }
            debug!(round, last_round = status.last_round, "round not committed yet");
            tokio::time::sleep(REPOLL_DELAY).await;
        }
    }

    async fn supply(&self) -> Result<SupplyResponse, ClientError> {
        self.fetch(self.get("/v2/ledger/supply")).await
    }

    async fn block(&self, round: u64) -> Result<BlockRewards, ClientError> {
        let path = format!("/v2/blocks/{round}");
        let response: BlockResponse = self
            .fetch(self.get(&path).query(&[("format", "json")]))
            .await?;
        Ok(response.block)
    }

    async fn account(&self, address: &str) -> Result<AccountResponse, ClientError> {
        let path = format!("/v2/accounts/{address}");
        self.fetch(self.get(&path).query(&[("exclude", "all")])).await
    }
}

impl std::fmt::Debug for AlgodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgodClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_token", &self.api_token.is_some())
            .finish()
    }
}
