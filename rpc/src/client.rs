use async_trait::async_trait;
use thiserror::Error;

use crate::types::*;

/// Errors raised by a ledger node client. All of them are transport-level
/// from the watcher's point of view.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode node response: {0}")]
    Decode(String),

    #[error("invalid node endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("node unavailable: {0}")]
    Unavailable(String),
}

/// The ledger node operations consumed by the watcher.
///
/// Implementations must not retry on their own; retry policy belongs to the
/// caller.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current node status, including the latest committed round.
    async fn status(&self) -> Result<NodeStatus, ClientError>;

    /// Suspend until `round` has been committed by the node.
    async fn wait_for_round(&self, round: u64) -> Result<NodeStatus, ClientError>;

    /// Network-wide money supply.
    async fn supply(&self) -> Result<SupplyResponse, ClientError>;

    /// Reward parameters from the header of the block at `round`.
    async fn block(&self, round: u64) -> Result<BlockRewards, ClientError>;

    /// Account state. Callers check `is_valid_address` first.
    async fn account(&self, address: &str) -> Result<AccountResponse, ClientError>;

    /// Structural address check; never touches the network.
    fn is_valid_address(&self, address: &str) -> bool {
        crate::address::is_valid_address(address)
    }
}
