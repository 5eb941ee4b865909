use rwatch_rewards::{AccountSnapshot, AccountStatus};
use serde::{Deserialize, Serialize};

/// Response for a node status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(rename = "last-round")]
    pub last_round: u64,
}

/// Response for a ledger supply query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyResponse {
    /// The node reports this one field in snake case.
    #[serde(rename = "current_round", default)]
    pub current_round: u64,
    #[serde(rename = "online-money", default)]
    pub online_money: u64,
    #[serde(rename = "total-money")]
    pub total_money: u64,
}

/// Reward parameters of a block header. The node omits zero-valued fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockRewards {
    #[serde(rename = "rnd", default)]
    pub round: u64,
    #[serde(rename = "rate", default)]
    pub reward_rate: u64,
    #[serde(rename = "frac", default)]
    pub reward_residue: u64,
}

/// Envelope of a block query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResponse {
    pub block: BlockRewards,
}

/// Response for an account query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(rename = "amount-without-pending-rewards", default)]
    pub amount_without_pending_rewards: u64,
    #[serde(rename = "pending-rewards", default)]
    pub pending_rewards: u64,
    pub status: AccountStatus,
}

impl AccountResponse {
    /// The subset of fields the reward estimator consumes.
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            balance_without_rewards: self.amount_without_pending_rewards,
            pending_rewards_field: self.pending_rewards,
            status: self.status,
        }
    }
}

/// Error body returned by the node on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
