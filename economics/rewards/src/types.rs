use serde::{Deserialize, Serialize};

/// Micro-units per whole display unit.
pub const UNIT_SCALE: u64 = 1_000_000;

/// Participation status of an account as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    Online,
    Offline,
    NotParticipating,
}

impl AccountStatus {
    /// Whether accounts with this status accrue participation rewards.
    pub fn is_eligible(&self) -> bool {
        !matches!(self, AccountStatus::NotParticipating)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountStatus::Online => "Online",
            AccountStatus::Offline => "Offline",
            AccountStatus::NotParticipating => "NotParticipating",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = RewardsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Online" => Ok(AccountStatus::Online),
            "Offline" => Ok(AccountStatus::Offline),
            "NotParticipating" => Ok(AccountStatus::NotParticipating),
            _ => Err(RewardsError::UnknownStatus(s.to_string())),
        }
    }
}

/// The account fields the estimator needs, as fetched for a single round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Balance in micro-units, excluding rewards not yet credited.
    pub balance_without_rewards: u64,
    /// The node's accrued-but-uncredited reward counter, in micro-units.
    pub pending_rewards_field: u64,
    /// Participation status at the time of the fetch.
    pub status: AccountStatus,
}

/// Protocol-wide reward parameters derived for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoundInfo {
    /// Round these figures were computed for.
    pub round: u64,
    /// Micro-units rewarded per eligible whole unit per round.
    pub reward_rate: u64,
    /// Fractional carry of the reward pool.
    pub reward_residue: u64,
    /// Total circulating micro-units.
    pub total_money: u64,
    /// `None` when the reward rate is zero and no payout is scheduled.
    pub estimated_rounds_until_payout: Option<i64>,
}

/// Reward metrics for the tracked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountInfo {
    /// The address exactly as supplied, even when malformed.
    pub address: String,
    /// Balance in micro-units, excluding rewards not yet credited.
    pub balance_without_rewards: u64,
    /// Rewards already accrued by the node but not yet credited.
    pub earned_rewards: u64,
    /// Projected share of the next reward increment, in micro-units.
    pub pending_rewards: f64,
    /// Whole units eligible for the next payout.
    pub next_reward_amount: u64,
}

impl AccountInfo {
    /// The zero record used when no account can be fetched for `address`.
    pub fn empty(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

/// Errors that can occur while estimating rewards.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RewardsError {
    #[error("account {address} is not eligible for rewards")]
    NotParticipating { address: String },

    #[error("unknown account status: {0}")]
    UnknownStatus(String),
}
