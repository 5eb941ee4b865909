use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rwatch_rewards::{estimate, AccountInfo, AccountSnapshot, RoundInfo};
use rwatch_rpc::{BlockRewards, ClientError, LedgerClient, SupplyResponse};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::watcher::{RoundHandler, RoundWatcher, WatchHandle};

/// Both reward records for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardSnapshot {
    /// Protocol-wide figures for the round.
    pub round: RoundInfo,
    /// Figures for the tracked address.
    pub account: AccountInfo,
    /// When the snapshot was computed.
    pub observed_at: DateTime<Utc>,
}

/// What the presentation layer should show. Each tick replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackerState {
    /// No round processed yet.
    Starting { address: String },
    Ready(RewardSnapshot),
    /// The account does not participate in rewards. Round figures are
    /// current; no account figures are shown.
    Ineligible {
        round: RoundInfo,
        address: String,
        reason: String,
        observed_at: DateTime<Utc>,
    },
    /// Fetching data for `round` failed after retries. `last` is the most
    /// recent good snapshot, kept for reference only.
    Degraded {
        round: u64,
        error: String,
        last: Option<RewardSnapshot>,
    },
}

impl TrackerState {
    /// The round this state describes, if any.
    pub fn round(&self) -> Option<u64> {
        match self {
            TrackerState::Starting { .. } => None,
            TrackerState::Ready(snapshot) => Some(snapshot.round.round),
            TrackerState::Ineligible { round, .. } => Some(round.round),
            TrackerState::Degraded { round, .. } => Some(*round),
        }
    }

    fn last_good(&self) -> Option<RewardSnapshot> {
        match self {
            TrackerState::Ready(snapshot) => Some(snapshot.clone()),
            TrackerState::Degraded { last, .. } => last.clone(),
            _ => None,
        }
    }
}

/// Raw node data gathered for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundData {
    /// Ledger-wide supply at fetch time.
    pub supply: SupplyResponse,
    /// Reward parameters of the round's block.
    pub block: BlockRewards,
    /// `None` when the address failed validation and was not fetched.
    pub account: Option<AccountSnapshot>,
}

/// Fetches, estimates and publishes reward figures for one address.
pub struct RewardTracker {
    client: Arc<dyn LedgerClient>,
    address: String,
    retry: RetryPolicy,
    state_tx: watch::Sender<TrackerState>,
}

impl RewardTracker {
    pub fn new(client: Arc<dyn LedgerClient>, address: impl Into<String>) -> Self {
        let address = address.into();
        let (state_tx, _) = watch::channel(TrackerState::Starting {
            address: address.clone(),
        });
        Self {
            client,
            address,
            retry: RetryPolicy::default(),
            state_tx,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// A receiver that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state_tx.subscribe()
    }

    /// The most recently published state.
    pub fn state(&self) -> TrackerState {
        self.state_tx.borrow().clone()
    }

    /// Start a round watch that feeds this tracker. The returned receiver
    /// follows the tracker's state.
    pub fn spawn(self) -> (WatchHandle, watch::Receiver<TrackerState>) {
        let states = self.subscribe();
        let watcher = RoundWatcher::new(self.client.clone()).with_retry(self.retry);
        (watcher.spawn(self), states)
    }

    /// Fetch supply, block and account concurrently. Any failure fails the
    /// whole fetch.
    pub async fn fetch(&self, round: u64) -> Result<RoundData, ClientError> {
        let client = self.client.as_ref();
        let address = self.address.as_str();
        let valid = client.is_valid_address(address);
        if !valid {
            debug!(address, "address failed validation, skipping account fetch");
        }

        let account = async {
            if valid {
                client.account(address).await.map(|a| Some(a.snapshot()))
            } else {
                Ok(None)
            }
        };

        let (supply, block, account) =
            tokio::try_join!(client.supply(), client.block(round), account)?;

        Ok(RoundData {
            supply,
            block,
            account,
        })
    }

    /// Turn fetched data into the state to publish.
    pub fn evaluate(&self, round: u64, data: &RoundData) -> TrackerState {
        let est = estimate(
            round,
            data.supply.total_money,
            data.block.reward_rate,
            data.block.reward_residue,
            &self.address,
            data.account.as_ref(),
        );
        let observed_at = Utc::now();

        match est.account {
            Ok(account) => TrackerState::Ready(RewardSnapshot {
                round: est.round,
                account,
                observed_at,
            }),
            Err(e) => TrackerState::Ineligible {
                round: est.round,
                address: self.address.clone(),
                reason: e.to_string(),
                observed_at,
            },
        }
    }

    /// Process one round: fetch with retries, estimate, publish. Returns the
    /// published state.
    pub async fn tick(&self, round: u64) -> TrackerState {
        let state = match self.retry.run("fetch round data", || self.fetch(round)).await {
            Ok(data) => self.evaluate(round, &data),
            Err(e) => {
                warn!(round, error = %e, "giving up on round data");
                let last = self.state_tx.borrow().last_good();
                TrackerState::Degraded {
                    round,
                    error: e.to_string(),
                    last,
                }
            }
        };

        match &state {
            TrackerState::Ready(snapshot) => info!(
                round,
                rounds_until_payout = ?snapshot.round.estimated_rounds_until_payout,
                next_reward_amount = snapshot.account.next_reward_amount,
                "rewards updated"
            ),
            TrackerState::Ineligible { reason, .. } => warn!(round, reason = %reason, "account ineligible"),
            _ => {}
        }

        self.state_tx.send_replace(state.clone());
        state
    }
}

#[async_trait]
impl RoundHandler for RewardTracker {
    async fn on_round(&self, round: u64) {
        self.tick(round).await;
    }
}

impl std::fmt::Debug for RewardTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardTracker")
            .field("address", &self.address)
            .field("retry", &self.retry)
            .field("round", &self.state_tx.borrow().round())
            .finish()
    }
}
