use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rwatch_rewards::AccountStatus;
use tokio::sync::watch;

use crate::client::{ClientError, LedgerClient};
use crate::types::*;

/// Which node operation an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Status,
    WaitForRound,
    Supply,
    Block,
    Account,
}

#[derive(Debug, Default)]
struct MockState {
    total_money: u64,
    default_block: BlockRewards,
    blocks: HashMap<u64, BlockRewards>,
    accounts: HashMap<String, AccountResponse>,
    failures: HashMap<MockOp, u32>,
    calls: HashMap<MockOp, usize>,
    block_requests: Vec<u64>,
}

/// A scriptable in-memory ledger node for tests and offline runs.
///
/// The committed round lives in a `watch` channel so `wait_for_round` can
/// suspend until a test advances the chain. With auto-advance enabled every
/// wait commits the requested round immediately.
pub struct MockLedger {
    round_tx: watch::Sender<u64>,
    state: Mutex<MockState>,
    auto_advance: AtomicBool,
    in_flight_waits: AtomicUsize,
}

impl MockLedger {
    /// A node sitting at `last_round` with no supply and no accounts.
    pub fn new(last_round: u64) -> Self {
        let (round_tx, _) = watch::channel(last_round);
        Self {
            round_tx,
            state: Mutex::new(MockState::default()),
            auto_advance: AtomicBool::new(false),
            in_flight_waits: AtomicUsize::new(0),
        }
    }

    /// A node that commits any round as soon as it is waited on.
    pub fn auto_advancing(last_round: u64) -> Self {
        let ledger = Self::new(last_round);
        ledger.set_auto_advance(true);
        ledger
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        self.auto_advance.store(enabled, Ordering::SeqCst);
    }

    pub fn last_round(&self) -> u64 {
        *self.round_tx.borrow()
    }

    /// Commit the next round.
    pub fn advance_round(&self) -> u64 {
        let mut next = 0;
        self.round_tx.send_modify(|r| {
            *r += 1;
            next = *r;
        });
        next
    }

    /// Commit every round up to and including `round`.
    pub fn set_round(&self, round: u64) {
        self.round_tx.send_if_modified(|r| {
            if *r < round {
                *r = round;
                true
            } else {
                false
            }
        });
    }

    pub fn set_total_money(&self, total_money: u64) {
        self.state.lock().total_money = total_money;
    }

    /// Reward parameters returned for every block without an override.
    pub fn set_reward_params(&self, rate: u64, residue: u64) {
        let mut state = self.state.lock();
        state.default_block.reward_rate = rate;
        state.default_block.reward_residue = residue;
    }

    /// Reward parameters for one specific block.
    pub fn set_block(&self, round: u64, rate: u64, residue: u64) {
        self.state.lock().blocks.insert(
            round,
            BlockRewards {
                round,
                reward_rate: rate,
                reward_residue: residue,
            },
        );
    }

    pub fn set_account(
        &self,
        address: &str,
        balance_without_rewards: u64,
        pending_rewards: u64,
        status: AccountStatus,
    ) {
        self.state.lock().accounts.insert(
            address.to_string(),
            AccountResponse {
                address: address.to_string(),
                amount: balance_without_rewards + pending_rewards,
                amount_without_pending_rewards: balance_without_rewards,
                pending_rewards,
                status,
            },
        );
    }

    /// Make the next `times` calls of `op` fail with a transport error.
    pub fn fail_next(&self, op: MockOp, times: u32) {
        *self.state.lock().failures.entry(op).or_insert(0) += times;
    }

    /// How many times `op` has been called, including failed calls.
    pub fn calls(&self, op: MockOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Rounds passed to `block`, in call order.
    pub fn block_requests(&self) -> Vec<u64> {
        self.state.lock().block_requests.clone()
    }

    /// Number of `wait_for_round` calls currently suspended.
    pub fn waiting(&self) -> usize {
        self.in_flight_waits.load(Ordering::SeqCst)
    }

    fn record(&self, op: MockOp) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        match state.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ClientError::Unavailable(format!("injected {op:?} failure")))
            }
            _ => Ok(()),
        }
    }
}

/// Counts a suspended wait for as long as its future is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn status(&self) -> Result<NodeStatus, ClientError> {
        self.record(MockOp::Status)?;
        Ok(NodeStatus {
            last_round: self.last_round(),
        })
    }

    async fn wait_for_round(&self, round: u64) -> Result<NodeStatus, ClientError> {
        self.record(MockOp::WaitForRound)?;
        if self.auto_advance.load(Ordering::SeqCst) {
            self.set_round(round);
            // Behave like a network call and suspend at least once.
            tokio::task::yield_now().await;
        }

        let mut rx = self.round_tx.subscribe();
        let _waiting = InFlight::enter(&self.in_flight_waits);
        loop {
            let current = *rx.borrow_and_update();
            if current >= round {
                return Ok(NodeStatus {
                    last_round: current,
                });
            }
            if rx.changed().await.is_err() {
                return Err(ClientError::Unavailable("mock node dropped".to_string()));
            }
        }
    }

    async fn supply(&self) -> Result<SupplyResponse, ClientError> {
        self.record(MockOp::Supply)?;
        Ok(SupplyResponse {
            current_round: self.last_round(),
            online_money: 0,
            total_money: self.state.lock().total_money,
        })
    }

    async fn block(&self, round: u64) -> Result<BlockRewards, ClientError> {
        self.record(MockOp::Block)?;
        let mut state = self.state.lock();
        state.block_requests.push(round);
        let block = state.blocks.get(&round).copied().unwrap_or(BlockRewards {
            round,
            ..state.default_block
        });
        Ok(block)
    }

    async fn account(&self, address: &str) -> Result<AccountResponse, ClientError> {
        self.record(MockOp::Account)?;
        self.state
            .lock()
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                status: 404,
                message: format!("account {address} not found"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn status_reports_current_round() {
        let ledger = MockLedger::new(41);
        assert_eq!(ledger.status().await.unwrap().last_round, 41);
        assert_eq!(ledger.advance_round(), 42);
        assert_eq!(ledger.status().await.unwrap().last_round, 42);
        assert_eq!(ledger.calls(MockOp::Status), 2);
    }

    #[tokio::test]
    async fn wait_for_committed_round_returns_immediately() {
        let ledger = MockLedger::new(10);
        let status = ledger.wait_for_round(7).await.unwrap();
        assert_eq!(status.last_round, 10);
    }

    #[tokio::test]
    async fn wait_suspends_until_round_is_committed() {
        let ledger = Arc::new(MockLedger::new(10));
        let waiter = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.wait_for_round(12).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        ledger.advance_round();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        ledger.advance_round();
        let status = waiter.await.unwrap().unwrap();
        assert_eq!(status.last_round, 12);
    }

    #[tokio::test]
    async fn auto_advance_commits_waited_round() {
        let ledger = MockLedger::auto_advancing(3);
        let status = ledger.wait_for_round(4).await.unwrap();
        assert_eq!(status.last_round, 4);
        assert_eq!(ledger.last_round(), 4);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let ledger = MockLedger::new(0);
        ledger.set_total_money(5);
        ledger.fail_next(MockOp::Supply, 2);
        assert!(ledger.supply().await.is_err());
        assert!(ledger.supply().await.is_err());
        assert_eq!(ledger.supply().await.unwrap().total_money, 5);
        assert_eq!(ledger.calls(MockOp::Supply), 3);
    }

    #[tokio::test]
    async fn block_overrides_and_defaults() {
        let ledger = MockLedger::new(0);
        ledger.set_reward_params(10, 3);
        ledger.set_block(9, 20, 1);

        let default = ledger.block(8).await.unwrap();
        assert_eq!((default.round, default.reward_rate, default.reward_residue), (8, 10, 3));
        let overridden = ledger.block(9).await.unwrap();
        assert_eq!((overridden.reward_rate, overridden.reward_residue), (20, 1));
        assert_eq!(ledger.block_requests(), vec![8, 9]);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let ledger = MockLedger::new(0);
        let err = ledger.account("missing").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
    }
}
