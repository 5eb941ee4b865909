//! End-to-end flows: a live watch over the mock node, feeding the reward
//! tracker, observed through its state channel.

use std::sync::Arc;
use std::time::Duration;

use rwatch_rewards::AccountStatus;
use rwatch_rpc::{Address, MockLedger, MockOp};
use rwatch_watcher::{RetryPolicy, RewardTracker, TrackerState};
use tokio::sync::watch;

const ADDR: &str = "YX5KZSZT27L7WZAW7TNONVDZHQQAURJKT4BPRS364KTH2DGMEKLLFOPK3U";

fn funded_ledger(last_round: u64) -> Arc<MockLedger> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rwatch_watcher=debug")
        .with_test_writer()
        .try_init();

    let ledger = MockLedger::new(last_round);
    ledger.set_total_money(10_000_000_000_000);
    ledger.set_reward_params(10, 3);
    ledger.set_account(ADDR, 5_000_000, 1_234, AccountStatus::Online);
    Arc::new(ledger)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: Some(2),
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        jitter: Duration::ZERO,
    }
}

/// Wait until the published state satisfies `pred`.
async fn next_matching(
    rx: &mut watch::Receiver<TrackerState>,
    pred: impl Fn(&TrackerState) -> bool,
) -> TrackerState {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| pred(s)))
        .await
        .expect("state not published in time")
        .expect("tracker dropped")
        .clone()
}

// ---------------------------------------------------------------------------
// Live watch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watch_publishes_each_round() {
    let ledger = funded_ledger(500);
    let (handle, mut states) = RewardTracker::new(ledger.clone(), ADDR)
        .with_retry(fast_retry())
        .spawn();

    let first = next_matching(&mut states, |s| s.round() == Some(500)).await;
    let TrackerState::Ready(snapshot) = first else {
        panic!("expected ready state, got {first:?}");
    };
    assert_eq!(snapshot.account.address, ADDR);
    assert_eq!(snapshot.account.earned_rewards, 1_234);
    assert_eq!(snapshot.round.estimated_rounds_until_payout, Some(999_999));

    ledger.set_block(501, 20, 0);
    ledger.advance_round();
    let second = next_matching(&mut states, |s| s.round() == Some(501)).await;
    let TrackerState::Ready(snapshot) = second else {
        panic!("expected ready state, got {second:?}");
    };
    assert_eq!(snapshot.round.reward_rate, 20);
    // (10_000_000 - 0 - 20) / 20 = 499_999
    assert_eq!(snapshot.round.estimated_rounds_until_payout, Some(499_999));

    handle.shutdown().await.unwrap();
    assert_eq!(ledger.block_requests(), vec![500, 501]);
}

#[tokio::test]
async fn watch_survives_transport_failures() {
    let ledger = funded_ledger(10);
    ledger.fail_next(MockOp::Supply, 2);
    let (handle, mut states) = RewardTracker::new(ledger.clone(), ADDR)
        .with_retry(fast_retry())
        .spawn();

    let degraded = next_matching(&mut states, |s| s.round() == Some(10)).await;
    assert!(matches!(degraded, TrackerState::Degraded { round: 10, .. }));

    ledger.advance_round();
    let recovered = next_matching(&mut states, |s| s.round() == Some(11)).await;
    assert!(matches!(recovered, TrackerState::Ready(_)));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn account_leaving_participation_shows_error_state() {
    let ledger = funded_ledger(1);
    let (handle, mut states) = RewardTracker::new(ledger.clone(), ADDR)
        .with_retry(fast_retry())
        .spawn();

    next_matching(&mut states, |s| matches!(s, TrackerState::Ready(_))).await;

    ledger.set_account(ADDR, 5_000_000, 0, AccountStatus::NotParticipating);
    ledger.advance_round();
    let state = next_matching(&mut states, |s| s.round() == Some(2)).await;
    match state {
        TrackerState::Ineligible { round, reason, .. } => {
            assert_eq!(round.round, 2);
            assert!(reason.contains("not eligible"));
        }
        other => panic!("expected ineligible state, got {other:?}"),
    }

    handle.shutdown().await.unwrap();
}

// ---------------------------------------------------------------------------
// Address changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn changing_address_restarts_the_watch() {
    let ledger = funded_ledger(42);
    let second = Address([3u8; 32]).encode();
    ledger.set_account(&second, 9_000_000, 0, AccountStatus::Offline);

    let (first_handle, mut first_states) = RewardTracker::new(ledger.clone(), ADDR)
        .with_retry(fast_retry())
        .spawn();
    next_matching(&mut first_states, |s| s.round() == Some(42)).await;
    first_handle.shutdown().await.unwrap();

    let (second_handle, mut second_states) = RewardTracker::new(ledger.clone(), second.clone())
        .with_retry(fast_retry())
        .spawn();
    let state = next_matching(&mut second_states, |s| s.round() == Some(42)).await;
    let TrackerState::Ready(snapshot) = state else {
        panic!("expected ready state");
    };
    assert_eq!(snapshot.account.address, second);
    assert_eq!(snapshot.account.next_reward_amount, 9);

    // The cancelled watch publishes nothing further.
    ledger.advance_round();
    next_matching(&mut second_states, |s| s.round() == Some(43)).await;
    assert_eq!(first_states.borrow().round(), Some(42));

    second_handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_address_never_fetches_account() {
    let ledger = funded_ledger(5);
    let (handle, mut states) = RewardTracker::new(ledger.clone(), "hello")
        .with_retry(fast_retry())
        .spawn();

    let state = next_matching(&mut states, |s| s.round() == Some(5)).await;
    let TrackerState::Ready(snapshot) = state else {
        panic!("expected ready state");
    };
    assert_eq!(snapshot.account.address, "hello");
    assert_eq!(snapshot.account.next_reward_amount, 0);
    assert_eq!(ledger.calls(MockOp::Account), 0);

    handle.shutdown().await.unwrap();
}
