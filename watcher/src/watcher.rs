use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rwatch_rpc::LedgerClient;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Receives every newly observed round, in order.
#[async_trait]
pub trait RoundHandler: Send + Sync {
    async fn on_round(&self, round: u64);
}

/// Adapter turning an async closure into a [`RoundHandler`].
pub struct FnHandler<F>(F);

/// Wrap `f` so it can be passed to [`RoundWatcher::spawn`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(u64) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> RoundHandler for FnHandler<F>
where
    F: Fn(u64) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn on_round(&self, round: u64) {
        (self.0)(round).await
    }
}

/// Polls a ledger node and reports each committed round to a handler.
///
/// The watcher asks the node for its latest round once, then alternates
/// between invoking the handler for round R and waiting for round R + 1 to be
/// committed. The handler is awaited before the next wait begins, so a slow
/// tick makes the watcher catch up one round at a time and two handlers never
/// run at once.
///
/// Holds no account state; to watch a different node, cancel this watch and
/// start another.
pub struct RoundWatcher {
    client: Arc<dyn LedgerClient>,
    retry: RetryPolicy,
}

impl RoundWatcher {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Backoff used for status calls. Attempt limits are ignored: the watch
    /// keeps retrying until it is cancelled.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Start watching on a new task.
    pub fn spawn<H>(self, handler: H) -> WatchHandle
    where
        H: RoundHandler + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(handler, cancel_rx));
        WatchHandle { cancel_tx, task }
    }

    /// Drive the loop on the current task until `cancel` flips to `true` or
    /// its sender is dropped.
    pub async fn run<H: RoundHandler>(self, handler: H, mut cancel: watch::Receiver<bool>) {
        let retry = self.retry.unbounded();
        info!("round watcher starting");

        let initial = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                info!("round watcher cancelled before first round");
                return;
            }
            result = retry.run("fetch node status", || self.client.status()) => result,
        };
        let mut round = match initial {
            Ok(status) => status.last_round,
            Err(e) => {
                error!(error = %e, "could not read node status");
                return;
            }
        };
        info!(round, "initial round");

        loop {
            // A client that is always ready never suspends, so give the
            // runtime (and a pending cancel) a chance to run every round.
            tokio::task::yield_now().await;
            if *cancel.borrow() {
                break;
            }

            handler.on_round(round).await;
            round += 1;

            let waited = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => break,
                result = retry.run("wait for round", || self.client.wait_for_round(round)) => result,
            };
            match waited {
                Ok(status) => debug!(round, last_round = status.last_round, "round committed"),
                Err(e) => {
                    error!(round, error = %e, "could not wait for round");
                    break;
                }
            }
        }

        info!(next_round = round, "round watcher stopped");
    }
}

/// Resolves once cancellation is requested or the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

/// Controls a running watch. Dropping the handle cancels the watch.
#[derive(Debug)]
pub struct WatchHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Request cancellation. No handler call starts after the watcher
    /// observes the request; an in-flight handler call runs to completion.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watch to end without cancelling it.
    pub async fn join(self) -> Result<(), WatchError> {
        let WatchHandle { cancel_tx, task } = self;
        let result = task.await;
        drop(cancel_tx);
        Ok(result?)
    }

    /// Cancel and wait for the watch to end.
    pub async fn shutdown(self) -> Result<(), WatchError> {
        self.cancel();
        self.join().await
    }
}
