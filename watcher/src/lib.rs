pub mod retry;
pub mod tracker;
pub mod watcher;

pub use retry::RetryPolicy;
pub use tracker::{RewardSnapshot, RewardTracker, RoundData, TrackerState};
pub use watcher::{handler_fn, FnHandler, RoundHandler, RoundWatcher, WatchError, WatchHandle};
