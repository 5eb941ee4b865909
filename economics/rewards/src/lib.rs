pub mod display;
pub mod estimator;
pub mod types;

pub use estimator::{estimate, estimate_account, estimate_round, RewardEstimate};
pub use types::*;
