pub mod config;
pub mod types;

pub use config::{WatchConfig, DEFAULT_ADDRESS};
pub use types::*;
