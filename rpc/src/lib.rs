pub mod address;
pub mod algod;
pub mod client;
pub mod mock;
pub mod types;

pub use address::{is_valid_address, Address, AddressError};
pub use algod::{AlgodClient, AlgodConfig, DEFAULT_NODE_URL};
pub use client::{ClientError, LedgerClient};
pub use mock::{MockLedger, MockOp};
pub use types::*;
