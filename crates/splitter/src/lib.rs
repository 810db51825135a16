//! TriSplit donation splitter
//!
//! Accrues donation shares minted by a yield vault and settles them across
//! three recipients under an epoch-versioned, governance-controlled policy.
//!
//! ## Key Invariants
//! - Policies can only be written for epochs strictly after the current one
//! - The current epoch only moves forward
//! - Every settlement pays out exactly the assets it redeemed
//! - A failed settlement leaves pending shares, balances and the log untouched

pub mod asset_ledger;
pub mod auth;
pub mod config;
pub mod epoch;
pub mod errors;
pub mod history;
pub mod policy_store;
pub mod settlement;
pub mod splitter;
pub mod vault;

pub use asset_ledger::{AssetLedger, InMemoryAssetLedger, MockAssetLedger, TransferError};
pub use auth::{AuthorityProvider, Role, StaticAuthority};
pub use config::{ConfigError, SplitterConfig, StorageBackend};
pub use errors::{ErrorKind, Result, SplitterError};
pub use history::SettlementStatistics;
pub use settlement::DistributionOutcome;
pub use splitter::DonationSplitter;
pub use vault::{InMemoryVault, MockVault, Redemption, ShareVault, VaultError};
