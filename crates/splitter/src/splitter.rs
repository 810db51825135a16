//! Donation splitter engine
//!
//! [`DonationSplitter`] ties the persisted state (epoch counter, policy map,
//! pending shares, settlement log) to the role checks. Operations are split
//! by concern across `policy_store`, `epoch`, `settlement` and `history`;
//! all of them take `&self`.
//!
//! ## Locking
//! - `governance` serializes the "epoch is in the future" check with the
//!   write that depends on it (`set_policy`, `advance_epoch`), and is taken
//!   briefly when a settlement snapshots the current epoch and its policy.
//! - `commit` serializes sequence assignment with the record append.
//!
//! Neither lock is ever held across a vault or ledger call; the pending
//! balance is debited with a single atomic take, so a re-entrant settlement
//! observes zero pending shares.

use crate::auth::AuthorityProvider;
use crate::errors::Result;
use parking_lot::Mutex;
use tracing::info;
use trisplit_storage::{MemoryStore, SplitterStore};
use trisplit_types::{Epoch, EpochPolicy};

pub struct DonationSplitter {
    pub(crate) store: Box<dyn SplitterStore>,
    pub(crate) authority: Box<dyn AuthorityProvider>,
    pub(crate) governance: Mutex<()>,
    pub(crate) commit: Mutex<()>,
}

impl DonationSplitter {
    /// Open a splitter over `store`.
    ///
    /// A fresh store is initialized at `genesis_epoch` and, when given,
    /// `genesis_policy` is installed for that epoch. This is the only policy
    /// write that may target the current epoch. A store that already holds
    /// state keeps its epoch and policies; the genesis arguments are ignored.
    pub fn new(
        store: Box<dyn SplitterStore>,
        authority: Box<dyn AuthorityProvider>,
        genesis_epoch: Epoch,
        genesis_policy: Option<EpochPolicy>,
    ) -> Result<Self> {
        if let Some(policy) = &genesis_policy {
            policy.validate()?;
        }

        if store.initialize(genesis_epoch)? {
            if let Some(policy) = &genesis_policy {
                store.put_policy(genesis_epoch, policy)?;
            }
            info!(
                target: "splitter",
                epoch = genesis_epoch,
                genesis_policy = genesis_policy.is_some(),
                "Splitter initialized at genesis"
            );
        } else {
            info!(
                target: "splitter",
                epoch = store.current_epoch()?,
                pending = store.pending_shares()?,
                records = store.record_count()?,
                "Splitter resumed from existing state"
            );
        }

        Ok(Self {
            store,
            authority,
            governance: Mutex::new(()),
            commit: Mutex::new(()),
        })
    }

    /// Splitter over a fresh [`MemoryStore`].
    pub fn in_memory(
        authority: Box<dyn AuthorityProvider>,
        genesis_epoch: Epoch,
        genesis_policy: Option<EpochPolicy>,
    ) -> Result<Self> {
        Self::new(
            Box::new(MemoryStore::new()),
            authority,
            genesis_epoch,
            genesis_policy,
        )
    }

    /// Read access to the backing store (snapshots, status output).
    pub fn store(&self) -> &dyn SplitterStore {
        self.store.as_ref()
    }

    pub fn authority(&self) -> &dyn AuthorityProvider {
        self.authority.as_ref()
    }

    /// Flush the backing store to durable storage.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for DonationSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DonationSplitter")
            .field("current_epoch", &self.store.current_epoch().ok())
            .field("pending_shares", &self.store.pending_shares().ok())
            .field("records", &self.store.record_count().ok())
            .finish()
    }
}
