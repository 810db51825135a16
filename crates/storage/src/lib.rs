//! Persistent state for the donation splitter.
//!
//! The layout is deliberately small: one current-epoch cell, a map from epoch
//! number to policy, one pending-shares cell, and an append-only log of
//! settlement records. Backends must make `add_pending_shares` and
//! `take_pending_shares` individually atomic; everything else is plain
//! read/write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trisplit_types::{Epoch, EpochPolicy, SettlementRecord};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::{SledStore, DEFAULT_FLUSH_EVERY_MS};

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store has not been initialized with a genesis epoch")]
    Uninitialized,
    #[error("Pending share balance would overflow")]
    PendingOverflow,
    #[error("Settlement record {sequence} conflicts with the log (expected {expected})")]
    SequenceConflict { sequence: u64, expected: u64 },
    #[error("Corrupt value under {key}")]
    Corrupt { key: String },
    #[error("Snapshot import requires an empty store ({0})")]
    NotEmpty(&'static str),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Abstract storage trait
pub trait SplitterStore: Send + Sync {
    /// Write the genesis epoch if the store is fresh. Returns `true` when the
    /// store was initialized by this call.
    fn initialize(&self, genesis_epoch: Epoch) -> Result<bool>;

    fn current_epoch(&self) -> Result<Epoch>;
    fn set_current_epoch(&self, epoch: Epoch) -> Result<()>;

    fn get_policy(&self, epoch: Epoch) -> Result<Option<EpochPolicy>>;
    fn put_policy(&self, epoch: Epoch, policy: &EpochPolicy) -> Result<()>;
    /// All epochs with a stored policy, ascending.
    fn policy_epochs(&self) -> Result<Vec<Epoch>>;

    fn pending_shares(&self) -> Result<u128>;
    /// Atomically add to the pending balance, returning the new balance.
    fn add_pending_shares(&self, amount: u128) -> Result<u128>;
    /// Atomically read the pending balance and reset it to zero.
    fn take_pending_shares(&self) -> Result<u128>;

    /// Append a record; `record.sequence` must equal the current log length.
    fn append_record(&self, record: &SettlementRecord) -> Result<()>;
    fn record_count(&self) -> Result<u64>;
    fn get_record(&self, sequence: u64) -> Result<Option<SettlementRecord>>;
    fn records(&self) -> Result<Vec<SettlementRecord>>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Point-in-time copy of the whole store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub current_epoch: Epoch,
    pub policies: BTreeMap<Epoch, EpochPolicy>,
    /// Decimal string so JSON consumers do not lose u128 precision
    #[serde(with = "u128_string")]
    pub pending_shares: u128,
    pub records: Vec<SettlementRecord>,
}

/// Copy every cell of `store` into a snapshot
pub fn export_snapshot(store: &dyn SplitterStore) -> Result<StoreSnapshot> {
    let mut policies = BTreeMap::new();
    for epoch in store.policy_epochs()? {
        if let Some(policy) = store.get_policy(epoch)? {
            policies.insert(epoch, policy);
        }
    }

    Ok(StoreSnapshot {
        current_epoch: store.current_epoch()?,
        policies,
        pending_shares: store.pending_shares()?,
        records: store.records()?,
    })
}

/// Load a snapshot into an empty store.
///
/// Every precondition is checked before the first write: the target must
/// hold no policies, records or pending shares, and the snapshot's record
/// log must be gapless. The genesis write then claims the store, so a store
/// that already has an epoch is refused without being touched.
pub fn import_snapshot(store: &dyn SplitterStore, snapshot: &StoreSnapshot) -> Result<()> {
    if !store.policy_epochs()?.is_empty() {
        return Err(StorageError::NotEmpty("policies present"));
    }
    if store.record_count()? != 0 {
        return Err(StorageError::NotEmpty("settlement records present"));
    }
    if store.pending_shares()? != 0 {
        return Err(StorageError::NotEmpty("pending shares present"));
    }
    for (expected, record) in snapshot.records.iter().enumerate() {
        if record.sequence != expected as u64 {
            return Err(StorageError::SequenceConflict {
                sequence: record.sequence,
                expected: expected as u64,
            });
        }
    }

    if !store.initialize(snapshot.current_epoch)? {
        return Err(StorageError::NotEmpty("epoch already initialized"));
    }
    for (epoch, policy) in &snapshot.policies {
        store.put_policy(*epoch, policy)?;
    }
    if snapshot.pending_shares > 0 {
        store.add_pending_shares(snapshot.pending_shares)?;
    }
    for record in &snapshot.records {
        store.append_record(record)?;
    }
    store.flush()?;

    tracing::info!(
        target: "storage",
        epoch = snapshot.current_epoch,
        policies = snapshot.policies.len(),
        records = snapshot.records.len(),
        pending = %snapshot.pending_shares,
        "Imported splitter snapshot"
    );
    Ok(())
}

mod u128_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
