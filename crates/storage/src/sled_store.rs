//! Sled-backed implementation.
//!
//! Trees:
//! - `meta`: `current_epoch` (u64 BE) and `pending_shares` (u128 BE)
//! - `policies`: epoch (u64 BE) → JSON `EpochPolicy`
//! - `records`: sequence (u64 BE) → JSON `SettlementRecord`
//!
//! Big-endian keys keep sled's lexicographic iteration in numeric order.

use crate::{Result, SplitterStore, StorageError};
use sled::{Db, Tree};
use std::path::Path;
use trisplit_types::{Epoch, EpochPolicy, SettlementRecord};

const CURRENT_EPOCH_KEY: &[u8] = b"current_epoch";
const PENDING_SHARES_KEY: &[u8] = b"pending_shares";

pub struct SledStore {
    db: Db,
    meta: Tree,
    policies: Tree,
    records: Tree,
}

/// Background flush interval sled uses when none is configured
pub const DEFAULT_FLUSH_EVERY_MS: u64 = 500;

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_flush_interval(path, Some(DEFAULT_FLUSH_EVERY_MS))
    }

    /// Open with an explicit background flush interval. `None` disables the
    /// flusher thread, so dropping the store releases the file lock at once;
    /// callers then persist through [`SplitterStore::flush`].
    pub fn open_with_flush_interval<P: AsRef<Path>>(
        path: P,
        flush_every_ms: Option<u64>,
    ) -> Result<Self> {
        Self::open_with_config(
            sled::Config::new()
                .path(path)
                .flush_every_ms(flush_every_ms),
        )
    }

    pub fn open_with_config(config: sled::Config) -> Result<Self> {
        let db = config.open()?;
        let meta = db.open_tree("meta")?;
        let policies = db.open_tree("policies")?;
        let records = db.open_tree("records")?;
        Ok(Self {
            db,
            meta,
            policies,
            records,
        })
    }

    /// Temporary database that is removed on drop, for tests and dry runs.
    pub fn temporary() -> Result<Self> {
        Self::open_with_config(sled::Config::new().temporary(true))
    }
}

fn decode_u64(key: &str, bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| StorageError::Corrupt {
        key: key.to_string(),
    })?;
    Ok(u64::from_be_bytes(raw))
}

fn decode_u128(bytes: &[u8]) -> Option<u128> {
    let raw: [u8; 16] = bytes.try_into().ok()?;
    Some(u128::from_be_bytes(raw))
}

fn pending_corrupt() -> StorageError {
    StorageError::Corrupt {
        key: "pending_shares".to_string(),
    }
}

impl SplitterStore for SledStore {
    fn initialize(&self, genesis_epoch: Epoch) -> Result<bool> {
        let swapped = self.meta.compare_and_swap(
            CURRENT_EPOCH_KEY,
            None as Option<&[u8]>,
            Some(&genesis_epoch.to_be_bytes()[..]),
        )?;
        let fresh = swapped.is_ok();
        if fresh {
            tracing::info!(target: "storage", epoch = genesis_epoch, "Initialized splitter store");
        }
        Ok(fresh)
    }

    fn current_epoch(&self) -> Result<Epoch> {
        let value = self
            .meta
            .get(CURRENT_EPOCH_KEY)?
            .ok_or(StorageError::Uninitialized)?;
        decode_u64("current_epoch", &value)
    }

    fn set_current_epoch(&self, epoch: Epoch) -> Result<()> {
        self.meta
            .insert(CURRENT_EPOCH_KEY, &epoch.to_be_bytes()[..])?;
        Ok(())
    }

    fn get_policy(&self, epoch: Epoch) -> Result<Option<EpochPolicy>> {
        self.policies
            .get(epoch.to_be_bytes())?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn put_policy(&self, epoch: Epoch, policy: &EpochPolicy) -> Result<()> {
        let data = serde_json::to_vec(policy)?;
        self.policies.insert(epoch.to_be_bytes(), data)?;
        Ok(())
    }

    fn policy_epochs(&self) -> Result<Vec<Epoch>> {
        let mut epochs = Vec::new();
        for key in self.policies.iter().keys() {
            epochs.push(decode_u64("policies", &key?)?);
        }
        Ok(epochs)
    }

    fn pending_shares(&self) -> Result<u128> {
        match self.meta.get(PENDING_SHARES_KEY)? {
            Some(v) => decode_u128(&v).ok_or_else(pending_corrupt),
            None => Ok(0),
        }
    }

    fn add_pending_shares(&self, amount: u128) -> Result<u128> {
        let mut overflow = false;
        let mut corrupt = false;
        let updated = self.meta.update_and_fetch(PENDING_SHARES_KEY, |old| {
            overflow = false;
            corrupt = false;
            let current = match old {
                Some(bytes) => match decode_u128(bytes) {
                    Some(v) => v,
                    None => {
                        corrupt = true;
                        return Some(bytes.to_vec());
                    }
                },
                None => 0,
            };
            match current.checked_add(amount) {
                Some(next) => Some(next.to_be_bytes().to_vec()),
                None => {
                    overflow = true;
                    Some(current.to_be_bytes().to_vec())
                }
            }
        })?;

        if corrupt {
            return Err(pending_corrupt());
        }
        if overflow {
            return Err(StorageError::PendingOverflow);
        }
        updated
            .as_deref()
            .and_then(decode_u128)
            .ok_or_else(pending_corrupt)
    }

    fn take_pending_shares(&self) -> Result<u128> {
        let previous = self
            .meta
            .fetch_and_update(PENDING_SHARES_KEY, |old| {
                old.map(|_| 0u128.to_be_bytes().to_vec())
            })?;
        match previous {
            Some(bytes) => decode_u128(&bytes).ok_or_else(pending_corrupt),
            None => Ok(0),
        }
    }

    fn append_record(&self, record: &SettlementRecord) -> Result<()> {
        let expected = self.record_count()?;
        if record.sequence != expected {
            return Err(StorageError::SequenceConflict {
                sequence: record.sequence,
                expected,
            });
        }
        let data = serde_json::to_vec(record)?;
        let swapped = self.records.compare_and_swap(
            record.sequence.to_be_bytes(),
            None as Option<&[u8]>,
            Some(data),
        )?;
        if swapped.is_err() {
            return Err(StorageError::SequenceConflict {
                sequence: record.sequence,
                expected: self.record_count()?,
            });
        }
        Ok(())
    }

    fn record_count(&self) -> Result<u64> {
        match self.records.last()? {
            Some((key, _)) => Ok(decode_u64("records", &key)? + 1),
            None => Ok(0),
        }
    }

    fn get_record(&self, sequence: u64) -> Result<Option<SettlementRecord>> {
        self.records
            .get(sequence.to_be_bytes())?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn records(&self) -> Result<Vec<SettlementRecord>> {
        let mut out = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
