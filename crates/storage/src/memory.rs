//! In-memory backend (default for tests, simulation and the CLI's `memory`
//! storage mode).

use crate::{Result, SplitterStore, StorageError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use trisplit_types::{Epoch, EpochPolicy, SettlementRecord};

#[derive(Debug, Default)]
struct MemoryState {
    current_epoch: Option<Epoch>,
    policies: BTreeMap<Epoch, EpochPolicy>,
    pending_shares: u128,
    records: Vec<SettlementRecord>,
}

/// In-memory testing backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SplitterStore for MemoryStore {
    fn initialize(&self, genesis_epoch: Epoch) -> Result<bool> {
        let mut state = self.state.write();
        if state.current_epoch.is_some() {
            return Ok(false);
        }
        state.current_epoch = Some(genesis_epoch);
        Ok(true)
    }

    fn current_epoch(&self) -> Result<Epoch> {
        self.state
            .read()
            .current_epoch
            .ok_or(StorageError::Uninitialized)
    }

    fn set_current_epoch(&self, epoch: Epoch) -> Result<()> {
        self.state.write().current_epoch = Some(epoch);
        Ok(())
    }

    fn get_policy(&self, epoch: Epoch) -> Result<Option<EpochPolicy>> {
        Ok(self.state.read().policies.get(&epoch).copied())
    }

    fn put_policy(&self, epoch: Epoch, policy: &EpochPolicy) -> Result<()> {
        self.state.write().policies.insert(epoch, *policy);
        Ok(())
    }

    fn policy_epochs(&self) -> Result<Vec<Epoch>> {
        Ok(self.state.read().policies.keys().copied().collect())
    }

    fn pending_shares(&self) -> Result<u128> {
        Ok(self.state.read().pending_shares)
    }

    fn add_pending_shares(&self, amount: u128) -> Result<u128> {
        let mut state = self.state.write();
        let updated = state
            .pending_shares
            .checked_add(amount)
            .ok_or(StorageError::PendingOverflow)?;
        state.pending_shares = updated;
        Ok(updated)
    }

    fn take_pending_shares(&self) -> Result<u128> {
        Ok(std::mem::take(&mut self.state.write().pending_shares))
    }

    fn append_record(&self, record: &SettlementRecord) -> Result<()> {
        let mut state = self.state.write();
        let expected = state.records.len() as u64;
        if record.sequence != expected {
            return Err(StorageError::SequenceConflict {
                sequence: record.sequence,
                expected,
            });
        }
        state.records.push(record.clone());
        Ok(())
    }

    fn record_count(&self) -> Result<u64> {
        Ok(self.state.read().records.len() as u64)
    }

    fn get_record(&self, sequence: u64) -> Result<Option<SettlementRecord>> {
        Ok(self.state.read().records.get(sequence as usize).cloned())
    }

    fn records(&self) -> Result<Vec<SettlementRecord>> {
        Ok(self.state.read().records.clone())
    }
}
