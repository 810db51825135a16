//! Settlement history queries
//!
//! Aggregates over the append-only settlement log: lifetime statistics,
//! per-epoch and per-recipient totals, and the most recent records.

use crate::errors::Result;
use crate::splitter::DonationSplitter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use trisplit_types::{Address, Epoch, SettlementRecord};

/// Summary statistics about the settlement log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStatistics {
    pub settlements: u64,
    pub total_shares_redeemed: u128,
    pub total_assets_distributed: u128,
    pub average_per_settlement: u128,
    /// Distinct addresses that received a nonzero payout
    pub recipients_paid: usize,
}

impl SettlementStatistics {
    pub fn from_records(records: &[SettlementRecord]) -> Self {
        let mut stats = SettlementStatistics {
            settlements: records.len() as u64,
            ..Default::default()
        };
        let mut recipients = HashSet::new();

        for record in records {
            stats.total_shares_redeemed = stats
                .total_shares_redeemed
                .saturating_add(record.shares_redeemed);
            stats.total_assets_distributed = stats
                .total_assets_distributed
                .saturating_add(record.assets_distributed);
            recipients.extend(
                record
                    .payouts
                    .iter()
                    .filter(|p| p.amount > 0)
                    .map(|p| p.recipient),
            );
        }

        stats.recipients_paid = recipients.len();
        if stats.settlements > 0 {
            stats.average_per_settlement =
                stats.total_assets_distributed / stats.settlements as u128;
        }
        stats
    }
}

impl DonationSplitter {
    /// Every settlement record, oldest first.
    pub fn records(&self) -> Result<Vec<SettlementRecord>> {
        Ok(self.store.records()?)
    }

    pub fn record(&self, sequence: u64) -> Result<Option<SettlementRecord>> {
        Ok(self.store.get_record(sequence)?)
    }

    pub fn statistics(&self) -> Result<SettlementStatistics> {
        Ok(SettlementStatistics::from_records(&self.store.records()?))
    }

    /// Assets distributed under `epoch`'s policy.
    pub fn epoch_total(&self, epoch: Epoch) -> Result<u128> {
        Ok(self
            .store
            .records()?
            .iter()
            .filter(|r| r.epoch == epoch)
            .map(|r| r.assets_distributed)
            .fold(0u128, u128::saturating_add))
    }

    /// Lifetime assets paid to `recipient` across all settlements.
    pub fn recipient_total(&self, recipient: &Address) -> Result<u128> {
        Ok(self
            .store
            .records()?
            .iter()
            .map(|r| r.amount_for(recipient))
            .fold(0u128, u128::saturating_add))
    }

    /// Up to `limit` latest records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SettlementRecord>> {
        let count = self.store.record_count()?;
        let mut out = Vec::with_capacity(limit.min(count as usize));
        let mut sequence = count;
        while sequence > 0 && out.len() < limit {
            sequence -= 1;
            if let Some(record) = self.store.get_record(sequence)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}
