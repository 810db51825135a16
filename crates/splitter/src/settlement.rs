//! Pending share accrual and settlement
//!
//! ## Settlement sequence
//! 1. Snapshot the current epoch and its policy (`PolicyUnset` fails here,
//!    before anything is touched)
//! 2. Read the share price once
//! 3. Take the whole pending balance (atomic read-and-zero)
//! 4. Redeem the shares at the quoted price
//! 5. Split the assets; the truncation remainder goes to slot 0
//! 6. Transfer every nonzero amount
//! 7. Append the settlement record
//!
//! A failure in steps 4-7 unwinds in reverse: payouts are reclaimed, the
//! redemption is reverted and the shares are re-credited to the pending
//! balance with an atomic add.

use crate::asset_ledger::AssetLedger;
use crate::auth::{require_role, Role};
use crate::errors::{Result, SplitterError};
use crate::splitter::DonationSplitter;
use crate::vault::{Redemption, ShareVault};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use trisplit_storage::StorageError;
use trisplit_types::{
    Address, Epoch, EpochPolicy, PolicySplit, SettlementRecord, SharePrice, RECIPIENT_COUNT,
};

/// Result of a `distribute_all` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DistributionOutcome {
    /// Shares were redeemed and paid out
    Settled(SettlementRecord),
    /// Pending balance was zero; nothing changed
    NothingToDistribute,
}

impl DistributionOutcome {
    pub fn record(&self) -> Option<&SettlementRecord> {
        match self {
            DistributionOutcome::Settled(record) => Some(record),
            DistributionOutcome::NothingToDistribute => None,
        }
    }

    pub fn shares_redeemed(&self) -> u128 {
        self.record().map(|r| r.shares_redeemed).unwrap_or(0)
    }

    pub fn assets_distributed(&self) -> u128 {
        self.record().map(|r| r.assets_distributed).unwrap_or(0)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, DistributionOutcome::NothingToDistribute)
    }
}

impl DonationSplitter {
    /// Credit `shares` newly minted donation shares. Vault only.
    ///
    /// Returns the pending balance after the credit. Zero is accepted and
    /// changes nothing.
    pub fn accrue(&self, caller: &Address, shares: u128) -> Result<u128> {
        require_role(self.authority.as_ref(), caller, Role::Vault)?;

        if shares == 0 {
            debug!(target: "splitter", "Ignoring zero-share accrual");
            return Ok(self.store.pending_shares()?);
        }

        let pending = self.store.add_pending_shares(shares).map_err(|e| match e {
            StorageError::PendingOverflow => SplitterError::Overflow("pending shares"),
            other => SplitterError::Storage(other),
        })?;

        debug!(target: "splitter", shares, pending, "Accrued donation shares");
        Ok(pending)
    }

    pub fn pending_shares(&self) -> Result<u128> {
        Ok(self.store.pending_shares()?)
    }

    /// Asset value of the pending balance at `price`, rounded down.
    pub fn estimated_pending_assets(&self, price: SharePrice) -> Result<u128> {
        let pending = self.store.pending_shares()?;
        price
            .convert_to_assets(pending)
            .ok_or(SplitterError::Overflow("estimated pending assets"))
    }

    /// Redeem the whole pending balance and pay it out under the current
    /// epoch's policy. Anyone may call this.
    pub fn distribute_all(
        &self,
        vault: &mut dyn ShareVault,
        ledger: &mut dyn AssetLedger,
    ) -> Result<DistributionOutcome> {
        if self.store.pending_shares()? == 0 {
            debug!(target: "splitter", "No pending shares; nothing to distribute");
            return Ok(DistributionOutcome::NothingToDistribute);
        }

        let (epoch, policy) = self.settlement_policy()?;
        let price = vault
            .price_per_share()
            .map_err(SplitterError::RedeemFailed)?;

        let shares = self.store.take_pending_shares()?;
        if shares == 0 {
            // Another settlement drained the balance after the first read
            debug!(target: "splitter", "Pending balance already taken; nothing to distribute");
            return Ok(DistributionOutcome::NothingToDistribute);
        }

        let redemption = match vault.redeem_shares(shares, price) {
            Ok(redemption) => redemption,
            Err(e) => {
                warn!(target: "splitter", epoch, shares, error = %e, "Redemption failed; restoring pending shares");
                self.restore_pending(shares)?;
                return Err(SplitterError::RedeemFailed(e));
            }
        };

        let split = policy.split(redemption.assets);
        let mut paid: Vec<(Address, u128)> = Vec::with_capacity(RECIPIENT_COUNT);

        for (slot, amount) in policy.slots.iter().zip(split.amounts) {
            if amount == 0 {
                continue;
            }
            if let Err(source) = ledger.transfer(&slot.address, amount) {
                warn!(
                    target: "splitter",
                    epoch,
                    recipient = %slot.address,
                    amount,
                    error = %source,
                    "Transfer failed; unwinding settlement"
                );
                self.unwind(vault, ledger, &redemption, &paid)?;
                return Err(SplitterError::TransferFailed {
                    recipient: slot.address,
                    amount,
                    source,
                });
            }
            debug!(target: "splitter", recipient = %slot.address, amount, "Paid recipient");
            paid.push((slot.address, amount));
        }

        let record = match self.commit_record(epoch, &redemption, &policy, &split) {
            Ok(record) => record,
            Err(e) => {
                warn!(target: "splitter", epoch, error = %e, "Failed to record settlement; unwinding");
                self.unwind(vault, ledger, &redemption, &paid)?;
                return Err(e);
            }
        };

        info!(
            target: "splitter",
            sequence = record.sequence,
            epoch,
            shares = record.shares_redeemed,
            assets = record.assets_distributed,
            price = %record.share_price,
            remainder = split.remainder,
            "Distributed pending donations"
        );
        Ok(DistributionOutcome::Settled(record))
    }

    fn commit_record(
        &self,
        epoch: Epoch,
        redemption: &Redemption,
        policy: &EpochPolicy,
        split: &PolicySplit,
    ) -> Result<SettlementRecord> {
        let _guard = self.commit.lock();
        let sequence = self.store.record_count()?;
        let record = SettlementRecord::new(
            sequence,
            epoch,
            redemption.shares,
            redemption.price,
            policy,
            split,
        );
        self.store.append_record(&record)?;
        Ok(record)
    }

    /// Reverse a partially applied settlement. Stops at the first failed
    /// step, since every later step depends on it.
    fn unwind(
        &self,
        vault: &mut dyn ShareVault,
        ledger: &mut dyn AssetLedger,
        redemption: &Redemption,
        paid: &[(Address, u128)],
    ) -> Result<()> {
        for (recipient, amount) in paid.iter().rev() {
            if let Err(e) = ledger.reclaim(recipient, *amount) {
                return Err(rollback_failed(
                    "reclaim",
                    format!("{} from {}: {}", amount, recipient, e),
                ));
            }
        }

        if let Err(e) = vault.revert_redemption(redemption) {
            return Err(rollback_failed(
                "revert_redemption",
                format!("{} shares: {}", redemption.shares, e),
            ));
        }

        self.restore_pending(redemption.shares)
    }

    fn restore_pending(&self, shares: u128) -> Result<()> {
        match self.store.add_pending_shares(shares) {
            Ok(pending) => {
                debug!(target: "splitter", shares, pending, "Restored pending shares");
                Ok(())
            }
            Err(e) => Err(rollback_failed(
                "restore_pending",
                format!("{} shares: {}", shares, e),
            )),
        }
    }
}

fn rollback_failed(stage: &'static str, detail: String) -> SplitterError {
    error!(target: "splitter", stage, detail = %detail, "Settlement rollback failed");
    SplitterError::RollbackFailed { stage, detail }
}
