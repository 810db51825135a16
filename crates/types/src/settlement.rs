//! Settlement record: the append-only fact emitted by every successful
//! distribution.

use crate::address::Address;
use crate::policy::{EpochPolicy, PolicySplit, RECIPIENT_COUNT};
use crate::units::{Bps, Epoch, SharePrice};
use serde::{Deserialize, Serialize};

/// Amount paid to one recipient in a settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: Address,
    /// Weight applied (from the epoch policy)
    pub weight_bps: Bps,
    /// Asset units transferred
    pub amount: u128,
}

/// Immutable record of one settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Position in the settlement log, starting at 0
    pub sequence: u64,
    /// Epoch whose policy was applied
    pub epoch: Epoch,
    /// Vault shares drained from the pending balance
    pub shares_redeemed: u128,
    /// Asset units received from the vault and paid out in full
    pub assets_distributed: u128,
    /// Price read once for the whole settlement
    pub share_price: SharePrice,
    /// Per-slot payouts, in policy order
    pub payouts: [Payout; RECIPIENT_COUNT],
}

impl SettlementRecord {
    pub fn new(
        sequence: u64,
        epoch: Epoch,
        shares_redeemed: u128,
        share_price: SharePrice,
        policy: &EpochPolicy,
        split: &PolicySplit,
    ) -> Self {
        let payouts = [0, 1, 2].map(|i| Payout {
            recipient: policy.slots[i].address,
            weight_bps: policy.slots[i].weight_bps,
            amount: split.amounts[i],
        });
        Self {
            sequence,
            epoch,
            shares_redeemed,
            assets_distributed: split.total(),
            share_price,
            payouts,
        }
    }

    pub fn per_recipient_amounts(&self) -> [u128; RECIPIENT_COUNT] {
        self.payouts.map(|p| p.amount)
    }

    /// Amount paid to `recipient` in this settlement (summed if the address
    /// occupies several slots).
    pub fn amount_for(&self, recipient: &Address) -> u128 {
        self.payouts
            .iter()
            .filter(|p| &p.recipient == recipient)
            .map(|p| p.amount)
            .sum()
    }

    /// Exact conservation check: payouts add up to the distributed total.
    pub fn is_conserved(&self) -> bool {
        self.payouts.iter().map(|p| p.amount).sum::<u128>() == self.assets_distributed
    }
}
