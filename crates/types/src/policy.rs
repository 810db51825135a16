//! Epoch policy types
//!
//! An [`EpochPolicy`] routes settled assets to exactly three recipients by
//! basis-point weight. Weights are validated when a policy is built, never at
//! settlement time, so every stored policy already satisfies
//! `sum(weights) == 10000`.

use crate::address::Address;
use crate::units::{bps_share, Bps, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

/// Number of recipients in every policy
pub const RECIPIENT_COUNT: usize = 3;

/// Slot that absorbs the truncation remainder of a split
pub const REMAINDER_SLOT: usize = 0;

/// A single payee and its weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSlot {
    pub address: Address,
    /// Weight in basis points (0-10000)
    pub weight_bps: Bps,
}

/// Errors for policy validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Recipient weights must sum to 10000 bps, got {sum}")]
    WeightSumInvalid { sum: u32 },

    #[error("Weight {weight} bps in slot {index} exceeds 10000")]
    WeightOutOfRange { index: usize, weight: Bps },

    #[error("Recipient in slot {index} is the null address")]
    InvalidRecipient { index: usize },
}

/// Recipient/weight triple in force for one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochPolicy {
    pub slots: [RecipientSlot; RECIPIENT_COUNT],
}

/// Result of splitting an asset total across a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySplit {
    /// Final per-slot amounts, remainder already included in [`REMAINDER_SLOT`]
    pub amounts: [u128; RECIPIENT_COUNT],
    /// Truncation remainder that was folded into the remainder slot
    pub remainder: u128,
}

impl PolicySplit {
    pub fn total(&self) -> u128 {
        self.amounts.iter().sum()
    }
}

impl EpochPolicy {
    /// Build and validate a policy from parallel recipient/weight arrays.
    pub fn new(
        recipients: [Address; RECIPIENT_COUNT],
        weights_bps: [Bps; RECIPIENT_COUNT],
    ) -> Result<Self, PolicyError> {
        let policy = Self {
            slots: [0, 1, 2].map(|i| RecipientSlot {
                address: recipients[i],
                weight_bps: weights_bps[i],
            }),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Validate weights and recipients
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.weight_bps as u128 > BPS_DENOMINATOR {
                return Err(PolicyError::WeightOutOfRange {
                    index,
                    weight: slot.weight_bps,
                });
            }
        }

        let sum = self.weight_sum();
        if sum as u128 != BPS_DENOMINATOR {
            return Err(PolicyError::WeightSumInvalid { sum });
        }

        if let Some(index) = self.slots.iter().position(|s| s.address.is_zero()) {
            return Err(PolicyError::InvalidRecipient { index });
        }

        Ok(())
    }

    pub fn weight_sum(&self) -> u32 {
        self.slots.iter().map(|s| s.weight_bps as u32).sum()
    }

    pub fn recipients(&self) -> [Address; RECIPIENT_COUNT] {
        self.slots.map(|s| s.address)
    }

    pub fn weights_bps(&self) -> [Bps; RECIPIENT_COUNT] {
        self.slots.map(|s| s.weight_bps)
    }

    /// Split `total` by weight.
    ///
    /// Each slot gets `floor(total * w / 10000)`; the truncation remainder
    /// (at most 2 units) goes to [`REMAINDER_SLOT`], so the amounts always sum
    /// to `total` exactly.
    pub fn split(&self, total: u128) -> PolicySplit {
        let mut amounts = self.slots.map(|s| bps_share(total, s.weight_bps));
        let floored: u128 = amounts.iter().sum();
        let remainder = total - floored;
        amounts[REMAINDER_SLOT] += remainder;
        PolicySplit { amounts, remainder }
    }
}

// =============================================================================
// TESTS
// =============================================================================
