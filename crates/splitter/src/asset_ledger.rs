//! Asset ledger interface for settlement payouts
//!
//! The splitter never holds balances itself: it hands each payout to an
//! [`AssetLedger`] and, if a later step fails, asks the same ledger to
//! `reclaim` what it already paid so the settlement unwinds completely.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use trisplit_types::Address;

/// Transfer collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("account {account} holds {balance}, cannot reclaim {amount}")]
    InsufficientBalance {
        account: Address,
        balance: u128,
        amount: u128,
    },

    #[error("balance overflow crediting {0}")]
    Overflow(Address),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Interface for moving settled assets to recipients.
pub trait AssetLedger: Send + Sync {
    /// Pay `amount` asset units to `recipient`.
    fn transfer(&mut self, recipient: &Address, amount: u128) -> Result<(), TransferError>;

    /// Take back a payout made earlier in the same settlement.
    fn reclaim(&mut self, recipient: &Address, amount: u128) -> Result<(), TransferError>;

    /// Current balance of `account`.
    fn balance_of(&self, account: &Address) -> u128;

    /// Net asset units paid out through this ledger.
    fn total_transferred(&self) -> u128;
}

// -----------------------------------------------------------------------------
// In-memory implementation (for simulation or testing)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryAssetLedger {
    balances: HashMap<Address, u128>,
    total_transferred: u128,
    rejecting: HashSet<Address>,
}

impl InMemoryAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future transfer to `recipient` fail.
    pub fn reject_recipient(&mut self, recipient: Address) {
        self.rejecting.insert(recipient);
    }

    pub fn accept_recipient(&mut self, recipient: &Address) {
        self.rejecting.remove(recipient);
    }

    pub fn balances(&self) -> &HashMap<Address, u128> {
        &self.balances
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn transfer(&mut self, recipient: &Address, amount: u128) -> Result<(), TransferError> {
        if self.rejecting.contains(recipient) {
            return Err(TransferError::Rejected(*recipient));
        }
        let current_balance = self.balances.get(recipient).copied().unwrap_or(0);
        let new_balance = current_balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow(*recipient))?;
        self.balances.insert(*recipient, new_balance);
        self.total_transferred = self.total_transferred.saturating_add(amount);
        Ok(())
    }

    fn reclaim(&mut self, recipient: &Address, amount: u128) -> Result<(), TransferError> {
        let current_balance = self.balances.get(recipient).copied().unwrap_or(0);
        if current_balance < amount {
            return Err(TransferError::InsufficientBalance {
                account: *recipient,
                balance: current_balance,
                amount,
            });
        }
        self.balances.insert(*recipient, current_balance - amount);
        self.total_transferred = self.total_transferred.saturating_sub(amount);
        Ok(())
    }

    fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn total_transferred(&self) -> u128 {
        self.total_transferred
    }
}

// -----------------------------------------------------------------------------
// Mock ledger (records calls, injects failures)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MockAssetLedger {
    inner: InMemoryAssetLedger,
    transfer_calls: Vec<(Address, u128)>,
    reclaim_calls: Vec<(Address, u128)>,
    fail_transfer_at: Option<usize>,
    fail_reclaims: bool,
}

impl MockAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the transfer with this zero-based call index.
    pub fn fail_transfer_at(mut self, call_index: usize) -> Self {
        self.fail_transfer_at = Some(call_index);
        self
    }

    /// Fail every reclaim.
    pub fn fail_reclaims(mut self) -> Self {
        self.fail_reclaims = true;
        self
    }

    pub fn get_transfer_calls(&self) -> &[(Address, u128)] {
        &self.transfer_calls
    }

    pub fn get_reclaim_calls(&self) -> &[(Address, u128)] {
        &self.reclaim_calls
    }
}

impl AssetLedger for MockAssetLedger {
    fn transfer(&mut self, recipient: &Address, amount: u128) -> Result<(), TransferError> {
        let index = self.transfer_calls.len();
        self.transfer_calls.push((*recipient, amount));
        if self.fail_transfer_at == Some(index) {
            return Err(TransferError::Unavailable(format!(
                "injected failure on transfer #{}",
                index
            )));
        }
        self.inner.transfer(recipient, amount)
    }

    fn reclaim(&mut self, recipient: &Address, amount: u128) -> Result<(), TransferError> {
        self.reclaim_calls.push((*recipient, amount));
        if self.fail_reclaims {
            return Err(TransferError::Unavailable("injected reclaim failure".into()));
        }
        self.inner.reclaim(recipient, amount)
    }

    fn balance_of(&self, account: &Address) -> u128 {
        self.inner.balance_of(account)
    }

    fn total_transferred(&self) -> u128 {
        self.inner.total_transferred()
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn test_address(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_in_memory_ledger_operations() {
        let mut ledger = InMemoryAssetLedger::new();
        let recipient = test_address(1);

        ledger.transfer(&recipient, 1000).unwrap();
        assert_eq!(ledger.balance_of(&recipient), 1000);
        assert_eq!(ledger.total_transferred(), 1000);

        ledger.reclaim(&recipient, 300).unwrap();
        assert_eq!(ledger.balance_of(&recipient), 700);
        assert_eq!(ledger.total_transferred(), 700);
    }

    #[test]
    fn test_reclaim_more_than_balance() {
        let mut ledger = InMemoryAssetLedger::new();
        let recipient = test_address(2);
        ledger.transfer(&recipient, 1000).unwrap();

        let result = ledger.reclaim(&recipient, 1500);
        assert!(matches!(
            result,
            Err(TransferError::InsufficientBalance { balance: 1000, .. })
        ));
        assert_eq!(ledger.balance_of(&recipient), 1000);
    }

    #[test]
    fn test_rejecting_recipient() {
        let mut ledger = InMemoryAssetLedger::new();
        let recipient = test_address(3);
        ledger.reject_recipient(recipient);
        assert_eq!(
            ledger.transfer(&recipient, 5),
            Err(TransferError::Rejected(recipient))
        );

        ledger.accept_recipient(&recipient);
        assert!(ledger.transfer(&recipient, 5).is_ok());
    }

    #[test]
    fn test_mock_ledger_calls() {
        let mut mock = MockAssetLedger::new().fail_transfer_at(1);
        let a = test_address(4);
        let b = test_address(5);

        mock.transfer(&a, 1000).unwrap();
        assert!(mock.transfer(&b, 10).is_err());
        mock.reclaim(&a, 1000).unwrap();

        assert_eq!(mock.get_transfer_calls(), &[(a, 1000), (b, 10)]);
        assert_eq!(mock.get_reclaim_calls(), &[(a, 1000)]);
        assert_eq!(mock.balance_of(&b), 0);
        assert_eq!(mock.total_transferred(), 0);
    }
}
