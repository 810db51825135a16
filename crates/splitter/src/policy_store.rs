//! Policy configuration for future epochs

use crate::auth::{require_role, Role};
use crate::errors::{Result, SplitterError};
use crate::splitter::DonationSplitter;
use tracing::info;
use trisplit_types::{Address, Bps, Epoch, EpochPolicy, RECIPIENT_COUNT};

impl DonationSplitter {
    /// Create or overwrite the policy for a future epoch.
    ///
    /// Checks run in order: caller role, `epoch > current`, then the policy
    /// rules (weight range, weight sum, null recipient). Nothing is written
    /// unless all of them pass. Last write wins until the epoch becomes
    /// current, after which the policy can no longer be touched.
    pub fn set_policy(
        &self,
        caller: &Address,
        epoch: Epoch,
        recipients: [Address; RECIPIENT_COUNT],
        weights_bps: [Bps; RECIPIENT_COUNT],
    ) -> Result<()> {
        require_role(self.authority.as_ref(), caller, Role::Governance)?;

        let _guard = self.governance.lock();
        let current = self.store.current_epoch()?;
        if epoch <= current {
            return Err(SplitterError::EpochNotFuture { epoch, current });
        }

        let policy = EpochPolicy::new(recipients, weights_bps)?;
        let replaced = self.store.get_policy(epoch)?.is_some();
        self.store.put_policy(epoch, &policy)?;

        info!(
            target: "splitter",
            epoch,
            current,
            replaced,
            weights = ?policy.weights_bps(),
            "Policy configured"
        );
        Ok(())
    }

    /// Policy stored for `epoch`, if any.
    pub fn get_policy(&self, epoch: Epoch) -> Result<Option<EpochPolicy>> {
        Ok(self.store.get_policy(epoch)?)
    }

    /// Policy in force for the current epoch.
    pub fn current_policy(&self) -> Result<Option<EpochPolicy>> {
        let epoch = self.store.current_epoch()?;
        self.get_policy(epoch)
    }

    /// Policy queued for the epoch right after the current one.
    pub fn next_policy(&self) -> Result<Option<EpochPolicy>> {
        let current = self.store.current_epoch()?;
        match current.checked_add(1) {
            Some(next) => self.get_policy(next),
            None => Ok(None),
        }
    }

    /// Epochs that have a policy, ascending.
    pub fn policy_epochs(&self) -> Result<Vec<Epoch>> {
        Ok(self.store.policy_epochs()?)
    }

    /// Current epoch and its policy, read as one consistent pair.
    pub(crate) fn settlement_policy(&self) -> Result<(Epoch, EpochPolicy)> {
        let _guard = self.governance.lock();
        let epoch = self.store.current_epoch()?;
        let policy = self
            .store
            .get_policy(epoch)?
            .ok_or(SplitterError::PolicyUnset { epoch })?;
        Ok((epoch, policy))
    }
}
