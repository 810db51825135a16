//! Epoch advancement

use crate::auth::{require_role, Role};
use crate::errors::{Result, SplitterError};
use crate::splitter::DonationSplitter;
use tracing::{info, warn};
use trisplit_types::{Address, Epoch};

impl DonationSplitter {
    pub fn current_epoch(&self) -> Result<Epoch> {
        Ok(self.store.current_epoch()?)
    }

    /// Move the current epoch forward to `target`, freezing its policy.
    ///
    /// Epochs may be skipped. A missing policy for `target` is allowed here;
    /// settlements fail with `PolicyUnset` until one is in force.
    pub fn advance_epoch(&self, caller: &Address, target: Epoch) -> Result<()> {
        require_role(self.authority.as_ref(), caller, Role::Governance)?;

        let _guard = self.governance.lock();
        let current = self.store.current_epoch()?;
        if target <= current {
            return Err(SplitterError::EpochNotFuture {
                epoch: target,
                current,
            });
        }

        self.store.set_current_epoch(target)?;

        if self.store.get_policy(target)?.is_none() {
            warn!(
                target: "splitter",
                from = current,
                to = target,
                "Advanced to an epoch without a policy; settlements will fail until one is set"
            );
        } else {
            info!(target: "splitter", from = current, to = target, "Epoch advanced");
        }
        Ok(())
    }
}
