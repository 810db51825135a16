//! Error types for the splitter

use crate::asset_ledger::TransferError;
use crate::auth::Role;
use crate::config::ConfigError;
use crate::vault::VaultError;
use thiserror::Error;
use trisplit_storage::StorageError;
use trisplit_types::{Address, Epoch, PolicyError};

/// Broad classes of failure, for callers that only need to branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong caller for a role-gated operation
    Authorization,
    /// Malformed input or a precondition on epoch/policy state
    Validation,
    /// Vault, transfer or storage collaborator failed
    Collaborator,
}

/// Errors returned by splitter operations
#[derive(Debug, Error)]
pub enum SplitterError {
    #[error("caller {caller} is not authorized: requires {required} role")]
    Unauthorized { caller: Address, required: Role },

    #[error("epoch {epoch} is not in the future (current epoch is {current})")]
    EpochNotFuture { epoch: Epoch, current: Epoch },

    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("no policy configured for current epoch {epoch}")]
    PolicyUnset { epoch: Epoch },

    #[error("vault redemption failed: {0}")]
    RedeemFailed(#[source] VaultError),

    #[error("transfer of {amount} to {recipient} failed: {source}")]
    TransferFailed {
        recipient: Address,
        amount: u128,
        #[source]
        source: TransferError,
    },

    #[error("rollback failed during {stage}: {detail}")]
    RollbackFailed { stage: &'static str, detail: String },

    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SplitterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitterError::Unauthorized { .. } => ErrorKind::Authorization,
            SplitterError::EpochNotFuture { .. }
            | SplitterError::Policy(_)
            | SplitterError::PolicyUnset { .. }
            | SplitterError::Overflow(_)
            | SplitterError::Config(_) => ErrorKind::Validation,
            SplitterError::RedeemFailed(_)
            | SplitterError::TransferFailed { .. }
            | SplitterError::RollbackFailed { .. }
            | SplitterError::Storage(_) => ErrorKind::Collaborator,
        }
    }
}

/// Result type for splitter operations
pub type Result<T> = std::result::Result<T, SplitterError>;
