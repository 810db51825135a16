//! Caller roles
//!
//! Every state-changing operation resolves its caller to a single [`Role`]
//! through an injected [`AuthorityProvider`] exactly once, then compares it
//! with the role the operation requires.

use crate::errors::{Result, SplitterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use trisplit_types::Address;

/// Role a caller holds with respect to the splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May configure future policies and advance the epoch
    Governance,
    /// The yield vault; may credit pending shares
    Vault,
    /// Anyone else; may trigger settlement and read state
    Public,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Governance => "governance",
            Role::Vault => "vault",
            Role::Public => "public",
        };
        f.write_str(name)
    }
}

/// Resolves caller addresses to roles
pub trait AuthorityProvider: Send + Sync {
    fn resolve(&self, caller: &Address) -> Role;
}

/// Fixed governance and vault addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAuthority {
    governance: Address,
    vault: Address,
}

impl StaticAuthority {
    pub fn new(governance: Address, vault: Address) -> Self {
        Self { governance, vault }
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn vault(&self) -> Address {
        self.vault
    }
}

impl AuthorityProvider for StaticAuthority {
    fn resolve(&self, caller: &Address) -> Role {
        if caller.is_zero() {
            Role::Public
        } else if *caller == self.governance {
            Role::Governance
        } else if *caller == self.vault {
            Role::Vault
        } else {
            Role::Public
        }
    }
}

/// Resolve `caller` once and fail unless it holds `required`.
pub(crate) fn require_role(
    authority: &dyn AuthorityProvider,
    caller: &Address,
    required: Role,
) -> Result<()> {
    let role = authority.resolve(caller);
    if role != required {
        tracing::debug!(
            target: "splitter",
            caller = %caller,
            resolved = %role,
            required = %required,
            "Rejected unauthorized caller"
        );
        return Err(SplitterError::Unauthorized {
            caller: *caller,
            required,
        });
    }
    Ok(())
}
