//! Role registry: explicit capability checks for each operation.
//!
//! A `RoleRegistry` is a snapshot of who holds which role at the moment an
//! operation runs. Operations call one of the `require_*` checks before
//! touching state.

use std::collections::BTreeSet;

use meterpay_types::{Address, MeterpayError, Result};

/// Snapshot of the current role holders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRegistry {
    /// Governance owner.
    pub platform: Address,
    /// Fee payout destination.
    pub wallet: Address,
    /// Co-signer of every session charge.
    pub signer: Address,
    /// Accounts allowed to submit session commits.
    pub relayers: BTreeSet<Address>,
}

impl RoleRegistry {
    /// # Errors
    /// Returns `AccessDenied` unless `caller` is the platform.
    pub fn require_platform(&self, caller: Address) -> Result<()> {
        if caller != self.platform {
            return Err(MeterpayError::AccessDenied {
                caller,
                role: "platform",
            });
        }
        Ok(())
    }

    /// # Errors
    /// Returns `AccessDenied` unless `caller` is an authorized relayer.
    pub fn require_relayer(&self, caller: Address) -> Result<()> {
        if !self.relayers.contains(&caller) {
            return Err(MeterpayError::AccessDenied {
                caller,
                role: "relayer",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn is_relayer(&self, who: Address) -> bool {
        self.relayers.contains(&who)
    }
}
