//! Platform fee vault.
//!
//! Fees accrue per payout wallet and leave only through an explicit
//! payout. A wallet change does not move fees already accrued to the
//! previous wallet.

use std::collections::HashMap;

use meterpay_types::{Address, MeterpayError, Result, Wei};

/// Accrued, unpaid platform fees keyed by the wallet they are owed to.
#[derive(Debug, Default)]
pub struct FeeVault {
    pools: HashMap<Address, Wei>,
}

impl FeeVault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `fee` to the wallet's pool.
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the pool would overflow.
    pub fn accrue(&mut self, wallet: Address, fee: Wei) -> Result<()> {
        let pool = self.pools.entry(wallet).or_default();
        *pool = pool
            .checked_add(fee)
            .ok_or(MeterpayError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Remove `fee` from the wallet's pool (rollback of [`accrue`](Self::accrue)).
    pub fn reverse(&mut self, wallet: Address, fee: Wei) {
        if let Some(pool) = self.pools.get_mut(&wallet) {
            *pool = pool.saturating_sub(fee);
        }
    }

    /// Zero the wallet's pool and return what it held (possibly zero).
    pub fn take(&mut self, wallet: Address) -> Wei {
        self.pools.insert(wallet, 0).unwrap_or(0)
    }

    /// Put back an amount removed by [`take`](Self::take).
    pub fn restore(&mut self, wallet: Address, amount: Wei) {
        self.pools.insert(wallet, amount);
    }

    #[must_use]
    pub fn pool(&self, wallet: Address) -> Wei {
        self.pools.get(&wallet).copied().unwrap_or(0)
    }

    /// Sum of all pools, or `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<Wei> {
        self.pools
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }
}
