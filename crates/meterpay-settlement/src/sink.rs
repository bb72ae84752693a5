//! Outbound value transfers.
//!
//! The contract never moves value itself: every payout is handed to a
//! [`TransferSink`] after internal balances have been updated. A failing
//! sink makes the calling operation roll back.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use meterpay_types::{Address, MeterpayError, Result, Wei};
use serde::{Deserialize, Serialize};

/// Destination for value leaving custody.
pub trait TransferSink: Send + Sync {
    /// Deliver `amount` to `to`.
    ///
    /// # Errors
    /// Any error aborts the calling operation, which then restores its state
    /// and reports `TransferFailed`.
    fn transfer(&self, to: Address, amount: Wei) -> Result<()>;
}

/// One delivered transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Address,
    pub amount: Wei,
}

#[derive(Debug, Default)]
struct Recorded {
    transfers: Vec<Transfer>,
    balances: HashMap<Address, Wei>,
    rejecting: BTreeSet<Address>,
}

/// In-memory sink that remembers every transfer and per-address totals.
///
/// Addresses can be marked as rejecting to simulate a recipient that refuses
/// payment.
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recorded>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future transfer to `who` fail.
    pub fn reject(&self, who: Address) {
        self.lock().rejecting.insert(who);
    }

    pub fn accept(&self, who: Address) {
        self.lock().rejecting.remove(&who);
    }

    /// Total received by `who` so far.
    #[must_use]
    pub fn balance(&self, who: Address) -> Wei {
        self.lock().balances.get(&who).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn transfers(&self) -> Vec<Transfer> {
        self.lock().transfers.clone()
    }

    #[must_use]
    pub fn total_paid(&self) -> Wei {
        self.lock().transfers.iter().map(|t| t.amount).sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransferSink for RecordingSink {
    fn transfer(&self, to: Address, amount: Wei) -> Result<()> {
        let mut inner = self.lock();
        if inner.rejecting.contains(&to) {
            return Err(MeterpayError::TransferFailed {
                to,
                amount,
                reason: "recipient rejects payments".into(),
            });
        }
        let balance = inner.balances.entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(MeterpayError::ArithmeticOverflow)?;
        inner.transfers.push(Transfer { to, amount });
        Ok(())
    }
}
