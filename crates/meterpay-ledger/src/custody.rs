//! Custody conservation invariant checker.
//!
//! Invariant checked by the contract's `verify_custody`:
//! ```text
//! Σ(deposits) + Σ(fee pools) <= held
//! held == Σ(inflows) - Σ(outflows)
//! ```
//!
//! Accounting must never promise more value than is actually custodied.

use meterpay_types::{MeterpayError, Result, Wei};

/// Tracks value entering and leaving custody.
#[derive(Debug, Default)]
pub struct CustodyConservation {
    inflows: Wei,
    outflows: Wei,
}

impl CustodyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record value received by a deposit.
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if lifetime inflows would overflow.
    pub fn record_inflow(&mut self, amount: Wei) -> Result<()> {
        self.inflows = self
            .inflows
            .checked_add(amount)
            .ok_or(MeterpayError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Record value sent out of custody.
    ///
    /// # Errors
    /// Returns `CustodyInvariantViolation` if more would leave than is held.
    pub fn record_outflow(&mut self, amount: Wei) -> Result<()> {
        if amount > self.held() {
            return Err(MeterpayError::CustodyInvariantViolation {
                reason: format!("outflow {amount} exceeds held {}", self.held()),
            });
        }
        self.outflows += amount;
        Ok(())
    }

    /// Rollback of [`record_outflow`](Self::record_outflow).
    pub fn reverse_outflow(&mut self, amount: Wei) {
        self.outflows = self.outflows.saturating_sub(amount);
    }

    /// Value currently custodied.
    #[must_use]
    pub fn held(&self) -> Wei {
        self.inflows - self.outflows
    }

    #[must_use]
    pub fn total_inflows(&self) -> Wei {
        self.inflows
    }

    #[must_use]
    pub fn total_outflows(&self) -> Wei {
        self.outflows
    }

    /// Verify that `liabilities` (deposits plus fee pools) are covered.
    ///
    /// # Errors
    /// Returns [`MeterpayError::CustodyInvariantViolation`] if
    /// `liabilities > held`.
    pub fn verify(&self, liabilities: Wei) -> Result<()> {
        let held = self.held();
        if liabilities > held {
            tracing::error!(liabilities, held, "custody invariant violated");
            return Err(MeterpayError::CustodyInvariantViolation {
                reason: format!(
                    "liabilities {liabilities} exceed held {held} \
                     (inflows={}, outflows={})",
                    self.total_inflows(),
                    self.total_outflows()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_custody_is_zero() {
        let c = CustodyConservation::new();
        assert_eq!(c.held(), 0);
        assert!(c.verify(0).is_ok());
    }

    #[test]
    fn inflows_and_outflows() {
        let mut c = CustodyConservation::new();
        c.record_inflow(1_000).unwrap();
        c.record_inflow(500).unwrap();
        c.record_outflow(300).unwrap();
        assert_eq!(c.held(), 1_200);
        assert_eq!(c.total_inflows(), 1_500);
        assert_eq!(c.total_outflows(), 300);
    }

    #[test]
    fn outflow_beyond_held_rejected() {
        let mut c = CustodyConservation::new();
        c.record_inflow(10).unwrap();
        let err = c.record_outflow(11).unwrap_err();
        assert!(matches!(
            err,
            MeterpayError::CustodyInvariantViolation { .. }
        ));
        assert_eq!(c.held(), 10);
    }

    #[test]
    fn reverse_outflow_restores_held() {
        let mut c = CustodyConservation::new();
        c.record_inflow(10).unwrap();
        c.record_outflow(4).unwrap();
        c.reverse_outflow(4);
        assert_eq!(c.held(), 10);
    }

    #[test]
    fn verify_allows_surplus() {
        let mut c = CustodyConservation::new();
        c.record_inflow(100).unwrap();
        assert!(c.verify(99).is_ok());
        assert!(c.verify(100).is_ok());
    }

    #[test]
    fn verify_fails_when_overpromised() {
        let mut c = CustodyConservation::new();
        c.record_inflow(100).unwrap();
        let err = c.verify(101).unwrap_err();
        assert!(matches!(
            err,
            MeterpayError::CustodyInvariantViolation { .. }
        ));
    }
}
