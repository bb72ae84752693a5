//! Participant deposits and the withdrawal timelock.
//!
//! A participant exits in two steps: `init_withdraw` starts the timer and
//! locks the deposit, and `withdraw` releases the full balance once the
//! configured delay has passed. Calling `withdraw` early is a silent no-op,
//! not an error.

use std::collections::HashMap;

use meterpay_types::{Address, MeterpayError, Result, Timestamp, Wei};

/// Per-participant withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WithdrawRequest {
    pub initiated: bool,
    pub requested_at: Timestamp,
}

/// View returned by [`DepositLedger::withdraw_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawInfo {
    /// Raw deposit, i.e. what a withdrawal would pay out.
    pub amount_to_withdraw: Wei,
    pub initiated: bool,
    pub requested_at: Timestamp,
}

/// Result of a `withdraw` attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    /// No active request, or the delay has not elapsed. Nothing changed.
    NotReady,
    /// The deposit was zeroed; `amount` must now leave custody.
    Released {
        amount: Wei,
        /// Request as it was before release, for rollback.
        prior: WithdrawRequest,
    },
}

/// Deposit balances and withdrawal requests, keyed by participant.
#[derive(Debug, Default)]
pub struct DepositLedger {
    deposits: HashMap<Address, Wei>,
    requests: HashMap<Address, WithdrawRequest>,
}

impl DepositLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a deposit. Returns the new raw balance.
    ///
    /// # Errors
    /// - `ZeroAmount` if `amount` is zero
    /// - `WithdrawalInProgress` if the participant has an active request
    /// - `ArithmeticOverflow` if the balance would overflow
    pub fn deposit(&mut self, who: Address, amount: Wei) -> Result<Wei> {
        if amount == 0 {
            return Err(MeterpayError::ZeroAmount);
        }
        if self.withdraw_request(who).initiated {
            return Err(MeterpayError::WithdrawalInProgress);
        }
        let entry = self.deposits.entry(who).or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or(MeterpayError::ArithmeticOverflow)?;
        Ok(*entry)
    }

    /// Start the withdrawal timer. No value moves.
    ///
    /// Calling it again while a request is active restarts the timer.
    ///
    /// # Errors
    /// Returns `NoFunds` if the participant's deposit is zero.
    pub fn init_withdraw(&mut self, who: Address, now: Timestamp) -> Result<()> {
        if self.balance(who) == 0 {
            return Err(MeterpayError::NoFunds);
        }
        self.requests.insert(
            who,
            WithdrawRequest {
                initiated: true,
                requested_at: now,
            },
        );
        Ok(())
    }

    /// Release the full deposit if the request has matured.
    ///
    /// On release the request is cleared and its `requested_at` is set to
    /// the `time_limit` in force, which is the value observers expect to read
    /// back after a completed withdrawal.
    ///
    /// A matured request whose deposit was fully charged in the meantime
    /// still completes, releasing zero, so the account returns to idle.
    ///
    /// # Errors
    /// Returns `NoFunds` if no request is active and the deposit is zero.
    pub fn withdraw(
        &mut self,
        who: Address,
        now: Timestamp,
        time_limit: u64,
    ) -> Result<WithdrawOutcome> {
        let amount = self.balance(who);
        let prior = self.withdraw_request(who);
        if !prior.initiated {
            if amount == 0 {
                return Err(MeterpayError::NoFunds);
            }
            return Ok(WithdrawOutcome::NotReady);
        }
        if now < prior.requested_at.saturating_add(time_limit) {
            return Ok(WithdrawOutcome::NotReady);
        }

        self.deposits.insert(who, 0);
        self.requests.insert(
            who,
            WithdrawRequest {
                initiated: false,
                requested_at: time_limit,
            },
        );
        Ok(WithdrawOutcome::Released { amount, prior })
    }

    /// Undo a released withdrawal whose payout could not be delivered.
    pub fn restore_withdrawal(&mut self, who: Address, amount: Wei, prior: WithdrawRequest) {
        self.deposits.insert(who, amount);
        self.requests.insert(who, prior);
    }

    /// Charge a participant.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if `amount` exceeds the raw balance.
    pub fn debit(&mut self, who: Address, amount: Wei) -> Result<()> {
        let available = self.balance(who);
        if available < amount {
            return Err(MeterpayError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        self.deposits.insert(who, available - amount);
        Ok(())
    }

    /// Return a previously debited amount.
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the balance would overflow.
    pub fn credit(&mut self, who: Address, amount: Wei) -> Result<()> {
        let entry = self.deposits.entry(who).or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or(MeterpayError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Raw deposit, regardless of any pending withdrawal.
    #[must_use]
    pub fn balance(&self, who: Address) -> Wei {
        self.deposits.get(&who).copied().unwrap_or(0)
    }

    /// Spendable deposit: zero while a withdrawal is pending.
    #[must_use]
    pub fn get_deposit(&self, who: Address) -> Wei {
        if self.withdraw_request(who).initiated {
            0
        } else {
            self.balance(who)
        }
    }

    #[must_use]
    pub fn withdraw_request(&self, who: Address) -> WithdrawRequest {
        self.requests.get(&who).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn withdraw_info(&self, who: Address) -> WithdrawInfo {
        let request = self.withdraw_request(who);
        WithdrawInfo {
            amount_to_withdraw: self.balance(who),
            initiated: request.initiated,
            requested_at: request.requested_at,
        }
    }

    /// Sum of every raw deposit, or `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<Wei> {
        self.deposits
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 600;

    fn alice() -> Address {
        Address([0xA1; 20])
    }

    #[test]
    fn deposit_credits_balance() {
        let mut ledger = DepositLedger::new();
        assert_eq!(ledger.deposit(alice(), 5_000).unwrap(), 5_000);
        assert_eq!(ledger.deposit(alice(), 1_000).unwrap(), 6_000);
        assert_eq!(ledger.balance(alice()), 6_000);
        assert_eq!(ledger.get_deposit(alice()), 6_000);
    }

    #[test]
    fn zero_deposit_rejected() {
        let mut ledger = DepositLedger::new();
        let err = ledger.deposit(alice(), 0).unwrap_err();
        assert!(matches!(err, MeterpayError::ZeroAmount));
    }

    #[test]
    fn deposit_overflow_rejected() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), Wei::MAX).unwrap();
        let err = ledger.deposit(alice(), 1).unwrap_err();
        assert!(matches!(err, MeterpayError::ArithmeticOverflow));
        assert_eq!(ledger.balance(alice()), Wei::MAX);
    }

    #[test]
    fn init_withdraw_requires_funds() {
        let mut ledger = DepositLedger::new();
        let err = ledger.init_withdraw(alice(), 10).unwrap_err();
        assert!(matches!(err, MeterpayError::NoFunds));
        assert_eq!(ledger.withdraw_request(alice()), WithdrawRequest::default());
    }

    #[test]
    fn pending_withdrawal_locks_deposit() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 5_000).unwrap();
        ledger.init_withdraw(alice(), 100).unwrap();

        assert_eq!(ledger.get_deposit(alice()), 0);
        assert_eq!(ledger.balance(alice()), 5_000);
        let info = ledger.withdraw_info(alice());
        assert_eq!(info.amount_to_withdraw, 5_000);
        assert!(info.initiated);
        assert_eq!(info.requested_at, 100);

        let err = ledger.deposit(alice(), 1).unwrap_err();
        assert!(matches!(err, MeterpayError::WithdrawalInProgress));
    }

    #[test]
    fn early_withdraw_is_noop() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 5_000).unwrap();
        ledger.init_withdraw(alice(), 100).unwrap();

        let outcome = ledger.withdraw(alice(), 100 + LIMIT - 1, LIMIT).unwrap();
        assert_eq!(outcome, WithdrawOutcome::NotReady);
        assert_eq!(ledger.balance(alice()), 5_000);
        assert!(ledger.withdraw_request(alice()).initiated);
    }

    #[test]
    fn withdraw_without_request_is_noop() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 5_000).unwrap();
        let outcome = ledger.withdraw(alice(), 1_000_000, LIMIT).unwrap();
        assert_eq!(outcome, WithdrawOutcome::NotReady);
        assert_eq!(ledger.balance(alice()), 5_000);
    }

    #[test]
    fn withdraw_of_empty_account_fails() {
        let mut ledger = DepositLedger::new();
        let err = ledger.withdraw(alice(), 0, LIMIT).unwrap_err();
        assert!(matches!(err, MeterpayError::NoFunds));
    }

    #[test]
    fn matured_withdraw_releases_everything() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 5_000).unwrap();
        ledger.init_withdraw(alice(), 100).unwrap();

        let outcome = ledger.withdraw(alice(), 100 + LIMIT, LIMIT).unwrap();
        assert_eq!(
            outcome,
            WithdrawOutcome::Released {
                amount: 5_000,
                prior: WithdrawRequest {
                    initiated: true,
                    requested_at: 100
                }
            }
        );
        assert_eq!(ledger.balance(alice()), 0);
        let info = ledger.withdraw_info(alice());
        assert!(!info.initiated);
        assert_eq!(info.requested_at, LIMIT);

        // Back to Idle: deposits accepted again.
        ledger.deposit(alice(), 10).unwrap();
    }

    #[test]
    fn drained_request_still_completes() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 1_000).unwrap();
        ledger.init_withdraw(alice(), 100).unwrap();
        ledger.debit(alice(), 1_000).unwrap();

        let outcome = ledger.withdraw(alice(), 100 + LIMIT - 1, LIMIT).unwrap();
        assert_eq!(outcome, WithdrawOutcome::NotReady);

        let outcome = ledger.withdraw(alice(), 100 + LIMIT, LIMIT).unwrap();
        assert_eq!(
            outcome,
            WithdrawOutcome::Released {
                amount: 0,
                prior: WithdrawRequest {
                    initiated: true,
                    requested_at: 100
                }
            }
        );
        assert_eq!(
            ledger.withdraw_request(alice()),
            WithdrawRequest {
                initiated: false,
                requested_at: LIMIT
            }
        );

        ledger.deposit(alice(), 10).unwrap();
        ledger.init_withdraw(alice(), 200).unwrap();
    }

    #[test]
    fn restore_withdrawal_undoes_release() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 5_000).unwrap();
        ledger.init_withdraw(alice(), 100).unwrap();
        let WithdrawOutcome::Released { amount, prior } =
            ledger.withdraw(alice(), 10_000, LIMIT).unwrap()
        else {
            panic!("expected release");
        };
        ledger.restore_withdrawal(alice(), amount, prior);
        assert_eq!(ledger.balance(alice()), 5_000);
        assert_eq!(ledger.withdraw_request(alice()), prior);
    }

    #[test]
    fn debit_and_credit() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 1_000).unwrap();
        ledger.debit(alice(), 400).unwrap();
        assert_eq!(ledger.balance(alice()), 600);

        let err = ledger.debit(alice(), 601).unwrap_err();
        assert!(matches!(
            err,
            MeterpayError::InsufficientFunds {
                needed: 601,
                available: 600
            }
        ));

        ledger.credit(alice(), 400).unwrap();
        assert_eq!(ledger.balance(alice()), 1_000);
    }

    #[test]
    fn total_sums_all_participants() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), 1_000).unwrap();
        ledger.deposit(Address([0xB2; 20]), 500).unwrap();
        assert_eq!(ledger.total(), Some(1_500));
    }
}
