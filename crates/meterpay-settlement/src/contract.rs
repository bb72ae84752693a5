//! The ledger contract facade.
//!
//! `SettlementContract` owns all state and exposes every public operation.
//! Mutating operations are serialized by an operation lock and follow the
//! same shape:
//!
//! 1. validate against a snapshot of roles and balances
//! 2. mutate internal accounting
//! 3. release the state lock and hand any payout to the [`TransferSink`]
//! 4. if the payout fails, restore every mutated value and return the error
//!
//! A failed operation emits no events and leaves no trace in state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use meterpay_governance::{Governance, ParameterView, RoleRegistry};
use meterpay_ledger::{CustodyConservation, DepositLedger, FeeVault, WithdrawInfo, WithdrawOutcome};
use meterpay_types::{
    Address, Clock, LedgerConfig, LedgerEvent, MeterpayError, Receipt, Result, SessionCommit,
    SessionId, Timestamp, Wei, constants,
};

use crate::fee::platform_fee;
use crate::session::SessionBook;
use crate::sink::TransferSink;
use crate::verifier::{SignatureVerifier, commit_digest};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct ContractState {
    deposits: DepositLedger,
    fees: FeeVault,
    custody: CustodyConservation,
    sessions: SessionBook,
    governance: Governance,
}

/// Everything a commit changed before its payout, so it can be undone.
struct CommitEffects {
    participant: Address,
    session_id: SessionId,
    previous_cost: Wei,
    delta: Wei,
    fee: Wei,
    net: Wei,
    wallet: Address,
}

impl CommitEffects {
    fn undo(&self, state: &mut ContractState) -> Result<()> {
        state
            .sessions
            .restore(self.participant, self.session_id, self.previous_cost);
        state.custody.reverse_outflow(self.net);
        state.fees.reverse(self.wallet, self.fee);
        state.deposits.credit(self.participant, self.delta)
    }
}

// ---------------------------------------------------------------------------
// Operation guard
// ---------------------------------------------------------------------------

/// Held for the duration of one mutating call.
struct OpGuard<'a> {
    active: &'a Mutex<Option<ThreadId>>,
    _serial: MutexGuard<'a, ()>,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        *lock(self.active) = None;
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A single ledger instance.
pub struct SettlementContract {
    address: Address,
    state: Mutex<ContractState>,
    serial: Mutex<()>,
    active: Mutex<Option<ThreadId>>,
    verifier: SignatureVerifier,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TransferSink>,
}

impl SettlementContract {
    /// Create an instance from a configuration.
    ///
    /// # Errors
    /// Returns `Configuration` if the config fails validation.
    pub fn new(
        config: &LedgerConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn TransferSink>,
    ) -> Result<Self> {
        let governance = Governance::from_config(config)?;
        tracing::info!(
            ledger = constants::LEDGER_NAME,
            version = constants::VERSION,
            contract = %config.contract_address,
            platform = %config.platform,
            relayers = config.relayers.len(),
            "ledger instance created"
        );
        Ok(Self {
            address: config.contract_address,
            state: Mutex::new(ContractState {
                deposits: DepositLedger::new(),
                fees: FeeVault::new(),
                custody: CustodyConservation::new(),
                sessions: SessionBook::new(),
                governance,
            }),
            serial: Mutex::new(()),
            active: Mutex::new(None),
            verifier: SignatureVerifier::new(),
            clock,
            sink,
        })
    }

    /// Run a mutating operation under the operation lock.
    fn run<R>(&self, op: &'static str, body: impl FnOnce() -> Result<R>) -> Result<R> {
        let me = thread::current().id();
        if *lock(&self.active) == Some(me) {
            tracing::warn!(op, "re-entrant call rejected");
            return Err(MeterpayError::ReentrantCall);
        }
        let _guard = OpGuard {
            active: &self.active,
            _serial: lock(&self.serial),
        };
        *lock(&self.active) = Some(me);

        body().inspect_err(|err| tracing::debug!(op, %err, "operation rejected"))
    }

    fn pay_out(&self, to: Address, amount: Wei) -> Result<()> {
        self.sink.transfer(to, amount).map_err(|err| match err {
            MeterpayError::TransferFailed { .. } => err,
            other => MeterpayError::TransferFailed {
                to,
                amount,
                reason: other.to_string(),
            },
        })
    }

    // =======================================================================
    // Ledger
    // =======================================================================

    /// Credit `amount` to the caller's deposit.
    ///
    /// # Errors
    /// - `ZeroAmount` for a zero deposit
    /// - `WithdrawalInProgress` while the caller has an active request
    pub fn deposit(&self, caller: Address, amount: Wei) -> Result<Receipt> {
        self.run("deposit", || {
            let mut state = lock(&self.state);
            let balance = state.deposits.deposit(caller, amount)?;
            if let Err(err) = state.custody.record_inflow(amount) {
                state.deposits.debit(caller, amount)?;
                return Err(err);
            }
            tracing::info!(who = %caller, amount, balance, "deposit");
            Ok(Receipt::with(vec![LedgerEvent::Deposit {
                who: caller,
                amount,
            }]))
        })
    }

    /// Start the caller's withdrawal timer. Emits nothing.
    ///
    /// # Errors
    /// Returns `NoFunds` if the caller has no deposit.
    pub fn init_withdraw(&self, caller: Address) -> Result<Receipt> {
        self.run("init_withdraw", || {
            let now = self.clock.now();
            lock(&self.state).deposits.init_withdraw(caller, now)?;
            tracing::info!(who = %caller, requested_at = now, "withdrawal requested");
            Ok(Receipt::empty())
        })
    }

    /// Pay out `participant`'s whole deposit once their request has matured.
    ///
    /// Anyone may trigger it. Before the delay elapses, or with no active
    /// request, the call succeeds with an empty receipt and changes nothing.
    /// A matured request completes even if commits have since drained the
    /// deposit; the receipt then reports a zero withdrawal.
    ///
    /// # Errors
    /// - `NoFunds` if the participant has no deposit and no active request
    /// - `TransferFailed` if the payout is refused (state is restored)
    pub fn withdraw(&self, caller: Address, participant: Address) -> Result<Receipt> {
        self.run("withdraw", || {
            let now = self.clock.now();
            let (amount, prior) = {
                let mut state = lock(&self.state);
                let limit = *state.governance.withdraw_time_limit().current();
                match state.deposits.withdraw(participant, now, limit)? {
                    WithdrawOutcome::NotReady => {
                        tracing::debug!(who = %participant, now, "withdrawal not ready");
                        return Ok(Receipt::empty());
                    }
                    WithdrawOutcome::Released { amount, prior } => {
                        if let Err(err) = state.custody.record_outflow(amount) {
                            state.deposits.restore_withdrawal(participant, amount, prior);
                            return Err(err);
                        }
                        (amount, prior)
                    }
                }
            };

            if let Err(err) = self.pay_out(participant, amount) {
                let mut state = lock(&self.state);
                state.custody.reverse_outflow(amount);
                state.deposits.restore_withdrawal(participant, amount, prior);
                return Err(err);
            }

            tracing::info!(who = %participant, by = %caller, amount, "deposit withdrawn");
            Ok(Receipt::with(vec![LedgerEvent::WithdrawDeposit {
                who: participant,
                amount,
            }]))
        })
    }

    // =======================================================================
    // Session settlement
    // =======================================================================

    /// Charge a session up to its new cumulative cost.
    ///
    /// Only the increment over the previously committed cost is debited.
    /// The payee receives the increment minus the platform fee; the fee
    /// accrues to the current wallet's pool.
    ///
    /// # Errors
    /// In check order:
    /// - `AccessDenied` unless the caller is a relayer
    /// - `SignatureInvalid` if the commit is bound to another contract or
    ///   either signature recovers the wrong account
    /// - `MalformedSignature` if a signature cannot be recovered at all
    /// - `NotCharged` if the cost does not exceed what is already charged
    /// - `InsufficientFunds` if the cumulative cost exceeds the deposit
    /// - `TransferFailed` if the payee refuses payment (state is restored)
    pub fn commit(&self, caller: Address, commit: &SessionCommit) -> Result<Receipt> {
        self.run("commit", || {
            let effects = {
                let mut state = lock(&self.state);
                let effects = self.validate_commit(&state, caller, commit)?;
                Self::apply_commit(&mut state, &effects, commit.session_cost)?;
                effects
            };

            if let Err(err) = self.pay_out(commit.payee, effects.net) {
                effects.undo(&mut lock(&self.state))?;
                return Err(err);
            }

            tracing::info!(
                participant = %commit.participant,
                payee = %commit.payee,
                session = %commit.session_id,
                session_cost = commit.session_cost,
                delta = effects.delta,
                fee = effects.fee,
                "session committed"
            );
            Ok(Receipt::with(vec![
                LedgerEvent::Commit {
                    participant: commit.participant,
                    payee: commit.payee,
                    session_cost: commit.session_cost,
                    session_id: commit.session_id,
                },
                LedgerEvent::Payment {
                    to: commit.payee,
                    amount: effects.net,
                },
            ]))
        })
    }

    fn validate_commit(
        &self,
        state: &ContractState,
        caller: Address,
        commit: &SessionCommit,
    ) -> Result<CommitEffects> {
        let roles = state.governance.roles();
        roles.require_relayer(caller)?;

        if commit.bound_contract != self.address {
            return Err(MeterpayError::SignatureInvalid {
                reason: format!(
                    "commit bound to {}, this contract is {}",
                    commit.bound_contract, self.address
                ),
            });
        }

        let digest = commit_digest(commit);
        self.verifier.verify(
            &digest,
            &commit.participant_sig,
            commit.participant,
            "participant",
        )?;
        self.verifier
            .verify(&digest, &commit.platform_sig, roles.signer, "platform")?;

        let delta = state
            .sessions
            .delta(commit.participant, commit.session_id, commit.session_cost)?;

        let available = state.deposits.balance(commit.participant);
        if commit.session_cost > available {
            return Err(MeterpayError::InsufficientFunds {
                needed: commit.session_cost,
                available,
            });
        }

        let fee = platform_fee(delta, *state.governance.platform_rate().current())?;
        Ok(CommitEffects {
            participant: commit.participant,
            session_id: commit.session_id,
            previous_cost: state
                .sessions
                .charged(commit.participant, commit.session_id),
            delta,
            fee,
            net: delta - fee,
            wallet: roles.wallet,
        })
    }

    fn apply_commit(
        state: &mut ContractState,
        effects: &CommitEffects,
        session_cost: Wei,
    ) -> Result<()> {
        state.deposits.debit(effects.participant, effects.delta)?;
        if let Err(err) = state.fees.accrue(effects.wallet, effects.fee) {
            state.deposits.credit(effects.participant, effects.delta)?;
            return Err(err);
        }
        if let Err(err) = state.custody.record_outflow(effects.net) {
            state.fees.reverse(effects.wallet, effects.fee);
            state.deposits.credit(effects.participant, effects.delta)?;
            return Err(err);
        }
        state
            .sessions
            .record(effects.participant, effects.session_id, session_cost);
        Ok(())
    }

    // =======================================================================
    // Fee vault
    // =======================================================================

    /// Pay the current wallet everything accrued to it, even if that is zero.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `TransferFailed` if the wallet refuses payment (state is restored)
    pub fn pay_platform(&self, caller: Address) -> Result<Receipt> {
        self.run("pay_platform", || {
            let (wallet, amount) = {
                let mut state = lock(&self.state);
                let roles = state.governance.roles();
                roles.require_platform(caller)?;
                let amount = state.fees.take(roles.wallet);
                if let Err(err) = state.custody.record_outflow(amount) {
                    state.fees.restore(roles.wallet, amount);
                    return Err(err);
                }
                (roles.wallet, amount)
            };

            if let Err(err) = self.pay_out(wallet, amount) {
                let mut state = lock(&self.state);
                state.custody.reverse_outflow(amount);
                state.fees.restore(wallet, amount);
                return Err(err);
            }

            tracing::info!(%wallet, amount, "platform fees paid");
            Ok(Receipt::with(vec![LedgerEvent::Payment { to: wallet, amount }]))
        })
    }

    // =======================================================================
    // Governance
    // =======================================================================

    fn govern(
        &self,
        op: &'static str,
        change: impl FnOnce(&mut Governance, Timestamp) -> Result<LedgerEvent>,
    ) -> Result<Receipt> {
        self.run(op, || {
            let now = self.clock.now();
            let event = change(&mut lock(&self.state).governance, now)?;
            tracing::info!(op, event = event.name(), "governance change");
            Ok(Receipt::with(vec![event]))
        })
    }

    /// Propose a new platform fee rate, in percent.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `OutOfRange` if `rate` exceeds 100
    /// - `NoOpValue` if `rate` equals the current rate
    pub fn init_platform_rate(&self, caller: Address, rate: u8) -> Result<Receipt> {
        self.govern("init_platform_rate", |g, now| {
            g.init_platform_rate(caller, rate, now)
        })
    }

    /// Apply the pending fee rate once the platform action delay has passed.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` if nothing is pending
    /// - `TimelockNotElapsed` if the delay has not passed
    pub fn commit_platform_rate(&self, caller: Address) -> Result<Receipt> {
        self.govern("commit_platform_rate", |g, now| {
            g.commit_platform_rate(caller, now)
        })
    }

    /// Propose a new withdrawal delay, in seconds.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `OutOfRange` if `limit` is outside the allowed bounds
    /// - `NoOpValue` if `limit` equals the current delay
    pub fn init_withdraw_time_limit(&self, caller: Address, limit: u64) -> Result<Receipt> {
        self.govern("init_withdraw_time_limit", |g, now| {
            g.init_withdraw_time_limit(caller, limit, now)
        })
    }

    /// Apply the pending withdrawal delay. Requests already running are
    /// measured against the new value from then on.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` if nothing is pending
    /// - `TimelockNotElapsed` if the delay has not passed
    pub fn commit_withdraw_time_limit(&self, caller: Address) -> Result<Receipt> {
        self.govern("commit_withdraw_time_limit", |g, now| {
            g.commit_withdraw_time_limit(caller, now)
        })
    }

    /// Propose a new platform signer for session commits.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` for the zero address or the current signer
    pub fn init_signer(&self, caller: Address, signer: Address) -> Result<Receipt> {
        self.govern("init_signer", |g, now| g.init_signer(caller, signer, now))
    }

    /// Rotate to the pending signer.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` if nothing is pending
    /// - `TimelockNotElapsed` if the delay has not passed
    pub fn commit_signer(&self, caller: Address) -> Result<Receipt> {
        self.govern("commit_signer", |g, now| g.commit_signer(caller, now))
    }

    /// Propose a new wallet to receive platform fees.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` for the zero address or the current wallet
    pub fn init_wallet(&self, caller: Address, wallet: Address) -> Result<Receipt> {
        self.govern("init_wallet", |g, now| g.init_wallet(caller, wallet, now))
    }

    /// Switch fee accrual to the pending wallet. Fees already accrued stay
    /// with the previous wallet.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` if nothing is pending
    /// - `TimelockNotElapsed` if the delay has not passed
    pub fn commit_wallet(&self, caller: Address) -> Result<Receipt> {
        self.govern("commit_wallet", |g, now| g.commit_wallet(caller, now))
    }

    /// Propose handing the platform role to another account.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the platform
    /// - `NoOpValue` for the zero address or the current platform
    pub fn init_platform(&self, caller: Address, platform: Address) -> Result<Receipt> {
        self.govern("init_platform", |g, now| {
            g.init_platform(caller, platform, now)
        })
    }

    /// Complete a platform handover. Must be called by the pending platform
    /// itself.
    ///
    /// # Errors
    /// - `AccessDenied` unless the caller is the pending platform
    /// - `NoOpValue` if nothing is pending
    /// - `TimelockNotElapsed` if the delay has not passed
    pub fn commit_platform(&self, caller: Address) -> Result<Receipt> {
        self.govern("commit_platform", |g, now| g.commit_platform(caller, now))
    }

    // =======================================================================
    // Views
    // =======================================================================

    /// This instance's own address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Raw deposit, ignoring any pending withdrawal.
    #[must_use]
    pub fn deposit_of(&self, who: Address) -> Wei {
        lock(&self.state).deposits.balance(who)
    }

    /// Spendable deposit: zero while a withdrawal is pending.
    #[must_use]
    pub fn get_deposit(&self, who: Address) -> Wei {
        lock(&self.state).deposits.get_deposit(who)
    }

    #[must_use]
    pub fn get_withdraw_info(&self, who: Address) -> WithdrawInfo {
        lock(&self.state).deposits.withdraw_info(who)
    }

    /// Cumulative amount already charged for a session.
    #[must_use]
    pub fn get_participant_payment(&self, who: Address, session_id: SessionId) -> Wei {
        lock(&self.state).sessions.charged(who, session_id)
    }

    #[must_use]
    pub fn fee_pool(&self, wallet: Address) -> Wei {
        lock(&self.state).fees.pool(wallet)
    }

    /// Value currently custodied.
    #[must_use]
    pub fn held(&self) -> Wei {
        lock(&self.state).custody.held()
    }

    #[must_use]
    pub fn roles(&self) -> RoleRegistry {
        lock(&self.state).governance.roles()
    }

    #[must_use]
    pub fn platform_rate(&self) -> u8 {
        *lock(&self.state).governance.platform_rate().current()
    }

    #[must_use]
    pub fn withdraw_time_limit(&self) -> u64 {
        *lock(&self.state).governance.withdraw_time_limit().current()
    }

    #[must_use]
    pub fn signer(&self) -> Address {
        *lock(&self.state).governance.signer().current()
    }

    #[must_use]
    pub fn wallet(&self) -> Address {
        *lock(&self.state).governance.wallet().current()
    }

    #[must_use]
    pub fn platform(&self) -> Address {
        *lock(&self.state).governance.platform().current()
    }

    #[must_use]
    pub fn platform_action_time_limit(&self) -> u64 {
        lock(&self.state).governance.platform_action_time_limit()
    }

    #[must_use]
    pub fn platform_rate_param(&self) -> ParameterView<u8> {
        lock(&self.state).governance.platform_rate().view()
    }

    #[must_use]
    pub fn withdraw_time_limit_param(&self) -> ParameterView<u64> {
        lock(&self.state).governance.withdraw_time_limit().view()
    }

    #[must_use]
    pub fn signer_param(&self) -> ParameterView<Address> {
        lock(&self.state).governance.signer().view()
    }

    #[must_use]
    pub fn wallet_param(&self) -> ParameterView<Address> {
        lock(&self.state).governance.wallet().view()
    }

    #[must_use]
    pub fn platform_param(&self) -> ParameterView<Address> {
        lock(&self.state).governance.platform().view()
    }

    /// Check that deposits plus fee pools are covered by custodied value.
    ///
    /// # Errors
    /// Returns `CustodyInvariantViolation` if they are not.
    pub fn verify_custody(&self) -> Result<()> {
        let state = lock(&self.state);
        let liabilities = state
            .deposits
            .total()
            .zip(state.fees.total())
            .and_then(|(deposits, fees)| deposits.checked_add(fees))
            .ok_or(MeterpayError::ArithmeticOverflow)?;
        state.custody.verify(liabilities)?;
        tracing::debug!(
            liabilities,
            inflows = state.custody.total_inflows(),
            outflows = state.custody.total_outflows(),
            "custody verified"
        );
        Ok(())
    }
}
