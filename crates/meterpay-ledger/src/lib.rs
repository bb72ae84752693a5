//! # meterpay-ledger
//!
//! **Custody Plane**: per-participant deposits, the withdrawal timelock,
//! the platform fee vault, and the custody conservation invariant.
//!
//! ## Architecture
//!
//! Nothing in this crate moves value out of custody. Each component only
//! updates accounting and reports how much should leave; the settlement
//! facade performs the outbound transfer afterwards and calls the matching
//! `restore_*` method if that transfer fails.
//!
//! ## Withdrawal State Machine
//!
//! ```text
//! Idle ──init_withdraw──▶ Requested ──withdraw (delay elapsed)──▶ Idle
//! ```
//!
//! Deposits are only accepted in `Idle`.

pub mod custody;
pub mod deposits;
pub mod fee_vault;

pub use custody::CustodyConservation;
pub use deposits::{DepositLedger, WithdrawInfo, WithdrawOutcome, WithdrawRequest};
pub use fee_vault::FeeVault;
