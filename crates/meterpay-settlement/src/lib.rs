//! # meterpay-settlement
//!
//! **Settlement Plane**: signature verification, cumulative session
//! commits, platform fee payout, and the [`SettlementContract`] facade that
//! ties the custody and governance planes together.
//!
//! ## Commit Flow
//!
//! A relayer submits a [`SessionCommit`](meterpay_types::SessionCommit)
//! carrying the session's new cumulative cost and two signatures over the
//! same digest (participant and platform signer). The contract:
//! 1. Checks the relayer role and the bound contract address
//! 2. Recovers both signers and compares them to the expected accounts
//! 3. Computes the increment over the previously charged cost
//! 4. Debits the increment, accrues the fee, records the new total
//! 5. Pays the payee through the [`TransferSink`]
//!
//! If step 5 fails, steps 3 and 4 are undone and nothing is emitted.

pub mod contract;
pub mod fee;
pub mod session;
pub mod sink;
pub mod verifier;

pub use contract::SettlementContract;
pub use fee::platform_fee;
pub use session::SessionBook;
pub use sink::{RecordingSink, Transfer, TransferSink};
pub use verifier::{SignatureVerifier, commit_digest, keccak256, recover_address};
