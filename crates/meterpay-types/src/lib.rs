//! # meterpay-types
//!
//! Shared types, errors, and configuration for the **MeterPay** ledger.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`SessionId`], [`Wei`], [`Timestamp`]
//! - **Commit model**: [`Signature`], [`SessionCommit`]
//! - **Events**: [`LedgerEvent`], [`Receipt`]
//! - **Configuration**: [`LedgerConfig`]
//! - **Time**: [`Clock`], [`SystemClock`]
//! - **Errors**: [`MeterpayError`] with `MP_ERR_` prefix codes
//! - **Constants**: governance bounds and defaults

pub mod clock;
pub mod commit;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;

pub use clock::*;
pub use commit::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;

// Constants are accessed via `meterpay_types::constants::FOO`
// (not re-exported to avoid name collisions).
