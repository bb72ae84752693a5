//! Error types for the MeterPay ledger.
//!
//! All errors use the `MP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Access errors
//! - 2xx: Funds errors
//! - 3xx: Signature errors
//! - 4xx: Session errors
//! - 5xx: Governance errors
//! - 6xx: Transfer errors
//! - 8xx: Safety errors
//! - 9xx: General / internal errors
//!
//! Every error aborts the whole operation: state is left exactly as it was
//! before the call.

use thiserror::Error;

use crate::{Address, Timestamp, Wei};

/// Central error enum for all MeterPay operations.
#[derive(Debug, Error)]
pub enum MeterpayError {
    // =================================================================
    // Access Errors (1xx)
    // =================================================================
    /// The caller does not hold the role the operation requires.
    #[error("MP_ERR_100: Access denied: caller {caller} is not the {role}")]
    AccessDenied { caller: Address, role: &'static str },

    // =================================================================
    // Funds Errors (2xx)
    // =================================================================
    /// The cumulative session cost is not covered by the live deposit.
    #[error("MP_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Wei, available: Wei },

    /// The participant has no deposit to withdraw.
    #[error("MP_ERR_201: No funds deposited")]
    NoFunds,

    /// Deposits are refused while a withdrawal is pending.
    #[error("MP_ERR_202: Withdrawal in progress")]
    WithdrawalInProgress,

    /// Deposits must carry a non-zero value.
    #[error("MP_ERR_203: Amount must be greater than zero")]
    ZeroAmount,

    /// A balance computation overflowed.
    #[error("MP_ERR_204: Arithmetic overflow")]
    ArithmeticOverflow,

    // =================================================================
    // Signature Errors (3xx)
    // =================================================================
    /// A signature recovered to the wrong address, or was bound to
    /// another contract instance.
    #[error("MP_ERR_300: Signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    /// The (v, r, s) components do not encode a recoverable signature.
    #[error("MP_ERR_301: Malformed signature")]
    MalformedSignature,

    // =================================================================
    // Session Errors (4xx)
    // =================================================================
    /// The commit does not raise the cumulative charge of the session.
    #[error("MP_ERR_400: Not charged: session cost {session_cost} <= already charged {already_charged}")]
    NotCharged { session_cost: Wei, already_charged: Wei },

    // =================================================================
    // Governance Errors (5xx)
    // =================================================================
    /// A proposed parameter value is outside its accepted bounds.
    #[error("MP_ERR_500: {parameter} value {value} out of range [{min}, {max}]")]
    OutOfRange {
        parameter: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// The proposal equals the current value, is the zero address, or there
    /// is nothing pending to commit.
    #[error("MP_ERR_501: No-op value for {parameter}: {reason}")]
    NoOpValue {
        parameter: &'static str,
        reason: &'static str,
    },

    /// A commit was attempted before the governance delay elapsed.
    #[error("MP_ERR_502: Timelock for {parameter} not elapsed: ready at {ready_at}, now {now}")]
    TimelockNotElapsed {
        parameter: &'static str,
        ready_at: Timestamp,
        now: Timestamp,
    },

    // =================================================================
    // Transfer Errors (6xx)
    // =================================================================
    /// The outbound value transfer was rejected by the sink.
    #[error("MP_ERR_600: Transfer of {amount} to {to} failed: {reason}")]
    TransferFailed {
        to: Address,
        amount: Wei,
        reason: String,
    },

    // =================================================================
    // Safety Errors (8xx)
    // =================================================================
    /// Accounting promises more value than is custodied.
    #[error("MP_ERR_800: Custody invariant violation: {reason}")]
    CustodyInvariantViolation { reason: String },

    /// An operation was entered from inside another in-flight operation.
    #[error("MP_ERR_801: Re-entrant call rejected")]
    ReentrantCall,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("MP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("MP_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("MP_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("MP_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MeterpayError>;

impl From<std::io::Error> for MeterpayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MeterpayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
