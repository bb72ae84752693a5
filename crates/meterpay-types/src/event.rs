//! Observable events.
//!
//! Every state-changing call returns a [`Receipt`] listing the events it
//! emitted, in emission order. Failed calls emit nothing.

use serde::{Deserialize, Serialize};

use crate::{Address, SessionId, Timestamp, Wei};

/// An event emitted by a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    Deposit { who: Address, amount: Wei },
    WithdrawDeposit { who: Address, amount: Wei },
    Commit {
        participant: Address,
        payee: Address,
        session_cost: Wei,
        session_id: SessionId,
    },
    Payment { to: Address, amount: Wei },

    PlatformRateChangeInit { value: u8, requested_at: Timestamp },
    PlatformRateChangeCommit { value: u8 },
    WithdrawTimeLimitChangeInit { value: u64, requested_at: Timestamp },
    WithdrawTimeLimitChangeCommit { value: u64 },
    SignerChangeInit { value: Address, requested_at: Timestamp },
    SignerChangeCommit { value: Address },
    WalletChangeInit { value: Address, requested_at: Timestamp },
    WalletChangeCommit { value: Address },
    PlatformChangeInit { value: Address, requested_at: Timestamp },
    PlatformChangeCommit { value: Address },
}

impl LedgerEvent {
    /// Event name as it appears in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "Deposit",
            Self::WithdrawDeposit { .. } => "WithdrawDeposit",
            Self::Commit { .. } => "Commit",
            Self::Payment { .. } => "Payment",
            Self::PlatformRateChangeInit { .. } => "PlatformRateChangeInit",
            Self::PlatformRateChangeCommit { .. } => "PlatformRateChangeCommit",
            Self::WithdrawTimeLimitChangeInit { .. } => "WithdrawTimeLimitChangeInit",
            Self::WithdrawTimeLimitChangeCommit { .. } => "WithdrawTimeLimitChangeCommit",
            Self::SignerChangeInit { .. } => "SignerChangeInit",
            Self::SignerChangeCommit { .. } => "SignerChangeCommit",
            Self::WalletChangeInit { .. } => "WalletChangeInit",
            Self::WalletChangeCommit { .. } => "WalletChangeCommit",
            Self::PlatformChangeInit { .. } => "PlatformChangeInit",
            Self::PlatformChangeCommit { .. } => "PlatformChangeCommit",
        }
    }
}

/// Events emitted by one successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub events: Vec<LedgerEvent>,
}

impl Receipt {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(events: Vec<LedgerEvent>) -> Self {
        Self { events }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// First event with the given name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&LedgerEvent> {
        self.events.iter().find(|e| e.name() == name)
    }
}
