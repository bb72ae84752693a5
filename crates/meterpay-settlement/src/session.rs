//! Cumulative per-session charges.
//!
//! Each commit carries the new *total* cost of a session. The book stores
//! what has already been charged for every `(participant, session)` pair and
//! hands back only the increment, so replaying an old commit charges nothing.

use std::collections::HashMap;

use meterpay_types::{Address, MeterpayError, Result, SessionId, Wei};

/// Amount already charged per `(participant, session)`.
#[derive(Debug, Default)]
pub struct SessionBook {
    charged: HashMap<(Address, SessionId), Wei>,
}

impl SessionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn charged(&self, participant: Address, session_id: SessionId) -> Wei {
        self.charged
            .get(&(participant, session_id))
            .copied()
            .unwrap_or(0)
    }

    /// Increment `session_cost` adds over what is already recorded.
    ///
    /// # Errors
    /// Returns `NotCharged` unless `session_cost` is strictly greater.
    pub fn delta(
        &self,
        participant: Address,
        session_id: SessionId,
        session_cost: Wei,
    ) -> Result<Wei> {
        let already_charged = self.charged(participant, session_id);
        if session_cost <= already_charged {
            return Err(MeterpayError::NotCharged {
                session_cost,
                already_charged,
            });
        }
        Ok(session_cost - already_charged)
    }

    /// Record a new cumulative total. Returns the previous one for rollback.
    pub fn record(&mut self, participant: Address, session_id: SessionId, session_cost: Wei) -> Wei {
        self.charged
            .insert((participant, session_id), session_cost)
            .unwrap_or(0)
    }

    /// Put back the total returned by [`record`](Self::record).
    pub fn restore(&mut self, participant: Address, session_id: SessionId, previous: Wei) {
        if previous == 0 {
            self.charged.remove(&(participant, session_id));
        } else {
            self.charged.insert((participant, session_id), previous);
        }
    }
}
