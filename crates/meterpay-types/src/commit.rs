//! Session commit model.
//!
//! A commit carries the *cumulative* cost of a session so far. Both the
//! participant and the platform signer sign the same digest over
//! `(session_id, participant, payee, session_cost, contract_address)`;
//! binding the contract address keeps a signature from being replayed
//! against another deployment.

use serde::{Deserialize, Serialize};

use crate::{Address, SessionId, Wei};

/// One recoverable secp256k1 signature, split into its three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Recovery byte: 27/28, or the raw 0/1 form.
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Signature {
    #[must_use]
    pub fn new(v: u8, r: [u8; 32], s: [u8; 32]) -> Self {
        Self { v, r, s }
    }

    /// Parse the 65-byte `r || s || v` form.
    #[must_use]
    pub fn from_rsv(bytes: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self { v: bytes[64], r, s }
    }
}

/// The full argument set of a session commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCommit {
    /// Account being charged.
    pub participant: Address,
    /// Recipient of the net charge.
    pub payee: Address,
    /// New cumulative cost of the session (not a delta).
    pub session_cost: Wei,
    pub session_id: SessionId,
    /// Contract address the signers bound the charge to.
    pub bound_contract: Address,
    /// Participant's signature over the digest.
    pub participant_sig: Signature,
    /// Platform signer's signature over the same digest.
    pub platform_sig: Signature,
}

impl SessionCommit {
    /// Packed pre-image of the signed digest: `int256 ‖ address ‖ address ‖
    /// int256 ‖ address`, 124 bytes.
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        signing_payload(
            self.session_id,
            self.participant,
            self.payee,
            self.session_cost,
            self.bound_contract,
        )
    }
}

/// Packed pre-image for the given commit fields.
#[must_use]
pub fn signing_payload(
    session_id: SessionId,
    participant: Address,
    payee: Address,
    session_cost: Wei,
    contract: Address,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(124);
    payload.extend_from_slice(&session_id.to_word());
    payload.extend_from_slice(participant.as_bytes());
    payload.extend_from_slice(payee.as_bytes());
    payload.extend_from_slice(&crate::u128_word(session_cost));
    payload.extend_from_slice(contract.as_bytes());
    payload
}
