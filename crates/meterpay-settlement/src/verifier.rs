//! Signature verifier (secp256k1 ECDSA with public-key recovery).
//!
//! A commit is authorized by recovering the signer of the commit digest and
//! comparing it against the expected account. The digest is
//! `keccak256(session_id ‖ participant ‖ payee ‖ session_cost ‖ contract)`,
//! so a signature only ever authorizes one charge on one deployment.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use meterpay_types::{Address, MeterpayError, Result, SessionCommit, Signature};
use sha3::{Digest, Keccak256};

/// 32-byte Keccak-256 digest.
pub type Hash = [u8; 32];

// =============================================================================
// HASHING
// =============================================================================

#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Digest both parties sign for `commit`.
#[must_use]
pub fn commit_digest(commit: &SessionCommit) -> Hash {
    keccak256(&commit.signing_payload())
}

// =============================================================================
// RECOVERY
// =============================================================================

/// Account derived from a public key: the last 20 bytes of
/// `keccak256(uncompressed_point[1..])`.
#[must_use]
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}

/// Recover the account that produced `signature` over `digest`.
///
/// Both `s` and `n - s` are accepted. A high `s` is folded to its low form
/// with the recovery parity flipped, which names the same public key.
///
/// # Errors
/// Returns `MalformedSignature` if the recovery byte is not 0/1/27/28, the
/// scalars are out of range, or no curve point recovers.
pub fn recover_address(digest: &Hash, signature: &Signature) -> Result<Address> {
    let mut recovery_id = parse_recovery_id(signature.v)?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let mut sig =
        EcdsaSignature::from_slice(&rs).map_err(|_| MeterpayError::MalformedSignature)?;
    if let Some(low) = sig.normalize_s() {
        sig = low;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| MeterpayError::MalformedSignature)?;
    Ok(address_from_verifying_key(&key))
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(MeterpayError::MalformedSignature),
    };
    RecoveryId::try_from(id).map_err(|_| MeterpayError::MalformedSignature)
}

// =============================================================================
// VERIFIER
// =============================================================================

/// Checks that a digest was signed by a specific account.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    /// - `MalformedSignature` if nothing can be recovered
    /// - `SignatureInvalid` if the recovered account is not `expected`
    pub fn verify(
        &self,
        digest: &Hash,
        signature: &Signature,
        expected: Address,
        role: &str,
    ) -> Result<()> {
        let recovered = recover_address(digest, signature)?;
        if recovered != expected {
            return Err(MeterpayError::SignatureInvalid {
                reason: format!(
                    "{role} signature recovered {recovered}, expected {expected} (digest 0x{})",
                    hex::encode(digest)
                ),
            });
        }
        Ok(())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use k256::ecdsa::SigningKey;

    use super::{Hash, address_from_verifying_key};
    use meterpay_types::{Address, Signature};

    /// Fresh random key and its account.
    #[must_use]
    pub fn generate_key() -> (SigningKey, Address) {
        let key = SigningKey::random(&mut rand::thread_rng());
        let address = address_from_verifying_key(key.verifying_key());
        (key, address)
    }

    /// Sign a prehashed digest, returning `v` in the 27/28 form.
    #[must_use]
    pub fn sign(digest: &Hash, key: &SigningKey) -> Signature {
        let (sig, recid) = key
            .sign_prehash_recoverable(digest)
            .expect("signing a 32-byte digest cannot fail");
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Signature::new(recid.to_byte() + 27, r, s)
    }

    /// secp256k1 group order n.
    const ORDER: [u8; 32] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
        0x41, 0x41,
    ];

    /// `n - s`, the other valid `s` for the same `r`.
    #[must_use]
    pub fn negate_s(s: &[u8; 32]) -> [u8; 32] {
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = i16::from(ORDER[i]) - i16::from(s[i]) - borrow;
            borrow = i16::from(diff < 0);
            out[i] = u8::try_from(diff + 256 * borrow).expect("limb fits in a byte");
        }
        out
    }

    /// The high-S twin of a low-S signature: `(r, n - s)` with `v` flipped.
    #[must_use]
    pub fn high_s_form(sig: &Signature) -> Signature {
        let v = if sig.v == 27 { 28 } else { 27 };
        Signature::new(v, sig.r, negate_s(&sig.s))
    }
}
