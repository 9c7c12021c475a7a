//! Hashing, signing, and key derivation primitives.
//!
//! Hashing uses BLAKE2b truncated to 256 bits; signing uses Ed25519.
//! `verify` never panics — malformed keys or signatures simply fail to
//! verify, mirroring `obscura_core::ledger::Ledger::validate_tx`'s
//! `map_err(|_| "bad signature")` pattern, generalized into a `bool`
//! return as the spec requires.

use blake2::Blake2b;
use blake2::digest::consts::U32;
use blake2::digest::Digest;
use ed25519_dalek::{Keypair as DalekKeypair, PublicKey as DalekPublicKey, Signature as DalekSignature, Signer};
use serde::{Deserialize, Serialize};

use crate::encoding::Encode;
use crate::types::hash::{Hash, HASH_LEN};

type Blake2b256 = Blake2b<U32>;

/// Length in bytes of a public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Length in bytes of a signature.
pub const SIGNATURE_LEN: usize = 64;
/// Length in bytes of the concatenated expanded secret-key form
/// (32-byte seed || 32-byte public key), matching `ed25519_dalek::Keypair::to_bytes`.
pub const SECRET_KEY_LEN: usize = 64;

/// Computes the BLAKE2b-256 hash of `bytes`.
pub fn hash(bytes: &[u8]) -> Hash {
    let digest = Blake2b256::digest(bytes);
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// Concatenates the canonical encodings of `items` and hashes the result.
pub fn hash_all<T: Encode>(items: &[T]) -> Hash {
    let mut buf = Vec::new();
    for item in items {
        item.encode(&mut buf);
    }
    hash(&buf)
}

/// Hashes a single `Encode`-able value via its canonical encoding.
pub fn hash_object<T: Encode>(item: &T) -> Hash {
    hash(&item.encode_to_vec())
}

/// Ed25519 public key, 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// Ed25519 signature, 64 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Concatenated expanded Ed25519 secret key (seed || public key), 64 bytes.
///
/// Deliberately not `Debug`/`Serialize`: secret material should never be
/// logged or placed on the JSON surface by accident.
#[derive(Clone, Copy)]
pub struct SecretKey(pub [u8; SECRET_KEY_LEN]);

/// Deterministically derives an Ed25519 keypair from 32 bytes of entropy.
///
/// The same entropy always yields the same keypair; callers are
/// responsible for sourcing genuinely unpredictable entropy when that
/// matters (wallet seed generation is out of scope for this crate).
pub fn generate_keypair(entropy: [u8; 32]) -> (SecretKey, PublicKey) {
    let secret = ed25519_dalek::SecretKey::from_bytes(&entropy)
        .expect("a 32-byte array is always a valid ed25519 secret key seed");
    let public = DalekPublicKey::from(&secret);
    let keypair = DalekKeypair { secret, public };

    let mut secret_bytes = [0u8; SECRET_KEY_LEN];
    secret_bytes.copy_from_slice(&keypair.to_bytes());
    let mut public_bytes = [0u8; PUBLIC_KEY_LEN];
    public_bytes.copy_from_slice(public.as_bytes());

    (SecretKey(secret_bytes), PublicKey(public_bytes))
}

/// Signs `hash` with `secret`, returning a 64-byte Ed25519 signature.
pub fn sign(hash: &Hash, secret: &SecretKey) -> Signature {
    let keypair =
        DalekKeypair::from_bytes(&secret.0).expect("SecretKey always holds a valid keypair encoding");
    let sig = keypair.sign(&hash.0);
    Signature(sig.to_bytes())
}

/// Verifies that `signature` is a valid Ed25519 signature over `hash`
/// under `public`. Returns `false` on any length or cryptographic
/// mismatch; never panics.
pub fn verify(hash: &Hash, public: &PublicKey, signature: &Signature) -> bool {
    let pk = match DalekPublicKey::from_bytes(&public.0) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let sig = match DalekSignature::from_bytes(&signature.0) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    pk.verify_strict(&hash.0, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_32_bytes() {
        let h1 = hash(b"obscura");
        let h2 = hash(b"obscura");
        assert_eq!(h1, h2);
        assert_eq!(h1.0.len(), HASH_LEN);
    }

    #[test]
    fn different_input_yields_different_hash() {
        assert_ne!(hash(b"a"), hash(b"b"));
    }

    #[test]
    fn sign_then_verify_succeeds_for_matching_key() {
        let (sk, pk) = generate_keypair([7u8; 32]);
        let msg = hash(b"a transaction digest");
        let sig = sign(&msg, &sk);
        assert!(verify(&msg, &pk, &sig));
    }

    #[test]
    fn verify_fails_for_wrong_key() {
        let (sk, _pk) = generate_keypair([7u8; 32]);
        let (_sk2, pk2) = generate_keypair([8u8; 32]);
        let msg = hash(b"a transaction digest");
        let sig = sign(&msg, &sk);
        assert!(!verify(&msg, &pk2, &sig));
    }

    #[test]
    fn verify_fails_for_tampered_message() {
        let (sk, pk) = generate_keypair([1u8; 32]);
        let msg = hash(b"original");
        let sig = sign(&msg, &sk);
        let tampered = hash(b"tampered");
        assert!(!verify(&tampered, &pk, &sig));
    }

    #[test]
    fn generate_keypair_is_deterministic() {
        let (sk1, pk1) = generate_keypair([42u8; 32]);
        let (sk2, pk2) = generate_keypair([42u8; 32]);
        assert_eq!(sk1.0, sk2.0);
        assert_eq!(pk1, pk2);
    }

    #[test]
    fn verify_never_panics_on_garbage_bytes() {
        let pk = PublicKey([0xFFu8; PUBLIC_KEY_LEN]);
        let sig = Signature([0xEEu8; SIGNATURE_LEN]);
        let msg = hash(b"whatever");
        assert!(!verify(&msg, &pk, &sig));
    }
}
