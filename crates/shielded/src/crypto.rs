//! Hash and group primitives behind key derivation, commitments and nullifiers
//!
//! Scalars live in the Ristretto group over Curve25519, so a non-zero scalar
//! always maps to a non-identity public point.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::scalar::Scalar;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

const COMMITMENT_TAG: &[u8] = b"atoshi/note-commitment/v1";
const NULLIFIER_TAG: &[u8] = b"atoshi/nullifier/v1";
const VIEWING_FINGERPRINT_TAG: &[u8] = b"atoshi/viewing-fingerprint/v1";

/// Core cryptographic operations for the shielded pool
pub struct ShieldedCrypto;

impl ShieldedCrypto {
    /// Run a one-way SHA-256 hash chain over `input`
    ///
    /// The first link binds the domain tag and the length-prefixed input; every
    /// following link re-hashes the previous digest together with its round
    /// index. `on_round` is called after each link with the 1-based round number.
    pub fn hash_chain<F>(tag: &[u8], input: &[u8], rounds: usize, mut on_round: F) -> [u8; 32]
    where
        F: FnMut(usize),
    {
        let mut hasher = Sha256::new();
        hasher.update(tag);
        hasher.update((input.len() as u64).to_le_bytes());
        hasher.update(input);
        let mut link: [u8; 32] = hasher.finalize().into();
        on_round(1);

        for round in 2..=rounds.max(1) {
            let mut hasher = Sha256::new();
            hasher.update(tag);
            hasher.update((round as u64).to_le_bytes());
            hasher.update(link);
            link = hasher.finalize().into();
            on_round(round);
        }

        link
    }

    /// Reduce `SHA-512(tag || input)` to a scalar
    pub fn wide_scalar(tag: &[u8], input: &[u8]) -> Scalar {
        let mut hasher = Sha512::new();
        hasher.update(tag);
        hasher.update(input);
        let hash = hasher.finalize();

        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hash);
        Scalar::from_bytes_mod_order_wide(&wide)
    }

    /// Public commitment to a secret scalar: `scalar * G`, compressed
    pub fn public_commitment(scalar: &Scalar) -> [u8; 32] {
        (scalar * RISTRETTO_BASEPOINT_POINT).compress().to_bytes()
    }

    /// True for the zero scalar, whose public commitment is the identity
    pub fn is_degenerate(scalar: &Scalar) -> bool {
        *scalar == Scalar::zero()
    }

    /// Commitment binding a note's owner, amount and blinding randomness
    pub fn note_commitment(owner: &[u8; 32], amount: &str, rho: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(COMMITMENT_TAG);
        hasher.update(owner);
        hasher.update((amount.len() as u64).to_le_bytes());
        hasher.update(amount.as_bytes());
        hasher.update(rho);
        hasher.finalize().into()
    }

    /// Nullifier of a note, computable only with the owner's spending key
    pub fn nullifier(spending_key: &[u8; 32], commitment: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(NULLIFIER_TAG);
        hasher.update(spending_key);
        hasher.update(commitment);
        hasher.finalize().into()
    }

    /// One-way digest identifying a viewing key without revealing it
    pub fn viewing_fingerprint(viewing_key: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(VIEWING_FINGERPRINT_TAG);
        hasher.update(viewing_key);
        hasher.finalize().into()
    }

    /// 32 bytes from the thread-local CSPRNG
    pub fn random_bytes() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }
}
