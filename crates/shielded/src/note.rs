//! Shielded notes, their commitments and nullifiers

use crate::amount::Amount;
use crate::crypto::ShieldedCrypto;
use crate::error::{ShieldedError, ShieldedResult};
use crate::keys::PrivacyAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn decode_prefixed(s: &str, prefix: &str, what: &str) -> ShieldedResult<[u8; 32]> {
    let encoded = s.trim().strip_prefix(prefix).ok_or_else(|| {
        ShieldedError::SerializationError(format!("{} must start with '{}'", what, prefix))
    })?;
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| ShieldedError::SerializationError(format!("invalid {}: {}", what, e)))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| ShieldedError::SerializationError(format!("{} must be 32 bytes", what)))
}

/// Commitment that uniquely identifies a note
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NoteCommitment([u8; 32]);

impl NoteCommitment {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NoteCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cm_{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for NoteCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteCommitment({})", self)
    }
}

impl FromStr for NoteCommitment {
    type Err = ShieldedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed(s, "cm_", "note commitment").map(Self)
    }
}

impl From<NoteCommitment> for String {
    fn from(value: NoteCommitment) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for NoteCommitment {
    type Error = ShieldedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One-time value revealed when a note is spent
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Nullifier([u8; 32]);

impl Nullifier {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nf_{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({})", self)
    }
}

impl FromStr for Nullifier {
    type Err = ShieldedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed(s, "nf_", "nullifier").map(Self)
    }
}

impl From<Nullifier> for String {
    fn from(value: Nullifier) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Nullifier {
    type Error = ShieldedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A shielded value unit owned by a privacy address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    amount: Amount,
    owner: PrivacyAddress,
    rho: [u8; 32],
    commitment: NoteCommitment,
}

impl Note {
    /// Create a fresh note with random blinding randomness
    pub fn new(amount: Amount, owner: PrivacyAddress) -> Self {
        Self::with_rho(amount, owner, ShieldedCrypto::random_bytes())
    }

    /// Rebuild a note from its opening (amount, owner, rho)
    pub fn with_rho(amount: Amount, owner: PrivacyAddress, rho: [u8; 32]) -> Self {
        let commitment = NoteCommitment(ShieldedCrypto::note_commitment(
            owner.as_bytes(),
            &amount.canonical(),
            &rho,
        ));
        Self {
            amount,
            owner,
            rho,
            commitment,
        }
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn owner(&self) -> PrivacyAddress {
        self.owner
    }

    pub fn rho(&self) -> &[u8; 32] {
        &self.rho
    }

    pub fn commitment(&self) -> NoteCommitment {
        self.commitment
    }

    /// True when the stored commitment matches the note's opening
    pub fn verify_commitment(&self) -> bool {
        Self::with_rho(self.amount, self.owner, self.rho).commitment == self.commitment
    }
}
