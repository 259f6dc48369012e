//! Transaction records for the public and private ledgers

use crate::amount::Amount;
use crate::crypto::ShieldedCrypto;
use crate::error::{ShieldedError, ShieldedResult};
use crate::keys::{AccountAddress, PrivacyAddress};
use crate::note::Nullifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The four kinds of wallet transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Public to public
    Transfer,
    /// Public to private, creates a note
    Shield,
    /// Private to public, consumes notes
    Unshield,
    /// Private to private, consumes notes and creates new ones
    PrivateSend,
}

impl TransactionKind {
    /// Kinds visible on the public chain carry a public hash
    pub fn has_public_hash(&self) -> bool {
        !matches!(self, TransactionKind::PrivateSend)
    }

    /// Kinds that spend notes carry a nullifier
    pub fn spends_notes(&self) -> bool {
        matches!(self, TransactionKind::Unshield | TransactionKind::PrivateSend)
    }

    /// Every kind touching the shielded pool needs a proof
    pub fn requires_proof(&self) -> bool {
        !matches!(self, TransactionKind::Transfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Shield => "SHIELD",
            TransactionKind::Unshield => "UNSHIELD",
            TransactionKind::PrivateSend => "PRIVATE_SEND",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Public transaction hash, displayed `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(ShieldedCrypto::random_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl FromStr for TxHash {
    type Err = ShieldedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s.trim().strip_prefix("0x").ok_or_else(|| {
            ShieldedError::SerializationError("transaction hash must start with '0x'".to_string())
        })?;
        let bytes = hex::decode(encoded).map_err(|e| {
            ShieldedError::SerializationError(format!("invalid transaction hash: {}", e))
        })?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| {
                ShieldedError::SerializationError("transaction hash must be 32 bytes".to_string())
            })
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for TxHash {
    type Error = ShieldedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Source or destination of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Private(PrivacyAddress),
    Public(AccountAddress),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Private(address) => write!(f, "{}", address),
            Endpoint::Public(address) => write!(f, "{}", address),
        }
    }
}

impl From<AccountAddress> for Endpoint {
    fn from(address: AccountAddress) -> Self {
        Endpoint::Public(address)
    }
}

impl From<PrivacyAddress> for Endpoint {
    fn from(address: PrivacyAddress) -> Self {
        Endpoint::Private(address)
    }
}

/// One entry of the wallet's append-only history
///
/// Constructed only through the per-kind constructors, which enforce the
/// hash/nullifier shape of each kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: Uuid,
    kind: TransactionKind,
    amount: Amount,
    asset: String,
    timestamp: DateTime<Utc>,
    from: Endpoint,
    to: Endpoint,
    status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tx_hash: Option<TxHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nullifier: Option<Nullifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    spent_nullifiers: Vec<Nullifier>,
}

impl Transaction {
    fn base(
        kind: TransactionKind,
        amount: Amount,
        asset: &str,
        from: Endpoint,
        to: Endpoint,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            asset: asset.to_string(),
            timestamp: Utc::now(),
            from,
            to,
            status: TxStatus::Pending,
            tx_hash: None,
            nullifier: None,
            spent_nullifiers: Vec::new(),
        }
    }

    fn with_spends(mut self, nullifiers: Vec<Nullifier>) -> ShieldedResult<Self> {
        let first = nullifiers.first().copied().ok_or_else(|| {
            ShieldedError::Other(anyhow::anyhow!(
                "{} transaction must spend at least one note",
                self.kind
            ))
        })?;
        self.nullifier = Some(first);
        self.spent_nullifiers = nullifiers;
        Ok(self)
    }

    pub fn transfer(amount: Amount, asset: &str, from: AccountAddress, to: AccountAddress) -> Self {
        let mut tx = Self::base(TransactionKind::Transfer, amount, asset, from.into(), to.into());
        tx.tx_hash = Some(TxHash::random());
        tx
    }

    pub fn shield(amount: Amount, asset: &str, from: AccountAddress, to: PrivacyAddress) -> Self {
        let mut tx = Self::base(TransactionKind::Shield, amount, asset, from.into(), to.into());
        tx.tx_hash = Some(TxHash::random());
        tx
    }

    pub fn unshield(
        amount: Amount,
        asset: &str,
        from: PrivacyAddress,
        to: AccountAddress,
        nullifiers: Vec<Nullifier>,
    ) -> ShieldedResult<Self> {
        let mut tx = Self::base(TransactionKind::Unshield, amount, asset, from.into(), to.into())
            .with_spends(nullifiers)?;
        tx.tx_hash = Some(TxHash::random());
        Ok(tx)
    }

    pub fn private_send(
        amount: Amount,
        asset: &str,
        from: PrivacyAddress,
        to: PrivacyAddress,
        nullifiers: Vec<Nullifier>,
    ) -> ShieldedResult<Self> {
        Self::base(TransactionKind::PrivateSend, amount, asset, from.into(), to.into())
            .with_spends(nullifiers)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn from(&self) -> Endpoint {
        self.from
    }

    pub fn to(&self) -> Endpoint {
        self.to
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    /// First nullifier revealed by this transaction
    pub fn nullifier(&self) -> Option<Nullifier> {
        self.nullifier
    }

    /// Every nullifier revealed by this transaction, in spend order
    pub fn spent_nullifiers(&self) -> &[Nullifier] {
        &self.spent_nullifiers
    }

    /// True when the hash and nullifier fields match the transaction's kind
    pub fn has_valid_shape(&self) -> bool {
        self.tx_hash.is_some() == self.kind.has_public_hash()
            && self.nullifier.is_some() == self.kind.spends_notes()
            && self.spent_nullifiers.first().copied() == self.nullifier
    }

    /// Collapse a pending transaction to `Completed` or `Failed`
    pub fn settle(&mut self, outcome: TxStatus) -> ShieldedResult<()> {
        if self.status != TxStatus::Pending || outcome == TxStatus::Pending {
            return Err(ShieldedError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: outcome.to_string(),
            });
        }
        self.status = outcome;
        Ok(())
    }
}
