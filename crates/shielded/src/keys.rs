//! Deterministic privacy key derivation
//!
//! A privacy key pair is derived from a single signature produced by the
//! account's external signing provider over a domain-separated message. The
//! same account and signature always reproduce the same key pair, so no backup
//! phrase is needed for recovery.

use crate::crypto::ShieldedCrypto;
use crate::error::{ShieldedError, ShieldedResult};
use crate::progress::{Operation, ProgressEvent, ProgressReporter};
use async_trait::async_trait;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

/// Number of links in the spending-key hash chain (4% progress per link)
pub const HASH_CHAIN_ROUNDS: usize = 25;

/// Attempts with re-randomized domain tags before giving up on degenerate keys
pub const MAX_DERIVATION_ATTEMPTS: u32 = 8;

/// Render a long identifier as `first6...last4`
pub fn short_address(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 13 {
        return value.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn decode_32(encoded: &str, what: &str) -> ShieldedResult<[u8; 32]> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| ShieldedError::InvalidAddress(format!("{} is not base58: {}", what, e)))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ShieldedError::InvalidAddress(format!("{} must be 32 bytes, got {}", what, bytes.len()))
    })
}

/// Public-chain account address (an Ed25519 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self)
    }
}

impl FromStr for AccountAddress {
    type Err = ShieldedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s.trim(), "account address").map(Self)
    }
}

impl From<AccountAddress> for String {
    fn from(address: AccountAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = ShieldedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A public-chain identity, provisioned externally and immutable for the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    address: AccountAddress,
}

impl Account {
    pub fn new(address: AccountAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> AccountAddress {
        self.address
    }
}

/// Raw signature bytes returned by a signing provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// External key-holding agent able to sign arbitrary messages
///
/// Implementations return `SignatureRejected` when the holder declines.
/// The wallet core never holds the account's master key itself.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    async fn sign(&self, message: &[u8]) -> ShieldedResult<Signature>;
}

/// Local Ed25519 signing provider
///
/// Ed25519 signatures are deterministic, so re-deriving privacy keys with the
/// same signer reproduces them exactly.
pub struct Ed25519Signer {
    keypair: Keypair,
}

impl Ed25519Signer {
    pub fn from_secret_bytes(secret: &[u8; 32]) -> ShieldedResult<Self> {
        let secret = SecretKey::from_bytes(secret).map_err(|e| {
            ShieldedError::DerivationError(format!("Failed to create signing secret: {}", e))
        })?;
        let public: PublicKey = (&secret).into();

        Ok(Self {
            keypair: Keypair { secret, public },
        })
    }

    /// Generate a signer with a fresh random secret
    pub fn generate() -> ShieldedResult<Self> {
        let mut secret_bytes = ShieldedCrypto::random_bytes();
        let signer = Self::from_secret_bytes(&secret_bytes);
        secret_bytes.zeroize();
        signer
    }

    pub fn account(&self) -> Account {
        Account::new(AccountAddress::new(self.keypair.public.to_bytes()))
    }
}

#[async_trait]
impl MessageSigner for Ed25519Signer {
    async fn sign(&self, message: &[u8]) -> ShieldedResult<Signature> {
        Ok(Signature::new(self.keypair.sign(message).to_bytes().to_vec()))
    }
}

/// Secret scalar authorizing spends; zeroized on drop
#[derive(Clone, PartialEq, Eq)]
pub struct SpendingKey([u8; 32]);

impl SpendingKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.0)
    }
}

impl Drop for SpendingKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpendingKey(<redacted>)")
    }
}

/// Secret scalar for detecting owned notes without spend authority; zeroized on drop
#[derive(Clone, PartialEq, Eq)]
pub struct ViewingKey([u8; 32]);

impl ViewingKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for ViewingKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ViewingKey(<redacted>)")
    }
}

/// Public commitment to a spending key, used by senders to address notes
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PrivacyAddress([u8; 32]);

impl PrivacyAddress {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render with the asset tag the UI shows, e.g. `zk_atos_<base58>`
    pub fn display_for_asset(&self, asset: &str) -> String {
        format!(
            "zk_{}_{}",
            asset.to_ascii_lowercase(),
            bs58::encode(self.0).into_string()
        )
    }
}

impl fmt::Display for PrivacyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zk_{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for PrivacyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivacyAddress({})", self)
    }
}

impl FromStr for PrivacyAddress {
    type Err = ShieldedError;

    /// Accepts both `zk_<base58>` and `zk_<asset>_<base58>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim().strip_prefix("zk_").ok_or_else(|| {
            ShieldedError::InvalidAddress(format!("privacy address must start with 'zk_': {}", s))
        })?;
        let encoded = rest.rsplit('_').next().unwrap_or(rest);
        decode_32(encoded, "privacy address").map(Self)
    }
}

impl From<PrivacyAddress> for String {
    fn from(address: PrivacyAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for PrivacyAddress {
    type Error = ShieldedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Privacy key pair derived from one account signature
#[derive(Clone, PartialEq, Eq)]
pub struct PrivacyKeyPair {
    spending_key: SpendingKey,
    viewing_key: ViewingKey,
    public_address: PrivacyAddress,
    initialized: bool,
}

impl PrivacyKeyPair {
    /// Placeholder held by a wallet before derivation completes
    pub fn uninitialized() -> Self {
        Self {
            spending_key: SpendingKey([0u8; 32]),
            viewing_key: ViewingKey([0u8; 32]),
            public_address: PrivacyAddress([0u8; 32]),
            initialized: false,
        }
    }

    pub fn spending_key(&self) -> &SpendingKey {
        &self.spending_key
    }

    pub fn viewing_key(&self) -> &ViewingKey {
        &self.viewing_key
    }

    pub fn public_address(&self) -> PrivacyAddress {
        self.public_address
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Export the view-only half of an initialized key pair
    pub fn incoming_viewing_key(&self) -> ShieldedResult<IncomingViewingKey> {
        if !self.initialized {
            return Err(ShieldedError::KeysNotInitialized);
        }
        Ok(IncomingViewingKey {
            viewing_key: self.viewing_key.clone(),
            address: self.public_address,
        })
    }
}

impl fmt::Debug for PrivacyKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivacyKeyPair")
            .field("public_address", &self.public_address)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// Detection capability split off a key pair
///
/// Holds the viewing key and the address it watches. A note store opened with
/// it can list notes and report a balance but has no spend authority.
#[derive(Clone, PartialEq, Eq)]
pub struct IncomingViewingKey {
    viewing_key: ViewingKey,
    address: PrivacyAddress,
}

impl IncomingViewingKey {
    pub fn viewing_key(&self) -> &ViewingKey {
        &self.viewing_key
    }

    pub fn address(&self) -> PrivacyAddress {
        self.address
    }

    /// Short public identifier of the viewing key, safe to log
    pub fn fingerprint(&self) -> String {
        hex::encode(&ShieldedCrypto::viewing_fingerprint(self.viewing_key.as_bytes())[..8])
    }
}

impl fmt::Debug for IncomingViewingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingViewingKey")
            .field("address", &self.address)
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Derives privacy key pairs from account signatures
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    domain: String,
}

impl KeyDerivation {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// The domain-separated message the account is asked to sign
    pub fn message_for(&self, account: &Account) -> Vec<u8> {
        format!(
            "{}: derive privacy keys for {}",
            self.domain,
            account.address()
        )
        .into_bytes()
    }

    /// Derive a key pair from an already obtained signature
    ///
    /// Pure and deterministic: identical inputs give bit-identical key pairs.
    pub fn derive_from_signature(
        &self,
        account: &Account,
        signature: &Signature,
    ) -> ShieldedResult<PrivacyKeyPair> {
        self.derive_with_progress(account, signature, |_| {})
    }

    /// Request a signature from `signer`, then derive the key pair
    ///
    /// Reports `AwaitingSignature` while the signer is pending and one
    /// `Deriving` event per hash-chain round. Cancelling the token before the
    /// key pair is returned aborts with `Cancelled`.
    pub async fn derive(
        &self,
        account: &Account,
        signer: &dyn MessageSigner,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShieldedResult<PrivacyKeyPair> {
        progress.report(ProgressEvent::Started {
            operation: Operation::DeriveKeys,
        });
        info!("Deriving privacy keys for account {}", account.address());

        if cancel.is_cancelled() {
            return Err(Self::cancelled(progress));
        }

        progress.report(ProgressEvent::AwaitingSignature);
        let message = self.message_for(account);

        let signed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Self::cancelled(progress)),
            result = signer.sign(&message) => result,
        };

        let signature = match signed {
            Ok(signature) => signature,
            Err(e) => {
                warn!("Signature request for key derivation failed: {}", e);
                progress.report(ProgressEvent::Failed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            return Err(Self::cancelled(progress));
        }

        match self.derive_with_progress(account, &signature, |percent| {
            progress.report(ProgressEvent::Deriving { percent })
        }) {
            Ok(keys) => {
                info!(
                    "Privacy keys derived. Public address: {}",
                    short_address(&keys.public_address().to_string())
                );
                progress.report(ProgressEvent::Committed);
                Ok(keys)
            }
            Err(e) => {
                progress.report(ProgressEvent::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn cancelled(progress: &ProgressReporter) -> ShieldedError {
        info!("Key derivation cancelled");
        progress.report(ProgressEvent::Cancelled);
        ShieldedError::Cancelled
    }

    fn derive_with_progress<F>(
        &self,
        account: &Account,
        signature: &Signature,
        mut on_percent: F,
    ) -> ShieldedResult<PrivacyKeyPair>
    where
        F: FnMut(u8),
    {
        if signature.as_bytes().is_empty() {
            return Err(ShieldedError::DerivationError(
                "signing provider returned an empty signature".to_string(),
            ));
        }

        derive_attempts(MAX_DERIVATION_ATTEMPTS, |attempt| {
            self.candidate(account, signature, attempt, &mut on_percent)
        })
    }

    /// Domain tag for one derivation attempt; retries append the attempt counter
    fn tag(&self, purpose: &str, attempt: u32) -> String {
        if attempt == 0 {
            format!("{}/{}", self.domain, purpose)
        } else {
            format!("{}/{}/{}", self.domain, purpose, attempt)
        }
    }

    fn candidate<F>(
        &self,
        account: &Account,
        signature: &Signature,
        attempt: u32,
        on_percent: &mut F,
    ) -> Option<PrivacyKeyPair>
    where
        F: FnMut(u8),
    {
        let spend_tag = self.tag("spend", attempt);
        let view_tag = self.tag("view", attempt);

        let mut input = Vec::with_capacity(32 + signature.as_bytes().len());
        input.extend_from_slice(&account.address().to_bytes());
        input.extend_from_slice(signature.as_bytes());

        let mut seed = ShieldedCrypto::hash_chain(
            spend_tag.as_bytes(),
            &input,
            HASH_CHAIN_ROUNDS,
            |round| on_percent((round * 100 / HASH_CHAIN_ROUNDS) as u8),
        );
        let spending = ShieldedCrypto::wide_scalar(spend_tag.as_bytes(), &seed);
        let viewing = ShieldedCrypto::wide_scalar(view_tag.as_bytes(), &input);
        seed.zeroize();
        input.zeroize();

        if ShieldedCrypto::is_degenerate(&spending) || ShieldedCrypto::is_degenerate(&viewing) {
            return None;
        }

        let public_address = PrivacyAddress(ShieldedCrypto::public_commitment(&spending));
        debug!("Derivation attempt {} produced a valid key pair", attempt + 1);

        Some(PrivacyKeyPair {
            spending_key: SpendingKey(spending.to_bytes()),
            viewing_key: ViewingKey(viewing.to_bytes()),
            public_address,
            initialized: true,
        })
    }
}

/// Try candidates until one is non-degenerate
fn derive_attempts<F>(max_attempts: u32, mut candidate: F) -> ShieldedResult<PrivacyKeyPair>
where
    F: FnMut(u32) -> Option<PrivacyKeyPair>,
{
    for attempt in 0..max_attempts {
        if let Some(keys) = candidate(attempt) {
            return Ok(keys);
        }
        warn!(
            "Degenerate key material on attempt {}/{}, re-randomizing domain tag",
            attempt + 1,
            max_attempts
        );
    }

    Err(ShieldedError::DerivationError(format!(
        "degenerate key material after {} attempts",
        max_attempts
    )))
}
