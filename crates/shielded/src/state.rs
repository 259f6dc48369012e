//! Wallet state owned by one session
//!
//! Holds the account, the privacy key pair, the public balance, the note store
//! and the transaction log. Balances and notes change only through
//! [`TransactionBuilder`](crate::builder::TransactionBuilder) commits.

use crate::amount::Amount;
use crate::error::{ShieldedError, ShieldedResult};
use crate::keys::{short_address, Account, PrivacyAddress, PrivacyKeyPair};
use crate::ledger::{HistoryFilter, WalletLedger};
use crate::note_store::NoteStore;
use crate::transaction::{Transaction, TxStatus};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Session settings the core needs; binaries build this from their config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSettings {
    pub public_asset: String,
    pub private_asset: String,
    pub derivation_domain: String,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            public_asset: "ETH".to_string(),
            private_asset: "ATOS".to_string(),
            derivation_domain: "Atoshi v1".to_string(),
        }
    }
}

/// Serializable snapshot of the wallet header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub account: String,
    pub privacy_address: Option<String>,
    pub public_balance: String,
    pub private_balance: String,
    pub unspent_notes: usize,
    pub transactions: usize,
    pub pending: usize,
}

#[derive(Debug, Clone)]
pub struct WalletState {
    settings: WalletSettings,
    account: Account,
    keys: PrivacyKeyPair,
    notes: Option<NoteStore>,
    public_balance: Amount,
    transactions: Vec<Transaction>,
}

impl WalletState {
    /// Fresh state with uninitialized privacy keys
    pub fn new(account: Account, public_balance: Amount, settings: WalletSettings) -> Self {
        Self {
            settings,
            account,
            keys: PrivacyKeyPair::uninitialized(),
            notes: None,
            public_balance,
            transactions: Vec::new(),
        }
    }

    pub fn settings(&self) -> &WalletSettings {
        &self.settings
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn keys(&self) -> &PrivacyKeyPair {
        &self.keys
    }

    /// Our privacy address, once keys are initialized
    pub fn privacy_address(&self) -> Option<PrivacyAddress> {
        self.notes.as_ref().map(|store| store.owner())
    }

    pub fn note_store(&self) -> Option<&NoteStore> {
        self.notes.as_ref()
    }

    /// The note store, or `KeysNotInitialized` before key derivation
    pub fn require_notes(&self) -> ShieldedResult<&NoteStore> {
        self.notes.as_ref().ok_or(ShieldedError::KeysNotInitialized)
    }

    pub(crate) fn require_notes_mut(&mut self) -> ShieldedResult<&mut NoteStore> {
        self.notes.as_mut().ok_or(ShieldedError::KeysNotInitialized)
    }

    pub fn public_balance(&self) -> Amount {
        self.public_balance
    }

    pub(crate) fn set_public_balance(&mut self, balance: Amount) {
        self.public_balance = balance;
    }

    /// Sum of unspent note amounts; zero before key derivation
    pub fn private_balance(&self) -> Amount {
        self.notes
            .as_ref()
            .map(|store| store.private_balance())
            .unwrap_or(Amount::ZERO)
    }

    /// Install a derived key pair
    ///
    /// Returns `false` when the identical key pair is already installed.
    /// A different key pair never replaces initialized keys.
    pub fn install_keys(&mut self, keys: PrivacyKeyPair) -> ShieldedResult<bool> {
        if !keys.is_initialized() {
            return Err(ShieldedError::KeysNotInitialized);
        }

        if self.keys.is_initialized() {
            if self.keys == keys {
                return Ok(false);
            }
            return Err(ShieldedError::KeysAlreadyInitialized);
        }

        let store = NoteStore::new(&keys)?;
        info!(
            "Privacy keys installed for account {}",
            short_address(&self.account.address().to_string())
        );
        self.notes = Some(store);
        self.keys = keys;
        Ok(true)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub(crate) fn push_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn ledger(&self) -> WalletLedger<'_> {
        WalletLedger::new(&self.transactions)
    }

    pub fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.ledger().get(id)
    }

    /// Record the external confirmation outcome of a pending transaction
    ///
    /// Settlement is bookkeeping only; balances and notes are untouched.
    pub fn settle(&mut self, id: Uuid, outcome: TxStatus) -> ShieldedResult<()> {
        let tx = self
            .transactions
            .iter_mut()
            .find(|tx| tx.id() == id)
            .ok_or_else(|| ShieldedError::TransactionNotFound(id.to_string()))?;

        tx.settle(outcome)?;
        info!("Transaction {} ({}) settled as {}", id, tx.kind(), outcome);
        Ok(())
    }

    pub fn summary(&self) -> WalletSummary {
        let ledger = self.ledger();
        WalletSummary {
            account: short_address(&self.account.address().to_string()),
            privacy_address: self
                .privacy_address()
                .map(|address| address.display_for_asset(&self.settings.private_asset)),
            public_balance: self.public_balance.display_with(&self.settings.public_asset),
            private_balance: self
                .private_balance()
                .display_with(&self.settings.private_asset),
            unspent_notes: self
                .notes
                .as_ref()
                .map(|store| store.unspent_count())
                .unwrap_or(0),
            transactions: ledger.len(),
            pending: ledger
                .history(HistoryFilter::All)
                .filter(|tx| tx.status() == TxStatus::Pending)
                .count(),
        }
    }
}
