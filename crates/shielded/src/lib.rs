//! Shielded-pool wallet core
//!
//! This crate implements the wallet side of a shielded pool: deterministic
//! privacy-key derivation from an account signature, a note store with a
//! double-spend guard, builders for transfer, shield, unshield and private-send
//! transactions, and read-only public and private history views.

pub mod amount;
pub mod builder;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod note;
pub mod note_store;
pub mod progress;
pub mod prover;
pub mod state;
pub mod transaction;
pub mod wallet;

// Re-export main types
pub use amount::Amount;
pub use builder::{BuildOutcome, TransactionBuilder, TransactionPlan};
pub use crypto::ShieldedCrypto;
pub use error::{ErrorKind, ShieldedError, ShieldedResult};
pub use keys::{
    short_address, Account, AccountAddress, Ed25519Signer, IncomingViewingKey, KeyDerivation,
    MessageSigner, PrivacyAddress, PrivacyKeyPair, Signature,
};
pub use ledger::{HistoryFilter, WalletLedger};
pub use note::{Note, NoteCommitment, Nullifier};
pub use note_store::NoteStore;
pub use progress::{Operation, ProgressEvent, ProgressReporter};
pub use prover::{Proof, ProofGenerator, ProofStatement, SimulatedProver};
pub use state::{WalletSettings, WalletState, WalletSummary};
pub use transaction::{Endpoint, Transaction, TransactionKind, TxHash, TxStatus};
pub use wallet::Wallet;

pub use tokio_util::sync::CancellationToken;
