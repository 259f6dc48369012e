//! Serialized wallet handle
//!
//! Integrates the wallet components behind one writer lock:
//! - Privacy key activation through an external signer
//! - The four builder operations with proof generation
//! - Balance and history queries
//!
//! Builder requests hold the lock from planning through commit, so no two
//! requests on one wallet interleave. Each request can be cancelled until it
//! reaches its commit point.

use crate::amount::Amount;
use crate::builder::{BuildOutcome, TransactionBuilder, TransactionPlan};
use crate::error::{ShieldedError, ShieldedResult};
use crate::keys::{Account, AccountAddress, KeyDerivation, MessageSigner, PrivacyAddress};
use crate::ledger::HistoryFilter;
use crate::progress::{Operation, ProgressEvent, ProgressReporter};
use crate::prover::{ProofGenerator, SimulatedProver};
use crate::state::{WalletSettings, WalletState, WalletSummary};
use crate::transaction::{Transaction, TxStatus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Cloneable handle to one wallet session
#[derive(Clone)]
pub struct Wallet {
    state: Arc<Mutex<WalletState>>,
    prover: Arc<dyn ProofGenerator>,
}

impl Wallet {
    /// Create a wallet with the default simulated prover
    pub fn new(account: Account, public_balance: Amount, settings: WalletSettings) -> Self {
        Self::with_prover(
            WalletState::new(account, public_balance, settings),
            Arc::new(SimulatedProver::default()),
        )
    }

    pub fn with_prover(state: WalletState, prover: Arc<dyn ProofGenerator>) -> Self {
        info!(
            "Initialized wallet for account {}",
            state.account().address()
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            prover,
        }
    }

    /// Derive privacy keys through `signer` and install them
    ///
    /// Signing and hashing run without holding the wallet lock. Activating
    /// again with a signer that reproduces the installed keys is a no-op.
    pub async fn activate_privacy(
        &self,
        signer: &dyn MessageSigner,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShieldedResult<PrivacyAddress> {
        let (account, domain) = {
            let state = self.state.lock().await;
            (
                state.account().clone(),
                state.settings().derivation_domain.clone(),
            )
        };

        let keys = KeyDerivation::new(domain)
            .derive(&account, signer, progress, cancel)
            .await?;
        let address = keys.public_address();

        let mut state = self.state.lock().await;
        if !state.install_keys(keys)? {
            info!("Privacy keys already active, nothing to install");
        }
        Ok(address)
    }

    pub async fn transfer(
        &self,
        amount: Amount,
        to: AccountAddress,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShieldedResult<BuildOutcome> {
        self.execute(Operation::Transfer, progress, cancel, |state| {
            TransactionBuilder::plan_transfer(state, amount, to)
        })
        .await
    }

    pub async fn shield(
        &self,
        amount: Amount,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShieldedResult<BuildOutcome> {
        self.execute(Operation::Shield, progress, cancel, |state| {
            TransactionBuilder::plan_shield(state, amount)
        })
        .await
    }

    pub async fn unshield(
        &self,
        amount: Amount,
        to: AccountAddress,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShieldedResult<BuildOutcome> {
        self.execute(Operation::Unshield, progress, cancel, |state| {
            TransactionBuilder::plan_unshield(state, amount, to)
        })
        .await
    }

    pub async fn private_send(
        &self,
        amount: Amount,
        to: PrivacyAddress,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShieldedResult<BuildOutcome> {
        self.execute(Operation::PrivateSend, progress, cancel, |state| {
            TransactionBuilder::plan_private_send(state, amount, to)
        })
        .await
    }

    /// Record the external confirmation outcome of a transaction
    pub async fn settle(&self, id: Uuid, outcome: TxStatus) -> ShieldedResult<()> {
        self.state.lock().await.settle(id, outcome)
    }

    pub async fn account(&self) -> Account {
        self.state.lock().await.account().clone()
    }

    pub async fn public_balance(&self) -> Amount {
        self.state.lock().await.public_balance()
    }

    pub async fn private_balance(&self) -> Amount {
        self.state.lock().await.private_balance()
    }

    pub async fn privacy_address(&self) -> Option<PrivacyAddress> {
        self.state.lock().await.privacy_address()
    }

    /// Owned snapshot of a history view, newest first
    pub async fn history(&self, filter: HistoryFilter) -> Vec<Transaction> {
        self.state
            .lock()
            .await
            .ledger()
            .history(filter)
            .cloned()
            .collect()
    }

    pub async fn history_json(&self, filter: HistoryFilter) -> ShieldedResult<String> {
        self.state.lock().await.ledger().to_json(filter)
    }

    pub async fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.state.lock().await.transaction(id).cloned()
    }

    pub async fn snapshot(&self) -> WalletSummary {
        self.state.lock().await.summary()
    }

    /// Run one builder request under the wallet lock
    async fn execute<F>(
        &self,
        operation: Operation,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
        plan: F,
    ) -> ShieldedResult<BuildOutcome>
    where
        F: FnOnce(&WalletState) -> ShieldedResult<TransactionPlan>,
    {
        progress.report(ProgressEvent::Started { operation });

        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(operation, progress)),
            guard = self.state.lock() => guard,
        };

        let mut plan = match plan(&*state) {
            Ok(plan) => plan,
            Err(e) => return Err(failed(operation, progress, e)),
        };

        if plan.kind().requires_proof() {
            let statement = plan.statement();
            let proof = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(operation, progress)),
                result = self.prover.prove(&statement, progress) => result,
            };
            match proof {
                Ok(proof) => plan.attach_proof(proof),
                Err(e) => return Err(failed(operation, progress, e)),
            }
        }

        // Last point at which cancellation is honoured
        if cancel.is_cancelled() {
            return Err(cancelled(operation, progress));
        }

        match TransactionBuilder::commit(&mut *state, plan) {
            Ok(outcome) => {
                progress.report(ProgressEvent::Committed);
                Ok(outcome)
            }
            Err(e) => Err(failed(operation, progress, e)),
        }
    }
}

fn cancelled(operation: Operation, progress: &ProgressReporter) -> ShieldedError {
    info!("{:?} cancelled before commit", operation);
    progress.report(ProgressEvent::Cancelled);
    ShieldedError::Cancelled
}

fn failed(operation: Operation, progress: &ProgressReporter, e: ShieldedError) -> ShieldedError {
    match &e {
        ShieldedError::ProofGenerationFailed(_) | ShieldedError::Other(_) => {
            error!("{:?} failed: {}", operation, e)
        }
        _ => warn!("{:?} rejected: {}", operation, e),
    }
    progress.report(ProgressEvent::Failed {
        reason: e.to_string(),
    });
    e
}
