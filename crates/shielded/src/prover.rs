//! Proof generation for shielded transactions
//!
//! The wallet asks a [`ProofGenerator`] for a proof over each shielded
//! transaction's public statement before committing it. Circuit design is out
//! of scope; [`SimulatedProver`] stands in for a real proving backend and
//! reproduces its externally-bounded running time and progress reporting.

use crate::amount::Amount;
use crate::error::{ShieldedError, ShieldedResult};
use crate::note::{NoteCommitment, Nullifier};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::transaction::TransactionKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

const TRANSCRIPT_TAG: &[u8] = b"atoshi/proof-transcript/v1";

/// Public inputs a proof attests to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStatement {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub nullifiers: Vec<Nullifier>,
    pub output_commitments: Vec<NoteCommitment>,
}

impl ProofStatement {
    /// Deterministic byte encoding of the statement
    pub fn transcript(&self) -> Vec<u8> {
        let amount = self.amount.canonical();
        let mut out = Vec::with_capacity(
            64 + amount.len() + 32 * (self.nullifiers.len() + self.output_commitments.len()),
        );
        out.extend_from_slice(self.kind.as_str().as_bytes());
        out.push(0);
        out.extend_from_slice(&(amount.len() as u64).to_le_bytes());
        out.extend_from_slice(amount.as_bytes());
        out.extend_from_slice(&(self.nullifiers.len() as u64).to_le_bytes());
        for nullifier in &self.nullifiers {
            out.extend_from_slice(nullifier.as_bytes());
        }
        out.extend_from_slice(&(self.output_commitments.len() as u64).to_le_bytes());
        for commitment in &self.output_commitments {
            out.extend_from_slice(commitment.as_bytes());
        }
        out
    }
}

/// An opaque proof blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    digest: [u8; 32],
}

impl Proof {
    pub fn new(digest: [u8; 32]) -> Self {
        Self { digest }
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Backend producing proofs for shielded transactions
///
/// Implementations report `GeneratingProof` events as they advance. They are
/// raced against the caller's cancellation token, so they must not mutate
/// wallet state.
#[async_trait]
pub trait ProofGenerator: Send + Sync {
    async fn prove(
        &self,
        statement: &ProofStatement,
        progress: &ProgressReporter,
    ) -> ShieldedResult<Proof>;
}

/// Prover that advances in fixed steps and returns a transcript digest
#[derive(Debug, Clone)]
pub struct SimulatedProver {
    step_percent: u8,
    step_delay: Duration,
}

impl SimulatedProver {
    pub const DEFAULT_STEP_PERCENT: u8 = 5;
    pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(80);

    pub fn new(step_percent: u8, step_delay: Duration) -> ShieldedResult<Self> {
        if step_percent == 0 || step_percent > 100 {
            return Err(ShieldedError::ProofGenerationFailed(format!(
                "step percent must be in 1..=100, got {}",
                step_percent
            )));
        }
        Ok(Self {
            step_percent,
            step_delay,
        })
    }

    /// No delay between steps
    pub fn instant() -> Self {
        Self {
            step_percent: Self::DEFAULT_STEP_PERCENT,
            step_delay: Duration::ZERO,
        }
    }
}

impl Default for SimulatedProver {
    fn default() -> Self {
        Self {
            step_percent: Self::DEFAULT_STEP_PERCENT,
            step_delay: Self::DEFAULT_STEP_DELAY,
        }
    }
}

#[async_trait]
impl ProofGenerator for SimulatedProver {
    async fn prove(
        &self,
        statement: &ProofStatement,
        progress: &ProgressReporter,
    ) -> ShieldedResult<Proof> {
        debug!(
            "Generating {} proof over {} nullifier(s), {} output(s)",
            statement.kind,
            statement.nullifiers.len(),
            statement.output_commitments.len()
        );

        let mut percent: u8 = 0;
        while percent < 100 {
            if self.step_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.step_delay).await;
            }
            percent = percent.saturating_add(self.step_percent).min(100);
            progress.report(ProgressEvent::GeneratingProof { percent });
        }

        let mut hasher = Sha256::new();
        hasher.update(TRANSCRIPT_TAG);
        hasher.update(statement.transcript());
        Ok(Proof::new(hasher.finalize().into()))
    }
}
