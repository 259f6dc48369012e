//! Progress reporting for long-running wallet operations
//!
//! Signing and proof generation take externally-bounded time. Operations
//! report their stage through a [`ProgressReporter`] and can be abandoned
//! through a `CancellationToken` until they reach their commit point.

use crate::transaction::TransactionKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// The long-running operation an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    DeriveKeys,
    Transfer,
    Shield,
    Unshield,
    PrivateSend,
}

impl From<TransactionKind> for Operation {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Transfer => Operation::Transfer,
            TransactionKind::Shield => Operation::Shield,
            TransactionKind::Unshield => Operation::Unshield,
            TransactionKind::PrivateSend => Operation::PrivateSend,
        }
    }
}

/// A progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { operation: Operation },
    AwaitingSignature,
    Deriving { percent: u8 },
    GeneratingProof { percent: u8 },
    Committed,
    Failed { reason: String },
    Cancelled,
}

/// Sink for progress events; a disabled reporter drops everything
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a reporter together with the receiving end of its channel
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Emit an event. A closed receiver is not an error for the operation.
    pub fn report(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

/// Drain every event currently buffered in `rx`
pub fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
