//! Read-only history views over the transaction log

use crate::error::ShieldedResult;
use crate::transaction::{Transaction, TransactionKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which transactions a history query returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFilter {
    All,
    /// TRANSFER, SHIELD and UNSHIELD
    PublicView,
    /// PRIVATE_SEND, SHIELD and UNSHIELD
    PrivateView,
    Kinds(Vec<TransactionKind>),
}

impl HistoryFilter {
    pub fn matches(&self, kind: TransactionKind) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::PublicView => kind != TransactionKind::PrivateSend,
            HistoryFilter::PrivateView => kind != TransactionKind::Transfer,
            HistoryFilter::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// Query interface over an append-only transaction log
#[derive(Debug, Clone, Copy)]
pub struct WalletLedger<'a> {
    transactions: &'a [Transaction],
}

impl<'a> WalletLedger<'a> {
    /// `transactions` must be in append order
    pub fn new(transactions: &'a [Transaction]) -> Self {
        Self { transactions }
    }

    /// Matching transactions, newest first
    ///
    /// The iterator is lazy and borrows the log; calling `history` again
    /// restarts from the newest entry.
    pub fn history(&self, filter: HistoryFilter) -> impl Iterator<Item = &'a Transaction> {
        let transactions = self.transactions;
        transactions
            .iter()
            .rev()
            .filter(move |tx| filter.matches(tx.kind()))
    }

    pub fn get(&self, id: Uuid) -> Option<&'a Transaction> {
        self.transactions.iter().find(|tx| tx.id() == id)
    }

    pub fn count(&self, filter: HistoryFilter) -> usize {
        self.history(filter).count()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Export a view as a JSON array, newest first
    pub fn to_json(&self, filter: HistoryFilter) -> ShieldedResult<String> {
        let view: Vec<&Transaction> = self.history(filter).collect();
        Ok(serde_json::to_string_pretty(&view)?)
    }
}
