//! Construction of the four transaction kinds
//!
//! Every operation runs in two phases. `plan_*` validates the request against
//! a shared borrow of [`WalletState`] and precomputes all notes, nullifiers and
//! the transaction record. [`TransactionBuilder::commit`] re-validates the plan
//! and only then applies it, so a failing request never leaves balances or the
//! note store partially updated.

use crate::amount::Amount;
use crate::error::{ShieldedError, ShieldedResult};
use crate::keys::{short_address, AccountAddress, PrivacyAddress};
use crate::note::{Note, Nullifier};
use crate::prover::{Proof, ProofStatement};
use crate::state::WalletState;
use crate::transaction::{Transaction, TransactionKind};
use tracing::{debug, info};

/// What a committed builder operation produced
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub transaction: Transaction,
    /// Every note created, including those addressed to other wallets
    pub created_notes: Vec<Note>,
    /// Nullifiers revealed by spent notes
    pub nullifiers: Vec<Nullifier>,
    pub proof: Option<Proof>,
}

/// A validated, not yet applied builder operation
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    transaction: Transaction,
    debit: Amount,
    credit: Amount,
    spends: Vec<Note>,
    nullifiers: Vec<Nullifier>,
    outputs: Vec<Note>,
    /// Outputs owned by this wallet, ingested on commit
    owned: Vec<Note>,
    proof: Option<Proof>,
}

impl TransactionPlan {
    pub fn kind(&self) -> TransactionKind {
        self.transaction.kind()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn spends(&self) -> &[Note] {
        &self.spends
    }

    pub fn outputs(&self) -> &[Note] {
        &self.outputs
    }

    /// Public inputs for the proof backing this plan
    pub fn statement(&self) -> ProofStatement {
        ProofStatement {
            kind: self.kind(),
            amount: self.transaction.amount(),
            nullifiers: self.nullifiers.clone(),
            output_commitments: self.outputs.iter().map(|note| note.commitment()).collect(),
        }
    }

    pub fn attach_proof(&mut self, proof: Proof) {
        self.proof = Some(proof);
    }

    fn touches_notes(&self) -> bool {
        !self.spends.is_empty() || !self.owned.is_empty()
    }
}

struct SpendSelection {
    spends: Vec<Note>,
    nullifiers: Vec<Nullifier>,
    change: Option<Note>,
}

/// Builds and commits wallet transactions
pub struct TransactionBuilder;

impl TransactionBuilder {
    /// Public to public transfer
    pub fn build_transfer(
        state: &mut WalletState,
        amount: Amount,
        to: AccountAddress,
    ) -> ShieldedResult<BuildOutcome> {
        let plan = Self::plan_transfer(state, amount, to)?;
        Self::commit(state, plan)
    }

    /// Move `amount` from the public balance into a new note
    pub fn build_shield(state: &mut WalletState, amount: Amount) -> ShieldedResult<BuildOutcome> {
        let plan = Self::plan_shield(state, amount)?;
        Self::commit(state, plan)
    }

    /// Spend notes worth `amount` to the public account `to`
    pub fn build_unshield(
        state: &mut WalletState,
        amount: Amount,
        to: AccountAddress,
    ) -> ShieldedResult<BuildOutcome> {
        let plan = Self::plan_unshield(state, amount, to)?;
        Self::commit(state, plan)
    }

    /// Spend notes worth `amount` into a new note for `to`
    pub fn build_private_send(
        state: &mut WalletState,
        amount: Amount,
        to: PrivacyAddress,
    ) -> ShieldedResult<BuildOutcome> {
        let plan = Self::plan_private_send(state, amount, to)?;
        Self::commit(state, plan)
    }

    pub fn plan_transfer(
        state: &WalletState,
        amount: Amount,
        to: AccountAddress,
    ) -> ShieldedResult<TransactionPlan> {
        require_positive(amount)?;
        require_public_funds(state, amount)?;

        let own = state.account().address();
        let transaction = Transaction::transfer(amount, &state.settings().public_asset, own, to);

        Ok(TransactionPlan {
            transaction,
            debit: amount,
            credit: if to == own { amount } else { Amount::ZERO },
            spends: Vec::new(),
            nullifiers: Vec::new(),
            outputs: Vec::new(),
            owned: Vec::new(),
            proof: None,
        })
    }

    pub fn plan_shield(state: &WalletState, amount: Amount) -> ShieldedResult<TransactionPlan> {
        require_positive(amount)?;
        let store = state.require_notes()?;
        require_public_funds(state, amount)?;

        let note = Note::new(amount, store.owner());
        store.check_ingest(&note)?;

        let transaction = Transaction::shield(
            amount,
            &state.settings().public_asset,
            state.account().address(),
            store.owner(),
        );

        Ok(TransactionPlan {
            transaction,
            debit: amount,
            credit: Amount::ZERO,
            spends: Vec::new(),
            nullifiers: Vec::new(),
            outputs: vec![note.clone()],
            owned: vec![note],
            proof: None,
        })
    }

    /// The public balance is credited only when `to` is this wallet's account
    pub fn plan_unshield(
        state: &WalletState,
        amount: Amount,
        to: AccountAddress,
    ) -> ShieldedResult<TransactionPlan> {
        require_positive(amount)?;
        let SpendSelection {
            spends,
            nullifiers,
            change,
        } = select_spend(state, amount)?;
        let owner = state.require_notes()?.owner();

        let transaction = Transaction::unshield(
            amount,
            &state.settings().public_asset,
            owner,
            to,
            nullifiers.clone(),
        )?;
        let outputs: Vec<Note> = change.into_iter().collect();

        Ok(TransactionPlan {
            transaction,
            debit: Amount::ZERO,
            credit: if to == state.account().address() {
                amount
            } else {
                Amount::ZERO
            },
            spends,
            nullifiers,
            owned: outputs.clone(),
            outputs,
            proof: None,
        })
    }

    /// A recipient note addressed to ourselves is ingested like change
    pub fn plan_private_send(
        state: &WalletState,
        amount: Amount,
        to: PrivacyAddress,
    ) -> ShieldedResult<TransactionPlan> {
        require_positive(amount)?;
        let SpendSelection {
            spends,
            nullifiers,
            change,
        } = select_spend(state, amount)?;
        let owner = state.require_notes()?.owner();

        let transaction = Transaction::private_send(
            amount,
            &state.settings().private_asset,
            owner,
            to,
            nullifiers.clone(),
        )?;

        let recipient = Note::new(amount, to);
        let mut outputs = vec![recipient];
        outputs.extend(change);
        let owned = outputs
            .iter()
            .filter(|note| note.owner() == owner)
            .cloned()
            .collect();

        Ok(TransactionPlan {
            transaction,
            debit: Amount::ZERO,
            credit: Amount::ZERO,
            spends,
            nullifiers,
            outputs,
            owned,
            proof: None,
        })
    }

    /// Apply a plan to `state`
    ///
    /// All preconditions are checked again before the first mutation, so a
    /// plan made stale by an earlier commit fails cleanly.
    pub fn commit(state: &mut WalletState, plan: TransactionPlan) -> ShieldedResult<BuildOutcome> {
        let balance = state
            .public_balance()
            .checked_sub(plan.debit)
            .ok_or_else(|| ShieldedError::InsufficientFunds {
                available: state.public_balance().to_string(),
                requested: plan.debit.to_string(),
            })?
            .checked_add(plan.credit)
            .ok_or_else(|| ShieldedError::InvalidAmount("public balance overflow".to_string()))?;

        if plan.touches_notes() {
            let store = state.require_notes()?;
            store.ensure_spendable(plan.spends.iter().map(|note| note.commitment()))?;
            for note in &plan.owned {
                store.check_ingest(note)?;
            }
        }

        let TransactionPlan {
            transaction,
            spends,
            nullifiers,
            outputs,
            owned,
            proof,
            ..
        } = plan;

        if !spends.is_empty() || !owned.is_empty() {
            let store = state.require_notes_mut()?;
            for note in &spends {
                store.mark_spent(note)?;
            }
            for note in owned {
                store.ingest(note)?;
            }
        }

        state.set_public_balance(balance);
        state.push_transaction(transaction.clone());

        info!(
            "Committed {} of {} {} ({} spent, {} created)",
            transaction.kind(),
            transaction.amount(),
            transaction.asset(),
            nullifiers.len(),
            outputs.len()
        );
        debug!(
            "Transaction {} to {}",
            transaction.id(),
            short_address(&transaction.to().to_string())
        );

        Ok(BuildOutcome {
            transaction,
            created_notes: outputs,
            nullifiers,
            proof,
        })
    }
}

fn require_positive(amount: Amount) -> ShieldedResult<()> {
    if amount.is_zero() {
        return Err(ShieldedError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn require_public_funds(state: &WalletState, amount: Amount) -> ShieldedResult<()> {
    if state.public_balance() < amount {
        return Err(ShieldedError::InsufficientFunds {
            available: state.public_balance().to_string(),
            requested: amount.to_string(),
        });
    }
    Ok(())
}

fn select_spend(state: &WalletState, amount: Amount) -> ShieldedResult<SpendSelection> {
    let store = state.require_notes()?;
    let spends = store.select_for_spend(amount)?;

    let total = Amount::sum(spends.iter().map(|note| note.amount()))?;
    let change = total
        .checked_sub(amount)
        .filter(|change| !change.is_zero())
        .map(|change| Note::new(change, store.owner()));
    let nullifiers = spends
        .iter()
        .map(|note| store.nullifier_for(note))
        .collect::<ShieldedResult<Vec<_>>>()?;

    Ok(SpendSelection {
        spends,
        nullifiers,
        change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::keys::{Account, KeyDerivation, Signature};
    use crate::state::WalletSettings;
    use crate::transaction::TxStatus;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn own_account() -> Account {
        Account::new(AccountAddress::new([7u8; 32]))
    }

    fn other_account() -> AccountAddress {
        AccountAddress::new([8u8; 32])
    }

    fn recipient() -> PrivacyAddress {
        PrivacyAddress::new([9u8; 32])
    }

    fn wallet(balance: &str) -> WalletState {
        let mut state = WalletState::new(own_account(), amt(balance), WalletSettings::default());
        let keys = KeyDerivation::new("Atoshi v1")
            .derive_from_signature(&own_account(), &Signature::new(vec![1u8; 64]))
            .unwrap();
        state.install_keys(keys).unwrap();
        state
    }

    fn snapshot(state: &WalletState) -> (Amount, Amount, usize, usize, usize) {
        let store = state.note_store().unwrap();
        (
            state.public_balance(),
            state.private_balance(),
            store.len(),
            store.nullifiers().len(),
            state.transactions().len(),
        )
    }

    #[test]
    fn test_scenario_shield_then_private_send() {
        let mut state = wallet("1.245");

        let shield = TransactionBuilder::build_shield(&mut state, amt("1.0")).unwrap();
        assert_eq!(state.public_balance(), amt("0.245"));
        assert_eq!(state.private_balance(), amt("1"));
        assert_eq!(shield.created_notes.len(), 1);
        assert_eq!(shield.created_notes[0].amount(), amt("1"));
        assert_eq!(shield.transaction.kind(), TransactionKind::Shield);
        assert_eq!(state.note_store().unwrap().unspent_count(), 1);

        let send =
            TransactionBuilder::build_private_send(&mut state, amt("0.5"), recipient()).unwrap();
        assert_eq!(send.nullifiers.len(), 1);
        assert_eq!(send.transaction.nullifier(), Some(send.nullifiers[0]));
        assert!(send.transaction.tx_hash().is_none());

        let recipient_note = &send.created_notes[0];
        assert_eq!(recipient_note.owner(), recipient());
        assert_eq!(recipient_note.amount(), amt("0.5"));
        let change = &send.created_notes[1];
        assert_eq!(change.owner(), state.privacy_address().unwrap());
        assert_eq!(change.amount(), amt("0.5"));

        let store = state.note_store().unwrap();
        assert!(store.is_spent(&shield.created_notes[0].commitment()));
        assert!(!store.contains(&recipient_note.commitment()));
        assert_eq!(state.private_balance(), amt("0.5"));
        assert_eq!(state.public_balance(), amt("0.245"));
        assert_eq!(state.transactions().len(), 2);
        assert_eq!(state.transactions()[1].kind(), TransactionKind::PrivateSend);
        assert_eq!(state.transactions()[1].asset(), "ATOS");
    }

    #[test]
    fn test_transfer_debits_public_balance() {
        let mut state = wallet("1.245");
        let outcome =
            TransactionBuilder::build_transfer(&mut state, amt("0.245"), other_account()).unwrap();

        assert_eq!(state.public_balance(), amt("1"));
        assert!(outcome.created_notes.is_empty());
        assert!(outcome.nullifiers.is_empty());
        assert!(outcome.transaction.tx_hash().is_some());
        assert_eq!(outcome.transaction.status(), TxStatus::Pending);
        assert_eq!(outcome.transaction.asset(), "ETH");
    }

    #[test]
    fn test_transfer_to_self_keeps_balance() {
        let mut state = wallet("1");
        let own = state.account().address();
        TransactionBuilder::build_transfer(&mut state, amt("0.4"), own).unwrap();
        assert_eq!(state.public_balance(), amt("1"));
    }

    #[test]
    fn test_transfer_rejects_zero_and_overdraft() {
        let mut state = wallet("1");
        let before = snapshot(&state);

        let err = TransactionBuilder::build_transfer(&mut state, Amount::ZERO, other_account())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err = TransactionBuilder::build_transfer(&mut state, amt("1.01"), other_account())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(snapshot(&state), before);
    }

    #[test]
    fn test_shield_requires_keys() {
        let mut state = WalletState::new(own_account(), amt("1"), WalletSettings::default());
        let err = TransactionBuilder::build_shield(&mut state, amt("0.5")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::KeysNotInitialized);
        assert_eq!(state.public_balance(), amt("1"));
        assert!(state.transactions().is_empty());
    }

    #[test]
    fn test_shield_unshield_round_trip() {
        let mut state = wallet("1.245");
        let own = state.account().address();

        TransactionBuilder::build_shield(&mut state, amt("0.7")).unwrap();
        let unshield = TransactionBuilder::build_unshield(&mut state, amt("0.7"), own).unwrap();

        assert_eq!(state.public_balance(), amt("1.245"));
        assert_eq!(state.private_balance(), Amount::ZERO);
        assert_eq!(state.note_store().unwrap().unspent_count(), 0);
        assert!(unshield.created_notes.is_empty());
        assert!(unshield.transaction.tx_hash().is_some());
        assert!(unshield.transaction.nullifier().is_some());
    }

    #[test]
    fn test_unshield_issues_change() {
        let mut state = wallet("2");
        let own = state.account().address();
        TransactionBuilder::build_shield(&mut state, amt("1.5")).unwrap();

        let outcome = TransactionBuilder::build_unshield(&mut state, amt("0.4"), own).unwrap();
        assert_eq!(outcome.created_notes.len(), 1);
        assert_eq!(outcome.created_notes[0].amount(), amt("1.1"));
        assert_eq!(state.private_balance(), amt("1.1"));
        assert_eq!(state.public_balance(), amt("0.9"));
    }

    #[test]
    fn test_unshield_to_foreign_account_does_not_credit() {
        let mut state = wallet("1");
        TransactionBuilder::build_shield(&mut state, amt("1")).unwrap();

        TransactionBuilder::build_unshield(&mut state, amt("1"), other_account()).unwrap();
        assert_eq!(state.public_balance(), Amount::ZERO);
        assert_eq!(state.private_balance(), Amount::ZERO);
    }

    #[test]
    fn test_unshield_insufficient_funds_leaves_state_unchanged() {
        let mut state = wallet("1");
        let own = state.account().address();
        TransactionBuilder::build_shield(&mut state, amt("0.6")).unwrap();
        let before = snapshot(&state);

        let err = TransactionBuilder::build_unshield(&mut state, amt("0.61"), own).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(snapshot(&state), before);
    }

    #[test]
    fn test_private_send_spends_multiple_notes() {
        let mut state = wallet("3");
        for a in ["1", "0.5", "0.25"] {
            TransactionBuilder::build_shield(&mut state, amt(a)).unwrap();
        }

        let outcome =
            TransactionBuilder::build_private_send(&mut state, amt("1.4"), recipient()).unwrap();
        assert_eq!(outcome.nullifiers.len(), 2);
        assert_eq!(outcome.transaction.spent_nullifiers(), outcome.nullifiers.as_slice());
        assert_eq!(outcome.created_notes[1].amount(), amt("0.1"));
        assert_eq!(state.private_balance(), amt("0.35"));
    }

    #[test]
    fn test_private_send_to_self_ingests_recipient_note() {
        let mut state = wallet("1");
        TransactionBuilder::build_shield(&mut state, amt("1")).unwrap();
        let own = state.privacy_address().unwrap();

        let outcome = TransactionBuilder::build_private_send(&mut state, amt("0.3"), own).unwrap();
        assert_eq!(outcome.created_notes.len(), 2);
        assert_eq!(state.private_balance(), amt("1"));
        assert_eq!(state.note_store().unwrap().unspent_count(), 2);
    }

    #[test]
    fn test_stale_plan_is_rejected_on_commit() {
        let mut state = wallet("1");
        TransactionBuilder::build_shield(&mut state, amt("1")).unwrap();

        let first = TransactionBuilder::plan_private_send(&state, amt("1"), recipient()).unwrap();
        let second = TransactionBuilder::plan_private_send(&state, amt("1"), recipient()).unwrap();
        TransactionBuilder::commit(&mut state, first).unwrap();
        let before = snapshot(&state);

        let err = TransactionBuilder::commit(&mut state, second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoteAlreadySpent);
        assert_eq!(snapshot(&state), before);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let mut state = wallet("1");
        TransactionBuilder::build_shield(&mut state, amt("0.5")).unwrap();
        let before = snapshot(&state);

        let plan = TransactionBuilder::plan_unshield(&state, amt("0.2"), other_account()).unwrap();
        assert_eq!(snapshot(&state), before);
        assert_eq!(plan.statement().nullifiers.len(), 1);
        assert_eq!(plan.statement().output_commitments.len(), 1);
    }

    #[test]
    fn test_every_transaction_has_valid_shape() {
        let mut state = wallet("5");
        let own = state.account().address();
        TransactionBuilder::build_transfer(&mut state, amt("1"), other_account()).unwrap();
        TransactionBuilder::build_shield(&mut state, amt("2")).unwrap();
        TransactionBuilder::build_private_send(&mut state, amt("0.5"), recipient()).unwrap();
        TransactionBuilder::build_unshield(&mut state, amt("1"), own).unwrap();

        for tx in state.transactions() {
            assert!(tx.has_valid_shape(), "{} has wrong shape", tx.kind());
        }
    }
}
