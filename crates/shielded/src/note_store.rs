//! Store of notes owned by the local privacy key pair
//!
//! The store maps commitment to note for every note the key pair can detect,
//! tracks which notes are dead, and keeps the append-only list of nullifiers
//! revealed by spends. A store opened with only an incoming viewing key lists
//! notes and reports a balance but cannot spend.

use crate::amount::Amount;
use crate::crypto::ShieldedCrypto;
use crate::error::{ShieldedError, ShieldedResult};
use crate::keys::{
    short_address, IncomingViewingKey, PrivacyAddress, PrivacyKeyPair, SpendingKey,
};
use crate::note::{Note, NoteCommitment, Nullifier};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct StoredNote {
    note: Note,
    /// Set once the note is spent
    nullifier: Option<Nullifier>,
}

/// Notes owned by one privacy key pair
#[derive(Debug, Clone)]
pub struct NoteStore {
    viewer: IncomingViewingKey,
    /// Absent for view-only stores
    spending_key: Option<SpendingKey>,
    notes: BTreeMap<NoteCommitment, StoredNote>,
    nullifiers: Vec<Nullifier>,
    revealed: HashSet<Nullifier>,
}

impl NoteStore {
    /// Create an empty store for an initialized key pair
    pub fn new(keys: &PrivacyKeyPair) -> ShieldedResult<Self> {
        let viewer = keys.incoming_viewing_key()?;
        Ok(Self::open(viewer, Some(keys.spending_key().clone())))
    }

    /// Create an empty store that can detect notes but never spend them
    pub fn view_only(viewer: IncomingViewingKey) -> Self {
        debug!("Opened view-only note store for viewer {}", viewer.fingerprint());
        Self::open(viewer, None)
    }

    fn open(viewer: IncomingViewingKey, spending_key: Option<SpendingKey>) -> Self {
        Self {
            viewer,
            spending_key,
            notes: BTreeMap::new(),
            nullifiers: Vec::new(),
            revealed: HashSet::new(),
        }
    }

    pub fn owner(&self) -> PrivacyAddress {
        self.viewer.address()
    }

    pub fn can_spend(&self) -> bool {
        self.spending_key.is_some()
    }

    /// True when `note` is addressed to this store's viewer and opens correctly
    pub fn detect(&self, note: &Note) -> bool {
        note.owner() == self.viewer.address() && note.verify_commitment()
    }

    /// Add a note owned by this store's key pair
    ///
    /// Ingesting a commitment that is already known fails with `DuplicateNote`
    /// and leaves the store unchanged.
    pub fn ingest(&mut self, note: Note) -> ShieldedResult<()> {
        self.check_ingest(&note)?;

        debug!(
            "Ingested note {} of {}",
            short_address(&note.commitment().to_string()),
            note.amount()
        );
        self.notes.insert(
            note.commitment(),
            StoredNote {
                note,
                nullifier: None,
            },
        );
        Ok(())
    }

    /// Validate that `note` could be ingested, without ingesting it
    pub fn check_ingest(&self, note: &Note) -> ShieldedResult<()> {
        if note.owner() != self.owner() {
            return Err(ShieldedError::InvalidAddress(format!(
                "note is addressed to {}, not to this wallet",
                note.owner()
            )));
        }

        if !note.verify_commitment() {
            return Err(ShieldedError::Other(anyhow::anyhow!(
                "note commitment {} does not match its opening",
                note.commitment()
            )));
        }

        if note.amount().is_zero() {
            return Err(ShieldedError::InvalidAmount(
                "cannot ingest a zero-value note".to_string(),
            ));
        }

        if self.notes.contains_key(&note.commitment()) {
            warn!("Rejected duplicate note {}", note.commitment());
            return Err(ShieldedError::DuplicateNote(note.commitment().to_string()));
        }

        if self.private_balance().checked_add(note.amount()).is_none() {
            return Err(ShieldedError::InvalidAmount(
                "private balance would overflow".to_string(),
            ));
        }

        Ok(())
    }

    /// Select unspent notes covering `amount`
    ///
    /// A single note matching `amount` exactly is preferred. Otherwise notes
    /// are taken largest first (ties broken by commitment) until the sum
    /// reaches `amount`, which yields a minimum-cardinality cover.
    pub fn select_for_spend(&self, amount: Amount) -> ShieldedResult<Vec<Note>> {
        if amount.is_zero() {
            return Err(ShieldedError::InvalidAmount(
                "cannot select notes for a zero amount".to_string(),
            ));
        }

        let mut unspent: Vec<&Note> = self.unspent().collect();

        // BTreeMap iteration is ordered by commitment, so the first match is deterministic
        if let Some(exact) = unspent.iter().find(|note| note.amount() == amount) {
            return Ok(vec![(*exact).clone()]);
        }

        unspent.sort_by(|a, b| {
            b.amount()
                .cmp(&a.amount())
                .then_with(|| a.commitment().cmp(&b.commitment()))
        });

        let mut selected = Vec::new();
        let mut total = Amount::ZERO;
        for note in unspent {
            selected.push(note.clone());
            total = total.checked_add(note.amount()).unwrap_or(total);
            if total >= amount {
                return Ok(selected);
            }
        }

        Err(ShieldedError::InsufficientFunds {
            available: total.to_string(),
            requested: amount.to_string(),
        })
    }

    /// The nullifier `note` reveals when spent; needs the spending key
    pub fn nullifier_for(&self, note: &Note) -> ShieldedResult<Nullifier> {
        let spending_key = self.spending_key.as_ref().ok_or(ShieldedError::ViewOnly)?;
        Ok(Nullifier::new(ShieldedCrypto::nullifier(
            spending_key.as_bytes(),
            note.commitment().as_bytes(),
        )))
    }

    /// Fail unless every commitment names a known, unspent note
    pub fn ensure_spendable<I>(&self, commitments: I) -> ShieldedResult<()>
    where
        I: IntoIterator<Item = NoteCommitment>,
    {
        for commitment in commitments {
            match self.notes.get(&commitment) {
                None => return Err(ShieldedError::NoteNotFound(commitment.to_string())),
                Some(stored) if stored.nullifier.is_some() => {
                    return Err(ShieldedError::NoteAlreadySpent(commitment.to_string()))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Mark `note` dead and return its nullifier
    ///
    /// A second call for the same note fails with `NoteAlreadySpent`.
    pub fn mark_spent(&mut self, note: &Note) -> ShieldedResult<Nullifier> {
        let commitment = note.commitment();
        self.ensure_spendable(std::iter::once(commitment))?;

        let nullifier = self.nullifier_for(note)?;
        if self.revealed.contains(&nullifier) {
            return Err(ShieldedError::NoteAlreadySpent(commitment.to_string()));
        }

        if let Some(stored) = self.notes.get_mut(&commitment) {
            stored.nullifier = Some(nullifier);
        }
        self.revealed.insert(nullifier);
        self.nullifiers.push(nullifier);

        info!(
            "Spent note {} of {}, revealed {}",
            short_address(&commitment.to_string()),
            note.amount(),
            short_address(&nullifier.to_string())
        );
        Ok(nullifier)
    }

    /// Sum of amounts over notes not yet spent
    pub fn private_balance(&self) -> Amount {
        // Ingest rejects notes that would overflow the balance
        self.unspent()
            .fold(Amount::ZERO, |acc, note| acc.checked_add(note.amount()).unwrap_or(acc))
    }

    pub fn unspent(&self) -> impl Iterator<Item = &Note> {
        self.notes
            .values()
            .filter(|stored| stored.nullifier.is_none())
            .map(|stored| &stored.note)
    }

    pub fn contains(&self, commitment: &NoteCommitment) -> bool {
        self.notes.contains_key(commitment)
    }

    pub fn is_spent(&self, commitment: &NoteCommitment) -> bool {
        self.notes
            .get(commitment)
            .map(|stored| stored.nullifier.is_some())
            .unwrap_or(false)
    }

    /// Nullifiers revealed so far, in spend order
    pub fn nullifiers(&self) -> &[Nullifier] {
        &self.nullifiers
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn unspent_count(&self) -> usize {
        self.unspent().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::keys::{Account, AccountAddress, KeyDerivation, Signature};

    fn keys() -> PrivacyKeyPair {
        KeyDerivation::new("Atoshi v1")
            .derive_from_signature(
                &Account::new(AccountAddress::new([1u8; 32])),
                &Signature::new(vec![2u8; 64]),
            )
            .unwrap()
    }

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn store_with(amounts: &[&str]) -> (NoteStore, Vec<Note>) {
        let keys = keys();
        let mut store = NoteStore::new(&keys).unwrap();
        let mut notes = Vec::new();
        for a in amounts {
            let note = Note::new(amt(a), keys.public_address());
            store.ingest(note.clone()).unwrap();
            notes.push(note);
        }
        (store, notes)
    }

    fn total(notes: &[Note]) -> Amount {
        notes
            .iter()
            .fold(Amount::ZERO, |acc, n| acc.checked_add(n.amount()).unwrap())
    }

    #[test]
    fn test_new_requires_initialized_keys() {
        let err = NoteStore::new(&PrivacyKeyPair::uninitialized()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeysNotInitialized);
    }

    #[test]
    fn test_ingest_rejects_duplicates() {
        let (mut store, notes) = store_with(&["1.0"]);

        let err = store.ingest(notes[0].clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateNote);
        assert_eq!(store.len(), 1);
        assert_eq!(store.private_balance(), amt("1"));
    }

    #[test]
    fn test_ingest_rejects_foreign_notes() {
        let (mut store, _) = store_with(&[]);
        let foreign = Note::new(amt("1"), PrivacyAddress::new([9u8; 32]));

        let err = store.ingest(foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert!(store.is_empty());
    }

    #[test]
    fn test_ingest_rejects_zero_value_notes() {
        let (mut store, _) = store_with(&["1"]);
        let empty = Note::new(Amount::ZERO, store.owner());

        let err = store.ingest(empty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ingest_rejects_deserialized_negative_note() {
        let (store, notes) = store_with(&["1"]);
        let mut json = serde_json::to_value(&notes[0]).unwrap();
        json["amount"] = serde_json::Value::String("-5".to_string());

        assert!(serde_json::from_value::<Note>(json).is_err());
        assert_eq!(store.private_balance(), amt("1"));
    }

    #[test]
    fn test_view_only_store_detects_but_cannot_spend() {
        let keys = keys();
        let mut viewer = NoteStore::view_only(keys.incoming_viewing_key().unwrap());
        assert!(!viewer.can_spend());

        let mine = Note::new(amt("0.75"), keys.public_address());
        let foreign = Note::new(amt("0.75"), PrivacyAddress::new([9u8; 32]));
        assert!(viewer.detect(&mine));
        assert!(!viewer.detect(&foreign));

        viewer.ingest(mine.clone()).unwrap();
        assert_eq!(viewer.private_balance(), amt("0.75"));
        assert_eq!(viewer.select_for_spend(amt("0.5")).unwrap(), vec![mine.clone()]);

        let err = viewer.mark_spent(&mine).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ViewOnly);
        assert_eq!(viewer.nullifier_for(&mine).unwrap_err().kind(), ErrorKind::ViewOnly);
        assert!(viewer.nullifiers().is_empty());
        assert!(!viewer.is_spent(&mine.commitment()));
        assert_eq!(viewer.private_balance(), amt("0.75"));
    }

    #[test]
    fn test_full_store_can_spend() {
        let (store, notes) = store_with(&["1"]);
        assert!(store.can_spend());
        assert!(store.detect(&notes[0]));
    }

    #[test]
    fn test_select_prefers_exact_match() {
        let (store, notes) = store_with(&["5", "0.5", "2"]);

        let selected = store.select_for_spend(amt("0.5")).unwrap();
        assert_eq!(selected, vec![notes[1].clone()]);
    }

    #[test]
    fn test_select_largest_first() {
        let (store, _) = store_with(&["1", "3", "2", "0.5"]);

        let selected = store.select_for_spend(amt("4")).unwrap();
        let amounts: Vec<Amount> = selected.iter().map(|n| n.amount()).collect();
        assert_eq!(amounts, vec![amt("3"), amt("2")]);
    }

    #[test]
    fn test_select_minimal_cardinality() {
        let (store, _) = store_with(&["0.1", "0.1", "0.1", "0.1", "0.45"]);

        let selected = store.select_for_spend(amt("0.5")).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(total(&selected) >= amt("0.5"));
    }

    #[test]
    fn test_select_is_deterministic() {
        let (store, _) = store_with(&["1", "1", "1", "2"]);

        let first = store.select_for_spend(amt("2.5")).unwrap();
        let second = store.select_for_spend(amt("2.5")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_select_insufficient_funds() {
        let (store, _) = store_with(&["1", "0.2"]);

        let err = store.select_for_spend(amt("1.5")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        match err {
            ShieldedError::InsufficientFunds { available, requested } => {
                assert_eq!(available, "1.2");
                assert_eq!(requested, "1.5");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_select_skips_spent_notes() {
        let (mut store, notes) = store_with(&["1", "2"]);
        store.mark_spent(&notes[1]).unwrap();

        let selected = store.select_for_spend(amt("1")).unwrap();
        assert_eq!(selected, vec![notes[0].clone()]);
        assert!(store.select_for_spend(amt("1.5")).is_err());
    }

    #[test]
    fn test_mark_spent_twice_fails() {
        let (mut store, notes) = store_with(&["1"]);

        let nullifier = store.mark_spent(&notes[0]).unwrap();
        assert_eq!(nullifier, store.nullifier_for(&notes[0]).unwrap());

        let err = store.mark_spent(&notes[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoteAlreadySpent);
        assert_eq!(store.nullifiers(), &[nullifier]);
    }

    #[test]
    fn test_mark_spent_unknown_note() {
        let (mut store, _) = store_with(&[]);
        let stranger = Note::new(amt("1"), store.owner());

        let err = store.mark_spent(&stranger).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoteNotFound);
        assert!(store.nullifiers().is_empty());
    }

    #[test]
    fn test_private_balance_tracks_unspent_notes() {
        let (mut store, notes) = store_with(&["1", "0.25", "0.5"]);
        assert_eq!(store.private_balance(), amt("1.75"));

        store.mark_spent(&notes[0]).unwrap();
        assert_eq!(store.private_balance(), amt("0.75"));
        assert_eq!(store.unspent_count(), 2);
        assert_eq!(store.len(), 3);
        assert!(store.is_spent(&notes[0].commitment()));
    }

    #[test]
    fn test_nullifiers_are_unique_per_note() {
        let (mut store, notes) = store_with(&["1", "1", "1"]);
        for note in &notes {
            store.mark_spent(note).unwrap();
        }

        let unique: HashSet<_> = store.nullifiers().iter().collect();
        assert_eq!(unique.len(), 3);
    }
}
