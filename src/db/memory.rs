//! In-process implementation of the registration store.
//!
//! Mirrors the Postgres schema's guarantees: store-assigned ids, the same
//! unique keys (reported under the same constraint names), transactional
//! visibility, and a sequence lock that serializes legacy folio allocation.
//! Lets the registrar run without a database; the test suite drives it
//! with the fault hooks compiled in under `cfg(test)`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

use crate::db::errors::{
    DatabaseError, Result, ACTIVE_CARD_UNIQUE, DIGITAL_FOLIO_UNIQUE, EMAIL_UNIQUE,
    IDENTITY_HASH_UNIQUE, LEGACY_FOLIO_UNIQUE,
};
use crate::db::store::{NewBeneficiary, NewCard, RegistrationStore, RegistrationTx};

#[derive(Debug, Clone)]
pub struct StoredBeneficiary {
    pub id: i64,
    pub row: NewBeneficiary,
}

#[derive(Debug, Clone)]
pub struct StoredCard {
    pub id: i64,
    pub row: NewCard,
}

#[derive(Debug, Default)]
struct State {
    beneficiaries: Vec<StoredBeneficiary>,
    cards: Vec<StoredCard>,
    #[cfg(test)]
    fail_next_card_insert: bool,
    #[cfg(test)]
    conflicting_folio_on_next_max_read: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    sequence_lock: Arc<tokio::sync::Mutex<()>>,
    next_beneficiary_id: AtomicI64,
    next_card_id: AtomicI64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRegistrationStore {
    inner: Arc<Inner>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        lock_state(&self.inner)
    }

    /// Insert a committed card for a synthetic beneficiary, as if an
    /// earlier registration had issued it
    pub fn seed_card(&self, legacy_folio: &str, digital_folio: &str) -> Result<i64> {
        let beneficiary_id = self.inner.next_beneficiary_id.fetch_add(1, Ordering::SeqCst) + 1;
        let card_id = self.inner.next_card_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state()?;
        state.cards.push(StoredCard {
            id: card_id,
            row: NewCard {
                beneficiary_id,
                digital_folio: digital_folio.to_string(),
                legacy_folio: legacy_folio.to_string(),
                card_type: crate::models::CardType::Digital,
                status: "active".to_string(),
            },
        });
        Ok(card_id)
    }

    /// Make the next card insert in any transaction fail with a store error
    #[cfg(test)]
    pub fn fail_next_card_insert(&self) -> Result<()> {
        self.state()?.fail_next_card_insert = true;
        Ok(())
    }

    /// Simulate a concurrent registration committing `legacy_folio` right
    /// after the next maximum-folio read, before the reader inserts
    #[cfg(test)]
    pub fn commit_conflicting_folio_after_next_max_read(&self, legacy_folio: &str) -> Result<()> {
        self.state()?.conflicting_folio_on_next_max_read = Some(legacy_folio.to_string());
        Ok(())
    }

    pub fn beneficiaries(&self) -> Vec<StoredBeneficiary> {
        self.state().map(|s| s.beneficiaries.clone()).unwrap_or_default()
    }

    pub fn cards(&self) -> Vec<StoredCard> {
        self.state().map(|s| s.cards.clone()).unwrap_or_default()
    }
}

fn lock_state(inner: &Inner) -> Result<MutexGuard<'_, State>> {
    inner
        .state
        .lock()
        .map_err(|_| DatabaseError::ConnectionError("In-memory store lock poisoned".to_string()))
}

fn unique_violation(constraint: &str) -> DatabaseError {
    DatabaseError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn beneficiary_conflict(existing: &[StoredBeneficiary], row: &NewBeneficiary) -> Option<&'static str> {
    if existing.iter().any(|b| b.row.email == row.email) {
        Some(EMAIL_UNIQUE)
    } else if existing.iter().any(|b| b.row.national_id_hash == row.national_id_hash) {
        Some(IDENTITY_HASH_UNIQUE)
    } else {
        None
    }
}

fn card_conflict(existing: &[StoredCard], row: &NewCard) -> Option<&'static str> {
    if existing.iter().any(|c| c.row.digital_folio == row.digital_folio) {
        Some(DIGITAL_FOLIO_UNIQUE)
    } else if existing.iter().any(|c| c.row.legacy_folio == row.legacy_folio) {
        Some(LEGACY_FOLIO_UNIQUE)
    } else if row.status == "active"
        && existing
            .iter()
            .any(|c| c.row.beneficiary_id == row.beneficiary_id && c.row.status == "active")
    {
        Some(ACTIVE_CARD_UNIQUE)
    } else {
        None
    }
}

fn max_matching(cards: &[StoredCard], prefix: &str) -> Option<String> {
    cards
        .iter()
        .map(|c| &c.row.legacy_folio)
        .filter(|f| f.len() == 16 && f.starts_with(prefix) && f.bytes().all(|b| b.is_ascii_digit()))
        .max()
        .cloned()
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn ping(&self) -> Result<()> {
        self.state().map(|_| ())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.state()?.beneficiaries.iter().any(|b| b.row.email == email))
    }

    async fn identity_hash_exists(&self, national_id_hash: &str) -> Result<bool> {
        Ok(self
            .state()?
            .beneficiaries
            .iter()
            .any(|b| b.row.national_id_hash == national_id_hash))
    }

    async fn legacy_folio_exists(&self, legacy_folio: &str) -> Result<bool> {
        Ok(self.state()?.cards.iter().any(|c| c.row.legacy_folio == legacy_folio))
    }

    async fn begin(&self) -> Result<Box<dyn RegistrationTx>> {
        Ok(Box::new(MemoryRegistrationTx {
            inner: Arc::clone(&self.inner),
            sequence_guard: None,
            beneficiaries: Vec::new(),
            cards: Vec::new(),
        }))
    }
}

/// Pending writes are private to the transaction until commit
pub struct MemoryRegistrationTx {
    inner: Arc<Inner>,
    sequence_guard: Option<OwnedMutexGuard<()>>,
    beneficiaries: Vec<StoredBeneficiary>,
    cards: Vec<StoredCard>,
}

#[async_trait]
impl RegistrationTx for MemoryRegistrationTx {
    async fn lock_legacy_sequence(&mut self) -> Result<()> {
        if self.sequence_guard.is_none() {
            let lock = Arc::clone(&self.inner.sequence_lock);
            self.sequence_guard = Some(lock.lock_owned().await);
        }
        Ok(())
    }

    async fn max_legacy_folio(&mut self, prefix: &str) -> Result<Option<String>> {
        #[cfg_attr(not(test), allow(unused_mut))]
        let mut state = lock_state(&self.inner)?;

        let mut visible = state.cards.clone();
        visible.extend(self.cards.iter().cloned());
        let max = max_matching(&visible, prefix);

        #[cfg(test)]
        if let Some(folio) = state.conflicting_folio_on_next_max_read.take() {
            let beneficiary_id = self.inner.next_beneficiary_id.fetch_add(1, Ordering::SeqCst) + 1;
            let card_id = self.inner.next_card_id.fetch_add(1, Ordering::SeqCst) + 1;
            state.cards.push(StoredCard {
                id: card_id,
                row: NewCard {
                    beneficiary_id,
                    digital_folio: format!("concurrent-{}", card_id),
                    legacy_folio: folio,
                    card_type: crate::models::CardType::Digital,
                    status: "active".to_string(),
                },
            });
        }

        Ok(max)
    }

    async fn legacy_folio_exists(&mut self, legacy_folio: &str) -> Result<bool> {
        let state = lock_state(&self.inner)?;
        Ok(state
            .cards
            .iter()
            .chain(self.cards.iter())
            .any(|c| c.row.legacy_folio == legacy_folio))
    }

    async fn insert_beneficiary(&mut self, beneficiary: &NewBeneficiary) -> Result<i64> {
        {
            let state = lock_state(&self.inner)?;
            if let Some(constraint) = beneficiary_conflict(&state.beneficiaries, beneficiary)
                .or_else(|| beneficiary_conflict(&self.beneficiaries, beneficiary))
            {
                return Err(unique_violation(constraint));
            }
        }

        let id = self.inner.next_beneficiary_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.beneficiaries.push(StoredBeneficiary {
            id,
            row: beneficiary.clone(),
        });
        Ok(id)
    }

    async fn insert_card(&mut self, card: &NewCard) -> Result<i64> {
        {
            #[cfg_attr(not(test), allow(unused_mut))]
            let mut state = lock_state(&self.inner)?;
            #[cfg(test)]
            if std::mem::take(&mut state.fail_next_card_insert) {
                return Err(DatabaseError::TransactionError(
                    "injected failure while inserting card".to_string(),
                ));
            }
            if let Some(constraint) =
                card_conflict(&state.cards, card).or_else(|| card_conflict(&self.cards, card))
            {
                return Err(unique_violation(constraint));
            }
        }

        let id = self.inner.next_card_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.cards.push(StoredCard { id, row: card.clone() });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut state = lock_state(&this.inner)?;

        // Re-check against rows committed since our inserts
        for b in &this.beneficiaries {
            if let Some(constraint) = beneficiary_conflict(&state.beneficiaries, &b.row) {
                return Err(unique_violation(constraint));
            }
        }
        for c in &this.cards {
            if let Some(constraint) = card_conflict(&state.cards, &c.row) {
                return Err(unique_violation(constraint));
            }
        }

        state.beneficiaries.extend(this.beneficiaries);
        state.cards.extend(this.cards);
        drop(state);
        drop(this.sequence_guard);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Pending rows and the sequence guard are dropped with the transaction
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardType;

    fn card(beneficiary_id: i64, legacy: &str) -> NewCard {
        NewCard {
            beneficiary_id,
            digital_folio: format!("BJ-2026-10-{:06}-0", beneficiary_id),
            legacy_folio: legacy.to_string(),
            card_type: CardType::Digital,
            status: "active".to_string(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_rows_are_invisible() {
        let store = MemoryRegistrationStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_card(&card(1, "1234567890120001")).await.unwrap();

        assert!(!store.legacy_folio_exists("1234567890120001").await.unwrap());
        assert!(tx.legacy_folio_exists("1234567890120001").await.unwrap());

        tx.rollback().await.unwrap();
        assert!(store.cards().is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_rows() {
        let store = MemoryRegistrationStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_card(&card(1, "1234567890120001")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.legacy_folio_exists("1234567890120001").await.unwrap());
        assert_eq!(store.cards().len(), 1);
    }

    #[tokio::test]
    async fn test_max_legacy_folio_ignores_other_prefixes() {
        let store = MemoryRegistrationStore::new();
        store.seed_card("1234567890120007", "a").unwrap();
        store.seed_card("9999999999999999", "b").unwrap();
        store.seed_card("12345678901200", "c").unwrap();

        let mut tx = store.begin().await.unwrap();
        let max = tx.max_legacy_folio("123456789012").await.unwrap();
        assert_eq!(max.as_deref(), Some("1234567890120007"));
    }

    #[tokio::test]
    async fn test_duplicate_legacy_folio_reports_constraint() {
        let store = MemoryRegistrationStore::new();
        store.seed_card("1234567890120001", "a").unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_card(&card(5, "1234567890120001")).await.unwrap_err();
        assert_eq!(err.violated_constraint(), Some(LEGACY_FOLIO_UNIQUE));
    }
}
