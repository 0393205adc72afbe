// Relational store seam used by the registration flow.
// The Postgres implementation lives in `postgres.rs`, the in-process one in `memory.rs`.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::errors::Result;
use crate::models::CardType;

/// Beneficiary row as written at registration time.
/// Sensitive fields arrive already encrypted or hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBeneficiary {
    pub given_name: String,
    pub paternal_surname: String,
    pub maternal_surname: Option<String>,
    pub national_id_encrypted: String,
    pub national_id_hash: String,
    pub birth_date: Option<NaiveDate>,
    pub phone_encrypted: Option<String>,
    pub gender: Option<String>,
    pub password_hash: String,
    pub email: String,
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub postal_code: Option<String>,
    pub municipality: Option<String>,
    pub exterior_number: Option<String>,
    pub interior_number: Option<String>,
}

/// Membership card row binding a beneficiary to both folios
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCard {
    pub beneficiary_id: i64,
    pub digital_folio: String,
    pub legacy_folio: String,
    pub card_type: CardType,
    pub status: String,
}

/// Read-only lookups plus the entry point for a write transaction.
///
/// The handle is owned by the caller and injected into the registration
/// flow; implementations validate their connections themselves.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Liveness probe for the underlying connection
    async fn ping(&self) -> Result<()>;

    async fn email_exists(&self, email: &str) -> Result<bool>;

    async fn identity_hash_exists(&self, national_id_hash: &str) -> Result<bool>;

    async fn legacy_folio_exists(&self, legacy_folio: &str) -> Result<bool>;

    /// Open a transaction. Nothing written through it is visible to
    /// other callers until `commit`.
    async fn begin(&self) -> Result<Box<dyn RegistrationTx>>;
}

/// Writes and reads scoped to a single transaction
#[async_trait]
pub trait RegistrationTx: Send {
    /// Serialize legacy folio allocation with other transactions until this
    /// one ends. Must be called before `max_legacy_folio` when allocating.
    async fn lock_legacy_sequence(&mut self) -> Result<()>;

    /// Highest 16-digit legacy folio under `prefix`, if any
    async fn max_legacy_folio(&mut self, prefix: &str) -> Result<Option<String>>;

    async fn legacy_folio_exists(&mut self, legacy_folio: &str) -> Result<bool>;

    /// Insert the beneficiary and return its store-assigned id
    async fn insert_beneficiary(&mut self, beneficiary: &NewBeneficiary) -> Result<i64>;

    /// Insert the card and return its store-assigned id
    async fn insert_card(&mut self, card: &NewCard) -> Result<i64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
