use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::db::errors::{DatabaseError, Result};
use crate::db::store::{NewBeneficiary, NewCard, RegistrationStore, RegistrationTx};

/// Advisory lock key guarding legacy folio allocation ("LEGACY" in ASCII)
const LEGACY_SEQUENCE_LOCK_KEY: i64 = 0x4C45_4741_4359;

/// Postgres-backed store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::ConnectionError(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM beneficiary WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(exists)
    }

    async fn identity_hash_exists(&self, national_id_hash: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM beneficiary WHERE national_id_hash = $1)",
        )
        .bind(national_id_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(exists)
    }

    async fn legacy_folio_exists(&self, legacy_folio: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM membership_card WHERE legacy_folio = $1)",
        )
        .bind(legacy_folio)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(exists)
    }

    async fn begin(&self) -> Result<Box<dyn RegistrationTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionError(format!("Failed to start transaction: {}", e)))?;

        Ok(Box::new(PgRegistrationTx { tx }))
    }
}

pub struct PgRegistrationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RegistrationTx for PgRegistrationTx {
    async fn lock_legacy_sequence(&mut self) -> Result<()> {
        debug!("Acquiring legacy folio sequence lock");

        // Released automatically at commit or rollback
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LEGACY_SEQUENCE_LOCK_KEY)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    async fn max_legacy_folio(&mut self, prefix: &str) -> Result<Option<String>> {
        // Same-length digit strings sort lexically in numeric order
        let folio = sqlx::query_scalar::<_, String>(
            r#"
            SELECT legacy_folio
            FROM membership_card
            WHERE legacy_folio LIKE $1
              AND legacy_folio ~ '^[0-9]{16}$'
            ORDER BY legacy_folio DESC
            LIMIT 1
            "#,
        )
        .bind(format!("{}%", prefix))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(folio)
    }

    async fn legacy_folio_exists(&mut self, legacy_folio: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM membership_card WHERE legacy_folio = $1)",
        )
        .bind(legacy_folio)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(exists)
    }

    async fn insert_beneficiary(&mut self, b: &NewBeneficiary) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO beneficiary (
                given_name, paternal_surname, maternal_surname,
                national_id_encrypted, national_id_hash, birth_date,
                phone_encrypted, gender, password_hash, email,
                street, neighborhood, postal_code, municipality,
                exterior_number, interior_number, consent_accepted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW())
            RETURNING id
            "#,
        )
        .bind(&b.given_name)
        .bind(&b.paternal_surname)
        .bind(&b.maternal_surname)
        .bind(&b.national_id_encrypted)
        .bind(&b.national_id_hash)
        .bind(b.birth_date)
        .bind(&b.phone_encrypted)
        .bind(&b.gender)
        .bind(&b.password_hash)
        .bind(&b.email)
        .bind(&b.street)
        .bind(&b.neighborhood)
        .bind(&b.postal_code)
        .bind(&b.municipality)
        .bind(&b.exterior_number)
        .bind(&b.interior_number)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        info!(beneficiary_id = id, "Inserted beneficiary");
        Ok(id)
    }

    async fn insert_card(&mut self, card: &NewCard) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO membership_card (
                beneficiary_id, digital_folio, legacy_folio, card_type, status
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(card.beneficiary_id)
        .bind(&card.digital_folio)
        .bind(&card.legacy_folio)
        .bind(card.card_type.as_str())
        .bind(&card.status)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        info!(card_id = id, beneficiary_id = card.beneficiary_id, "Inserted membership card");
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::TransactionError(format!("Failed to commit: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::TransactionError(format!("Failed to roll back: {}", e)))
    }
}
