use thiserror::Error;

/// Unique constraint names declared in `migrations/`. The in-memory store
/// reports conflicts with the same names so callers classify both alike.
pub const EMAIL_UNIQUE: &str = "beneficiary_email_key";
pub const IDENTITY_HASH_UNIQUE: &str = "beneficiary_national_id_hash_key";
pub const DIGITAL_FOLIO_UNIQUE: &str = "membership_card_digital_folio_key";
pub const LEGACY_FOLIO_UNIQUE: &str = "membership_card_legacy_folio_key";
pub const ACTIVE_CARD_UNIQUE: &str = "membership_card_one_active_per_beneficiary";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Query execution error: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl DatabaseError {
    /// Classify a sqlx error, lifting Postgres unique violations (23505) into
    /// `UniqueViolation` so callers can tell which key collided.
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let Some(db_error) = e.as_database_error() {
            if db_error.code().as_deref() == Some("23505") {
                return Self::UniqueViolation {
                    constraint: db_error.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        Self::QueryError(e)
    }

    /// Name of the violated unique constraint, if this is a unique violation
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            Self::UniqueViolation { constraint } => Some(constraint.as_str()),
            _ => None,
        }
    }

    /// Check if this error is transient and the whole transaction may be replayed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UniqueViolation { constraint } => constraint == LEGACY_FOLIO_UNIQUE,
            Self::QueryError(e) => {
                if let Some(db_error) = e.as_database_error() {
                    matches!(db_error.code().as_deref(),
                        Some("40001") | // serialization_failure
                        Some("40P01")   // deadlock_detected
                    )
                } else {
                    false
                }
            }
            Self::ConnectionError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
