// Domain layer - registration business logic with no HTTP concerns

pub mod checksum;
pub mod folio;
pub mod identity;
pub mod registration;

use crate::crypto::EncryptionError;
use crate::db::connection::Retryable;
use crate::db::errors::{DatabaseError, EMAIL_UNIQUE, IDENTITY_HASH_UNIQUE};
use crate::domain::folio::LegacyFolioRejection;

// Domain error type - no HTTP concerns
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Privacy notice consent is required")]
    ConsentRequired,

    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("National id is already registered")]
    DuplicateIdentity,

    #[error("Legacy folio is already bound to another card")]
    DuplicateFolio,

    #[error("Invalid legacy folio: {0}")]
    InvalidFolio(LegacyFolioRejection),

    #[error("Legacy folio sequence exhausted under prefix {prefix}")]
    SequenceExhausted { prefix: String },

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    /// Machine-checkable error kind exposed to callers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingFields(_) | Self::InvalidField { .. } => "validation_error",
            Self::ConsentRequired => "consent_required",
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicateIdentity => "duplicate_identity",
            Self::DuplicateFolio => "duplicate_folio",
            Self::InvalidFolio(_) => "invalid_folio",
            Self::SequenceExhausted { .. } => "sequence_exhausted",
            Self::Encryption(_) => "encryption_error",
            Self::Store(_) => "store_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller can fix the request and try again
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::SequenceExhausted { .. } | Self::Encryption(_) | Self::Store(_) | Self::Internal(_)
        )
    }

    /// Map a unique violation raised while persisting onto the conflict it
    /// represents. `supplied_folio` tells whether the card's legacy folio
    /// came from the caller (conflict) or the sequence (replayable).
    pub fn from_persist(err: DatabaseError, supplied_folio: bool) -> Self {
        match err.violated_constraint() {
            Some(EMAIL_UNIQUE) => Self::DuplicateEmail,
            Some(IDENTITY_HASH_UNIQUE) => Self::DuplicateIdentity,
            Some(crate::db::errors::LEGACY_FOLIO_UNIQUE) if supplied_folio => Self::DuplicateFolio,
            _ => Self::Store(err),
        }
    }
}

impl Retryable for RegistrationError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

pub use checksum::compute_check_digit;
pub use folio::{
    allocate_next_legacy_folio, generate_digital_folio, resolve_card_folios, validate_legacy_folio,
};
pub use registration::Registrar;
