pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod domain;
pub mod models;
pub mod secrets;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};

pub use db::{
    create_pool, with_retry, DatabaseError, MemoryRegistrationStore, PgRegistrationStore,
    RegistrationStore,
};

pub use domain::{Registrar, RegistrationError};

pub use domain::folio::{
    format_legacy_folio_display, generate_digital_folio, validate_legacy_folio,
    LegacyFolioRejection,
};

pub use models::{CardType, RegistrationRequest, RegistrationResponse};
