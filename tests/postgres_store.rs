//! Runs against a real Postgres. Set TEST_DATABASE_URL (or DATABASE_URL) and
//! run with `--ignored`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

use youth_card_registry::crypto::{EncryptionError, FieldEncryptor};
use youth_card_registry::db::{create_pool, run_migrations, PgRegistrationStore, RegistrationStore};
use youth_card_registry::domain::folio::validate_legacy_folio;
use youth_card_registry::models::{CardType, RegistrationRequest};
use youth_card_registry::{Registrar, RegistrationError};

/// Marks values instead of encrypting them
struct PassthroughEncryptor;

#[async_trait]
impl FieldEncryptor for PassthroughEncryptor {
    async fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        Ok(format!("plain:{}", plaintext))
    }

    async fn decrypt(&self, ciphertext: &str) -> Option<String> {
        ciphertext.strip_prefix("plain:").map(str::to_string)
    }
}

async fn setup_store() -> PgRegistrationStore {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests"));

    let pool = create_pool(&database_url).await.expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    PgRegistrationStore::new(pool)
}

/// Unique per run so tests can share a database without cleanup
fn run_tag() -> String {
    format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn request(tag: &str, n: usize) -> RegistrationRequest {
    serde_json::from_value(json!({
        "nombre": "Prueba",
        "apellidoPaterno": "Integración",
        "curp": format!("TEST{}X{:04}", tag, n),
        "correo": format!("pg-{}-{}@example.com", tag, n),
        "password": "integration-pass",
        "consentimientoAceptado": "si",
    }))
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_ping() {
    let store = setup_store().await;
    store.ping().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_register_persists_card() {
    let store = setup_store().await;
    let registrar = Registrar::new(Arc::new(store.clone()), Arc::new(PassthroughEncryptor));
    let tag = run_tag();

    let outcome = registrar.register(request(&tag, 0)).await.unwrap();

    assert_eq!(outcome.card_type, CardType::Digital);
    assert!(validate_legacy_folio(&outcome.legacy_folio).is_ok());
    assert!(store.legacy_folio_exists(&outcome.legacy_folio).await.unwrap());

    let (digital, status): (String, String) = sqlx::query_as(
        "SELECT digital_folio, status FROM membership_card WHERE beneficiary_id = $1",
    )
    .bind(outcome.beneficiary_id)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(digital, outcome.digital_folio);
    assert_eq!(status, "active");

    let again = registrar.register(request(&tag, 0)).await.unwrap_err();
    assert!(matches!(again, RegistrationError::DuplicateEmail));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_registrations_get_distinct_legacy_folios() {
    let store = setup_store().await;
    let registrar = Registrar::new(Arc::new(store), Arc::new(PassthroughEncryptor));
    let tag = run_tag();

    let mut tasks = JoinSet::new();
    for n in 1..=10 {
        let registrar = registrar.clone();
        let req = request(&tag, n);
        tasks.spawn(async move { registrar.register(req).await });
    }

    let mut folios = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(outcome) => assert!(folios.insert(outcome.legacy_folio)),
            // Only acceptable once the shared test database has used up the series
            Err(RegistrationError::SequenceExhausted { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
}
