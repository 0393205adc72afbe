use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::crypto::FieldEncryptor;
use crate::db::connection::with_retry;
use crate::db::store::{NewBeneficiary, NewCard, RegistrationStore, RegistrationTx};
use crate::domain::folio::{resolve_card_folios, validate_legacy_folio};
use crate::domain::identity::{hash_national_id, hash_password};
use crate::domain::RegistrationError;
use crate::models::{is_truthy, Address, RegistrationOutcome, RegistrationRequest, CARD_STATUS_ACTIVE};

pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Column widths of the `beneficiary` table
const NAME_MAX_CHARS: usize = 100;
const EMAIL_MAX_CHARS: usize = 255;
const GENDER_MAX_CHARS: usize = 20;
const ADDRESS_LINE_MAX_CHARS: usize = 255;
const POSTAL_CODE_MAX_CHARS: usize = 10;
const HOUSE_NUMBER_MAX_CHARS: usize = 20;

/// Input that passed every pre-write gate, with secrets already protected
#[derive(Debug)]
struct PreparedRegistration {
    beneficiary: NewBeneficiary,
    supplied_legacy_folio: Option<String>,
}

/// Coordinates a registration: validation, duplicate checks, encryption,
/// then the beneficiary and card inserts in one transaction.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn RegistrationStore>,
    encryptor: Arc<dyn FieldEncryptor>,
    max_attempts: u8,
}

impl Registrar {
    pub fn new(store: Arc<dyn RegistrationStore>, encryptor: Arc<dyn FieldEncryptor>) -> Self {
        Self {
            store,
            encryptor,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound on transaction replays after a legacy folio collision
    pub fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn RegistrationStore> {
        &self.store
    }

    /// Register a beneficiary and issue their card.
    ///
    /// Every check runs before the first write. The beneficiary and card
    /// rows are written in one transaction that is rolled back on any
    /// failure, so a failed call leaves nothing behind.
    #[tracing::instrument(skip(self, request))]
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        info!("Processing registration request");

        let prepared = self.prepare(request).await?;
        let beneficiary = &prepared.beneficiary;
        let supplied = prepared.supplied_legacy_folio.as_deref();

        let outcome = with_retry(self.max_attempts, move || self.persist(beneficiary, supplied)).await?;

        info!(
            beneficiary_id = outcome.beneficiary_id,
            digital_folio = %outcome.digital_folio,
            legacy_folio = %outcome.legacy_folio,
            card_type = %outcome.card_type,
            "Beneficiary registered"
        );
        Ok(outcome)
    }

    /// Validation, duplicate checks, hashing and encryption. Nothing is written.
    async fn prepare(
        &self,
        request: RegistrationRequest,
    ) -> Result<PreparedRegistration, RegistrationError> {
        let missing = missing_required_fields(&request);
        if !missing.is_empty() {
            warn!(missing_fields = ?missing, "Missing required fields");
            return Err(RegistrationError::MissingFields(missing));
        }

        if !request.consent.as_ref().map(is_truthy).unwrap_or(false) {
            return Err(RegistrationError::ConsentRequired);
        }

        let birth_date = parse_birth_date(request.birth_date.as_deref())?;

        // Presence was checked above
        let given_name = required(request.given_name)?;
        let paternal_surname = required(request.paternal_surname)?;
        let national_id = required(request.national_id)?;
        let email = required(request.email)?.to_lowercase();
        let password = request.password.unwrap_or_default();
        let maternal_surname = non_blank(request.maternal_surname);
        let gender = non_blank(request.gender);
        let address = request.address.unwrap_or_default();

        check_lengths(&[
            ("nombre", Some(&given_name), NAME_MAX_CHARS),
            ("apellidoPaterno", Some(&paternal_surname), NAME_MAX_CHARS),
            ("apellidoMaterno", maternal_surname.as_ref(), NAME_MAX_CHARS),
            ("correo", Some(&email), EMAIL_MAX_CHARS),
            ("genero", gender.as_ref(), GENDER_MAX_CHARS),
            ("calle", address.street.as_ref(), ADDRESS_LINE_MAX_CHARS),
            ("colonia", address.neighborhood.as_ref(), ADDRESS_LINE_MAX_CHARS),
            ("codigoPostal", address.postal_code.as_ref(), POSTAL_CODE_MAX_CHARS),
            ("municipio", address.municipality.as_ref(), ADDRESS_LINE_MAX_CHARS),
            ("numeroExterior", address.exterior_number.as_ref(), HOUSE_NUMBER_MAX_CHARS),
            ("numeroInterior", address.interior_number.as_ref(), HOUSE_NUMBER_MAX_CHARS),
        ])?;

        let national_id_hash = hash_national_id(&national_id);

        if self.store.email_exists(&email).await? {
            warn!(email = %email, "Duplicate email attempt");
            return Err(RegistrationError::DuplicateEmail);
        }
        if self.store.identity_hash_exists(&national_id_hash).await? {
            warn!("Duplicate national id detected");
            return Err(RegistrationError::DuplicateIdentity);
        }

        let supplied_legacy_folio = match non_blank(request.legacy_folio) {
            Some(input) => {
                let folio = validate_legacy_folio(&input).map_err(|reason| {
                    warn!(%reason, "Rejected supplied legacy folio");
                    RegistrationError::InvalidFolio(reason)
                })?;
                if self.store.legacy_folio_exists(&folio).await? {
                    warn!(legacy_folio = %folio, "Supplied legacy folio already bound");
                    return Err(RegistrationError::DuplicateFolio);
                }
                Some(folio)
            }
            None => None,
        };

        let password_hash = hash_password(&password)?;

        let national_id_encrypted = self.encryptor.encrypt(&national_id).await?;
        let phone_encrypted = match non_blank(request.phone) {
            Some(phone) => Some(self.encryptor.encrypt(&phone).await?),
            None => None,
        };
        info!("Sensitive data encrypted");

        let Address {
            street,
            neighborhood,
            postal_code,
            municipality,
            exterior_number,
            interior_number,
        } = address;

        Ok(PreparedRegistration {
            beneficiary: NewBeneficiary {
                given_name,
                paternal_surname,
                maternal_surname,
                national_id_encrypted,
                national_id_hash,
                birth_date,
                phone_encrypted,
                gender,
                password_hash,
                email,
                street,
                neighborhood,
                postal_code,
                municipality,
                exterior_number,
                interior_number,
            },
            supplied_legacy_folio,
        })
    }

    /// Write the beneficiary and card rows in a single transaction
    async fn persist(
        &self,
        beneficiary: &NewBeneficiary,
        supplied_legacy_folio: Option<&str>,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let mut tx = self.store.begin().await?;

        match write_rows(tx.as_mut(), beneficiary, supplied_legacy_folio).await {
            Ok(outcome) => {
                tx.commit()
                    .await
                    .map_err(|e| RegistrationError::from_persist(e, supplied_legacy_folio.is_some()))?;
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Registration failed, rolling back");
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(error = %rollback_error, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

async fn write_rows(
    tx: &mut dyn RegistrationTx,
    beneficiary: &NewBeneficiary,
    supplied_legacy_folio: Option<&str>,
) -> Result<RegistrationOutcome, RegistrationError> {
    let supplied = supplied_legacy_folio.is_some();

    let beneficiary_id = tx
        .insert_beneficiary(beneficiary)
        .await
        .map_err(|e| RegistrationError::from_persist(e, supplied))?;

    let folios = resolve_card_folios(beneficiary_id, supplied_legacy_folio, tx, Utc::now()).await?;

    tx.insert_card(&NewCard {
        beneficiary_id,
        digital_folio: folios.digital_folio.clone(),
        legacy_folio: folios.legacy_folio.clone(),
        card_type: folios.card_type,
        status: CARD_STATUS_ACTIVE.to_string(),
    })
    .await
    .map_err(|e| RegistrationError::from_persist(e, supplied))?;

    Ok(RegistrationOutcome {
        beneficiary_id,
        digital_folio: folios.digital_folio,
        legacy_folio: folios.legacy_folio,
        card_type: folios.card_type,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>) -> Result<String, RegistrationError> {
    non_blank(value)
        .map(|v| v.trim().to_string())
        .ok_or_else(|| RegistrationError::Internal("required field vanished after validation".to_string()))
}

/// First field whose value does not fit its column
fn check_lengths(fields: &[(&str, Option<&String>, usize)]) -> Result<(), RegistrationError> {
    match fields
        .iter()
        .find(|(_, value, max)| value.map(|v| v.chars().count() > *max).unwrap_or(false))
    {
        Some((field, _, max)) => {
            warn!(field = %field, "Field exceeds its maximum length");
            Err(RegistrationError::InvalidField {
                field: field.to_string(),
                reason: format!("must be at most {} characters", max),
            })
        }
        None => Ok(()),
    }
}

/// Wire names of required fields that are absent or blank, in form order
fn missing_required_fields(request: &RegistrationRequest) -> Vec<String> {
    let text = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);

    [
        ("nombre", text(&request.given_name)),
        ("apellidoPaterno", text(&request.paternal_surname)),
        ("curp", text(&request.national_id)),
        ("correo", text(&request.email)),
        ("password", text(&request.password)),
        ("consentimientoAceptado", request.consent.is_some()),
    ]
    .into_iter()
    .filter(|(_, present)| !present)
    .map(|(name, _)| name.to_string())
    .collect()
}

fn parse_birth_date(value: Option<&str>) -> Result<Option<NaiveDate>, RegistrationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| RegistrationError::InvalidField {
                field: "fechaNacimiento".to_string(),
                reason: "expected YYYY-MM-DD".to_string(),
            }),
    }
}
