use chrono::{DateTime, Datelike, Utc};
use std::fmt;
use tracing::{debug, info};

use crate::db::errors::DatabaseError;
use crate::db::store::RegistrationTx;
use crate::domain::checksum::compute_check_digit;
use crate::domain::RegistrationError;
use crate::models::{CardFolios, CardType};

/// Fixed 12-digit prefix of the legacy folio namespace
pub const LEGACY_PREFIX: &str = "123456789012";
pub const LEGACY_FOLIO_LEN: usize = 16;
pub const LEGACY_TAIL_MAX: u32 = 9999;

const DIGITAL_PREFIX: &str = "BJ";

/// Why a caller-supplied legacy folio was refused. Variants are listed in
/// the order the rules are checked; the first failing rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyFolioRejection {
    WrongLength,
    NonDigit,
    WrongPrefix,
    TailOutOfRange,
}

impl fmt::Display for LegacyFolioRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength => write!(f, "folio must have {} digits", LEGACY_FOLIO_LEN),
            Self::NonDigit => write!(f, "folio must contain only digits"),
            Self::WrongPrefix => write!(f, "folio does not belong to the {} series", LEGACY_PREFIX),
            Self::TailOutOfRange => write!(f, "folio number must be between 0001 and {}", LEGACY_TAIL_MAX),
        }
    }
}

/// Strip the spaces and dashes people type into printed folios
pub fn normalize_legacy_folio(input: &str) -> String {
    input.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// Validate a legacy folio and return its normalized (separator-free) form.
/// The legacy scheme carries no check digit.
pub fn validate_legacy_folio(input: &str) -> Result<String, LegacyFolioRejection> {
    let folio = normalize_legacy_folio(input);

    if folio.chars().count() != LEGACY_FOLIO_LEN {
        return Err(LegacyFolioRejection::WrongLength);
    }
    if !folio.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LegacyFolioRejection::NonDigit);
    }
    if !folio.starts_with(LEGACY_PREFIX) {
        return Err(LegacyFolioRejection::WrongPrefix);
    }

    let tail: u32 = folio[LEGACY_PREFIX.len()..]
        .parse()
        .map_err(|_| LegacyFolioRejection::NonDigit)?;
    if !(1..=LEGACY_TAIL_MAX).contains(&tail) {
        return Err(LegacyFolioRejection::TailOutOfRange);
    }

    Ok(folio)
}

/// Display form of a stored legacy folio: `NNNN-NNNN-NNNN-NNNN`.
/// Anything that is not 16 ASCII digits is returned unchanged.
pub fn format_legacy_folio_display(folio: &str) -> String {
    if folio.len() != LEGACY_FOLIO_LEN || !folio.bytes().all(|b| b.is_ascii_digit()) {
        return folio.to_string();
    }
    folio
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Digital folio `BJ-YYYY-MM-NNNNNN-C` issued in the month of `issued_at`.
///
/// The check digit covers the dash-free form `BJYYYYMMNNNNNN`. The same id
/// yields a different folio in a different month, so the value is persisted
/// verbatim and never recomputed on read.
pub fn generate_digital_folio_at(beneficiary_id: i64, issued_at: DateTime<Utc>) -> String {
    let year = format!("{:04}", issued_at.year());
    let month = format!("{:02}", issued_at.month());
    let seq = format!("{:06}", beneficiary_id);

    let check_digit = compute_check_digit(&format!("{}{}{}{}", DIGITAL_PREFIX, year, month, seq));

    format!("{}-{}-{}-{}-{}", DIGITAL_PREFIX, year, month, seq, check_digit)
}

/// Digital folio for the current UTC month
pub fn generate_digital_folio(beneficiary_id: i64) -> String {
    generate_digital_folio_at(beneficiary_id, Utc::now())
}

/// Successor of the highest folio under the fixed prefix, or the first
/// folio of the series when none exists yet
pub fn next_legacy_folio(current_max: Option<&str>) -> Result<String, RegistrationError> {
    let Some(last) = current_max else {
        return Ok(format!("{}{:04}", LEGACY_PREFIX, 1));
    };

    let tail = last
        .get(last.len().saturating_sub(4)..)
        .and_then(|t| t.parse::<u32>().ok())
        .ok_or_else(|| {
            RegistrationError::Store(DatabaseError::InvalidData(format!(
                "Stored legacy folio has a non-numeric tail: {}",
                last
            )))
        })?;

    let next = tail + 1;
    if next > LEGACY_TAIL_MAX {
        return Err(RegistrationError::SequenceExhausted {
            prefix: LEGACY_PREFIX.to_string(),
        });
    }

    Ok(format!("{}{:04}", LEGACY_PREFIX, next))
}

/// Allocate the next legacy folio inside `tx`.
///
/// Read-max-then-increment is only unique when allocations are serialized,
/// so the sequence lock is taken first and held until `tx` ends. The unique
/// key on the legacy folio column backs this up; callers replay the
/// transaction when it fires.
#[tracing::instrument(skip(tx))]
pub async fn allocate_next_legacy_folio(
    tx: &mut dyn RegistrationTx,
) -> Result<String, RegistrationError> {
    tx.lock_legacy_sequence().await?;

    let current_max = tx.max_legacy_folio(LEGACY_PREFIX).await?;
    debug!(current_max = ?current_max, "Read highest legacy folio");

    let folio = next_legacy_folio(current_max.as_deref())?;
    info!(legacy_folio = %folio, "Allocated legacy folio");
    Ok(folio)
}

/// Work out both folios and the card type for a new beneficiary.
/// Reads through `tx` but never writes; the caller persists the card.
#[tracing::instrument(skip(tx, supplied_legacy_folio), fields(supplied = supplied_legacy_folio.is_some()))]
pub async fn resolve_card_folios(
    beneficiary_id: i64,
    supplied_legacy_folio: Option<&str>,
    tx: &mut dyn RegistrationTx,
    issued_at: DateTime<Utc>,
) -> Result<CardFolios, RegistrationError> {
    let (legacy_folio, card_type) = match supplied_legacy_folio {
        Some(input) => {
            let folio = validate_legacy_folio(input).map_err(RegistrationError::InvalidFolio)?;
            if tx.legacy_folio_exists(&folio).await? {
                return Err(RegistrationError::DuplicateFolio);
            }
            (folio, CardType::Mixed)
        }
        None => (allocate_next_legacy_folio(tx).await?, CardType::Digital),
    };

    Ok(CardFolios {
        digital_folio: generate_digital_folio_at(beneficiary_id, issued_at),
        legacy_folio,
        card_type,
    })
}
