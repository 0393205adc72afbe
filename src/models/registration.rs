use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::card::CardType;

/// Registration payload. Field names match the public form contract;
/// every field is optional here so presence is checked by the registrar
/// and reported as a list of missing keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[serde(rename = "nombre")]
    pub given_name: Option<String>,
    #[serde(rename = "apellidoPaterno")]
    pub paternal_surname: Option<String>,
    #[serde(rename = "apellidoMaterno")]
    pub maternal_surname: Option<String>,
    #[serde(rename = "curp")]
    pub national_id: Option<String>,
    #[serde(rename = "correo")]
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "consentimientoAceptado")]
    pub consent: Option<Value>,
    #[serde(rename = "celular")]
    pub phone: Option<String>,
    #[serde(rename = "fechaNacimiento")]
    pub birth_date: Option<String>,
    #[serde(rename = "genero")]
    pub gender: Option<String>,
    #[serde(rename = "direccion")]
    pub address: Option<Address>,
    #[serde(rename = "folio_antiguo")]
    pub legacy_folio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "calle")]
    pub street: Option<String>,
    #[serde(rename = "colonia")]
    pub neighborhood: Option<String>,
    #[serde(rename = "codigoPostal")]
    pub postal_code: Option<String>,
    #[serde(rename = "municipio")]
    pub municipality: Option<String>,
    #[serde(rename = "numeroExterior")]
    pub exterior_number: Option<String>,
    #[serde(rename = "numeroInterior")]
    pub interior_number: Option<String>,
}

/// Folios issued for a newly registered beneficiary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFolios {
    pub digital_folio: String,
    pub legacy_folio: String,
    pub card_type: CardType,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub beneficiary_id: i64,
    pub digital_folio: String,
    pub legacy_folio: String,
    pub card_type: CardType,
}

/// 201 response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub message: String,
    pub id: i64,
    pub folio_digital: String,
    pub folio_legacy: String,
    pub folio_legacy_display: String,
    pub tipo: CardType,
}

impl RegistrationResponse {
    pub fn from_outcome(outcome: RegistrationOutcome) -> Self {
        Self {
            message: "Beneficiary registered successfully".to_string(),
            id: outcome.beneficiary_id,
            folio_legacy_display: crate::domain::folio::format_legacy_folio_display(
                &outcome.legacy_folio,
            ),
            folio_digital: outcome.digital_folio,
            folio_legacy: outcome.legacy_folio,
            tipo: outcome.card_type,
        }
    }
}

/// JSON truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
