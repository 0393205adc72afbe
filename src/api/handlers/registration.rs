use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::models::{RegistrationRequest, RegistrationResponse};

/// POST /registro
/// Registers a beneficiary and issues their membership card
#[tracing::instrument(
    skip(state, payload),
    fields(
        endpoint = "register_beneficiary",
        supplied_legacy_folio = tracing::field::Empty
    )
)]
pub async fn register_beneficiary_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegistrationResponse>)> {
    let Json(payload) = payload?;
    tracing::Span::current().record("supplied_legacy_folio", payload.legacy_folio.is_some());

    info!("Processing registration request");

    let outcome = state
        .registrar
        .register(payload)
        .await
        .map_err(|e| ApiError::from_registration(e, state.expose_error_details))?;

    Ok((StatusCode::CREATED, Json(RegistrationResponse::from_outcome(outcome))))
}
