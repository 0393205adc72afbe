use axum::extract::State;

use crate::api::error::ApiResult;
use crate::api::server::AppState;

/// GET /health
/// Succeeds only when the store answers a ping
pub async fn health_check(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.registrar.store().ping().await?;
    Ok("OK")
}
