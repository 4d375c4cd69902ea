//! Quota charging for API token holders.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use keygate_core::types::response::Envelope;

use crate::dto::request::UsageRequest;
use crate::dto::response::UsageResponse;
use crate::error::ApiResult;
use crate::extractors::ApiToken;
use crate::handlers::validated;
use crate::state::AppState;

/// POST /api/usage
///
/// Charges `units` (default 1) against the authenticating token.
pub async fn charge(
    State(state): State<AppState>,
    ApiToken(token): ApiToken,
    payload: Result<Json<UsageRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<UsageResponse>>> {
    let req = validated(payload)?;
    let charged = state.tokens.charge(&token, req.units).await?;
    Ok(Json(Envelope::ok(UsageResponse::new(&charged, req.units))))
}
