use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::errors::ServiceError;
use crate::services::checkout::CommitSaleInput;
use crate::AppState;

/// Create the checkout router
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/commit", post(commit_sale))
}

/// Convert a session's holds into a committed sale.
///
/// Retry-safe: repeating the call with the same checkout session id returns
/// the original transaction with `already_committed: true`.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/commit",
    request_body = CommitSaleInput,
    responses(
        (status = 200, description = "Sale committed (or idempotent replay)"),
        (status = 400, description = "Invalid request or no open register", body = crate::errors::ErrorResponse),
        (status = 409, description = "No holds, commit in flight, or stock backstop hit", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn commit_sale(
    State(state): State<AppState>,
    Json(payload): Json<CommitSaleInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.services.checkout.commit_sale(payload).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": result })),
    ))
}
