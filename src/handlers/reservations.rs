use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::reservations::{
    ProductAvailability, ReserveItem, ReserveOutcome, ReservedHold, StockConflict,
};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReserveRequest {
    pub session_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<ReserveItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReserveItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReserveResponse {
    pub session_id: Uuid,
    pub reserved: Vec<ReservedHold>,
    /// How often the client should POST /reservations/heartbeat
    pub heartbeat_interval_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReserveConflictResponse {
    pub conflicts: Vec<StockConflict>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReleaseRequest {
    pub session_id: Uuid,
    pub product_id: Uuid,
    /// Partial release when present; full release otherwise
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct AvailabilityQuery {
    pub session_id: Option<Uuid>,
}

/// Create the reservation router
pub fn reservation_routes() -> Router<AppState> {
    Router::new()
        .route("/reserve", post(reserve))
        .route("/release", post(release))
        .route("/release-all", post(release_all))
        .route("/heartbeat", post(heartbeat))
}

pub fn availability_routes() -> Router<AppState> {
    Router::new().route("/:id/availability", get(availability))
}

/// Reserve stock for a checkout session, all-or-nothing
#[utoipa::path(
    post,
    path = "/api/v1/reservations/reserve",
    request_body = ReserveRequest,
    responses(
        (status = 200, description = "Every item reserved", body = ReserveResponse),
        (status = 404, description = "Unknown or inactive product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient availability, nothing reserved", body = ReserveConflictResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn reserve(
    State(state): State<AppState>,
    Json(payload): Json<ReserveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let items = payload
        .items
        .iter()
        .map(|i| ReserveItem {
            product_id: i.product_id,
            quantity: i.quantity,
        })
        .collect();

    let outcome = state
        .services
        .reservations
        .reserve(items, payload.session_id)
        .await?;

    match outcome {
        ReserveOutcome::Reserved(batch) => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": ReserveResponse {
                    session_id: batch.session_id,
                    reserved: batch.reserved,
                    heartbeat_interval_secs: state.config.heartbeat_interval_secs,
                }
            })),
        )),
        ReserveOutcome::Conflict(conflicts) => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "conflicts": conflicts,
            })),
        )),
    }
}

/// Release one hold, fully or partially
#[utoipa::path(
    post,
    path = "/api/v1/reservations/release",
    request_body = ReleaseRequest,
    responses(
        (status = 200, description = "Released (idempotent; a missing hold is a no-op)"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn release(
    State(state): State<AppState>,
    Json(payload): Json<ReleaseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .reservations
        .release(payload.product_id, payload.session_id, payload.quantity)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

/// Drop every hold a session owns (wizard abandoned or closed)
#[utoipa::path(
    post,
    path = "/api/v1/reservations/release-all",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Holds released")
    ),
    tag = "reservations"
)]
pub async fn release_all(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let released = state
        .services
        .reservations
        .release_all(payload.session_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "released": released })),
    ))
}

/// Heartbeat: renew every hold the session owns
#[utoipa::path(
    post,
    path = "/api/v1/reservations/heartbeat",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Holds renewed"),
        (status = 404, description = "No live holds; caller must re-reserve", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let renewed = state
        .services
        .reservations
        .renew(payload.session_id)
        .await?;

    if renewed == 0 {
        return Err(ServiceError::NotFound(format!(
            "Checkout session {} has no live holds",
            payload.session_id
        )));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "renewed": renewed,
            "next_heartbeat_secs": state.config.heartbeat_interval_secs,
        })),
    ))
}

/// Availability snapshot for one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/availability",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability returned", body = ProductAvailability),
        (status = 404, description = "Unknown or inactive product", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let snapshot = state
        .services
        .reservations
        .availability(id, query.session_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": snapshot })),
    ))
}
