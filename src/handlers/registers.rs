use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::reconciliation::{AuthorizationInput, BucketAmounts};
use crate::services::registers::{NewTransactionInput, OpenRegisterInput};
use crate::{AppState, ListQuery, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct BeginCloseRequest {
    pub counted: BucketAmounts,
    pub operator: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForcePendingCloseRequest {
    pub operator: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FinalizeCloseRequest {
    /// Required when any bucket shows a non-zero discrepancy
    pub authorization: Option<AuthorizationInput>,
    pub operator: String,
    pub note: Option<String>,
}

/// Create the register lifecycle router
pub fn register_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_registers))
        .route("/open", post(open_register))
        .route("/current", get(current_register))
        .route("/transactions", post(create_transaction))
        .route("/begin-close", post(begin_close))
        .route("/force-pending-close", post(force_pending_close))
        .route("/finalize-close", post(finalize_close))
        .route("/:id", get(get_register))
        .route("/:id/transactions", get(list_transactions))
}

/// Open a register session
#[utoipa::path(
    post,
    path = "/api/v1/registers/open",
    request_body = OpenRegisterInput,
    responses(
        (status = 201, description = "Register opened"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Another session is still active", body = crate::errors::ErrorResponse)
    ),
    tag = "registers"
)]
pub async fn open_register(
    State(state): State<AppState>,
    Json(payload): Json<OpenRegisterInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.registers.open(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": session })),
    ))
}

/// The active session, if any
#[utoipa::path(
    get,
    path = "/api/v1/registers/current",
    responses(
        (status = 200, description = "Active session or null")
    ),
    tag = "registers"
)]
pub async fn current_register(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.registers.current().await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": session })),
    ))
}

/// Session history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/registers",
    params(ListQuery),
    responses(
        (status = 200, description = "Session list returned")
    ),
    tag = "registers"
)]
pub async fn list_registers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (sessions, total) = state
        .services
        .registers
        .list(query.page, query.limit)
        .await?;

    let total_pages = total.div_ceil(query.limit);
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": PaginatedResponse {
                items: sessions,
                total,
                page: query.page,
                limit: query.limit,
                total_pages,
            }
        })),
    ))
}

/// One session by id (closed sessions are immutable snapshots)
#[utoipa::path(
    get,
    path = "/api/v1/registers/{id}",
    params(("id" = Uuid, Path, description = "Register session ID")),
    responses(
        (status = 200, description = "Session returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "registers"
)]
pub async fn get_register(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.registers.get(id).await?;
    let authorizations = state.services.registers.authorizations(id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "session": session, "authorizations": authorizations }
        })),
    ))
}

/// Ledger entries for a session
#[utoipa::path(
    get,
    path = "/api/v1/registers/{id}/transactions",
    params(("id" = Uuid, Path, description = "Register session ID")),
    responses(
        (status = 200, description = "Transactions returned")
    ),
    tag = "registers"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state.services.registers.transactions(id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": records })),
    ))
}

/// Append a manual ingress/egress entry to the open session
#[utoipa::path(
    post,
    path = "/api/v1/registers/transactions",
    request_body = NewTransactionInput,
    responses(
        (status = 201, description = "Transaction appended"),
        (status = 400, description = "Invalid request or terminal state", body = crate::errors::ErrorResponse)
    ),
    tag = "registers"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<NewTransactionInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state
        .services
        .registers
        .create_manual_transaction(payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": record })),
    ))
}

/// Begin the physical close; returns the reconciliation preview
#[utoipa::path(
    post,
    path = "/api/v1/registers/begin-close",
    request_body = BeginCloseRequest,
    responses(
        (status = 200, description = "Close started, preview returned"),
        (status = 400, description = "Invalid request or terminal state", body = crate::errors::ErrorResponse)
    ),
    tag = "registers"
)]
pub async fn begin_close(
    State(state): State<AppState>,
    Json(payload): Json<BeginCloseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let preview = state
        .services
        .registers
        .begin_physical_close(payload.counted, payload.operator, payload.note)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": preview })),
    ))
}

/// Park the open session pending a physical count (scheduled end-of-day)
#[utoipa::path(
    post,
    path = "/api/v1/registers/force-pending-close",
    request_body = ForcePendingCloseRequest,
    responses(
        (status = 200, description = "Session parked pending count")
    ),
    tag = "registers"
)]
pub async fn force_pending_close(
    State(state): State<AppState>,
    Json(payload): Json<ForcePendingCloseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .registers
        .force_pending_close(payload.operator)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": session })),
    ))
}

/// Finalize the close; 409 when a discrepancy lacks a matching authorization
#[utoipa::path(
    post,
    path = "/api/v1/registers/finalize-close",
    request_body = FinalizeCloseRequest,
    responses(
        (status = 200, description = "Register closed"),
        (status = 409, description = "Unauthorized or mismatched discrepancy", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid request or terminal state", body = crate::errors::ErrorResponse)
    ),
    tag = "registers"
)]
pub async fn finalize_close(
    State(state): State<AppState>,
    Json(payload): Json<FinalizeCloseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let closed = state
        .services
        .registers
        .finalize_close(payload.authorization, payload.operator, payload.note)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": closed })),
    ))
}
