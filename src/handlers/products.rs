use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::catalog::{AdjustStockInput, CreateProductInput};
use crate::{AppState, ListQuery, PaginatedResponse};

/// Create the product catalog router
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/adjust", post(adjust_stock))
        .merge(super::reservations::availability_routes())
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.create(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": product })),
    ))
}

/// List active products with optional search
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ListQuery),
    responses(
        (status = 200, description = "Product list returned")
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (products, total) = state
        .services
        .catalog
        .list(query.page, query.limit, query.search.as_deref())
        .await?;

    let total_pages = total.div_ceil(query.limit);
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": PaginatedResponse {
                items: products,
                total,
                page: query.page,
                limit: query.limit,
                total_pages,
            }
        })),
    ))
}

/// Get one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get(id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": product })),
    ))
}

/// Manually adjust on-hand stock
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/adjust",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = AdjustStockInput,
    responses(
        (status = 200, description = "Stock adjusted"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Adjustment would drive on-hand negative", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.adjust_stock(id, payload).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": product })),
    ))
}
