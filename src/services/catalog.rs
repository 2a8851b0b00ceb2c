//! Product catalog: the minimum surface needed to run a store. On-hand is
//! mutated here only through manual adjustments, always with a movement
//! audit row in the same store transaction; sale deductions live in the
//! checkout path.

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::product::{self, Entity as ProductEntity, ProductKind};
use crate::entities::stock_movement::{self, MovementKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProductInput {
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub unit_price: Decimal,
    #[serde(default)]
    pub on_hand: i32,
    pub min_stock: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdjustStockInput {
    /// Signed change to on-hand
    pub delta: i32,
    pub reason: String,
    pub operator: String,
}

pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create(&self, input: CreateProductInput) -> Result<product::Model, ServiceError> {
        if input.sku.trim().is_empty() || input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Product sku and name are required".to_string(),
            ));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }
        if input.on_hand < 0 {
            return Err(ServiceError::ValidationError(
                "On-hand quantity cannot be negative".to_string(),
            ));
        }

        let existing = ProductEntity::find()
            .filter(product::Column::Sku.eq(input.sku.trim()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A product with sku '{}' already exists",
                input.sku.trim()
            )));
        }

        let model = product::ActiveModel {
            sku: Set(input.sku.trim().to_string()),
            name: Set(input.name.trim().to_string()),
            kind: Set(input.kind),
            unit_price: Set(input.unit_price),
            on_hand: Set(input.on_hand),
            min_stock: Set(input.min_stock),
            active: Set(true),
            ..Default::default()
        };

        let created = model
            .insert(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        info!(product_id = %created.id, sku = %created.sku, "Product created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Paginated listing with an optional search over sku and name.
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        search: Option<&str>,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let mut query = ProductEntity::find().filter(product::Column::Active.eq(true));

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term);
            query = query.filter(
                Condition::any()
                    .add(product::Column::Sku.like(pattern.clone()))
                    .add(product::Column::Name.like(pattern)),
            );
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let products = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((products, total))
    }

    /// Manual stock adjustment. The decrement guard keeps on-hand from going
    /// negative even under concurrent adjustments; the movement row lands in
    /// the same atomic unit as the quantity change.
    #[instrument(skip(self, input), fields(delta = input.delta))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        input: AdjustStockInput,
    ) -> Result<product::Model, ServiceError> {
        if input.delta == 0 {
            return Err(ServiceError::ValidationError(
                "Adjustment delta cannot be zero".to_string(),
            ));
        }
        if input.reason.trim().is_empty() || input.operator.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Adjustment reason and operator are required".to_string(),
            ));
        }

        let input_ref = input.clone();
        let adjusted = self
            .db
            .transaction::<_, product::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = ProductEntity::find_by_id(product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    if !product.kind.is_stocked() {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Product {} is a service and carries no stock",
                            product.sku
                        )));
                    }

                    let mut update = ProductEntity::update_many()
                        .col_expr(
                            product::Column::OnHand,
                            Expr::col(product::Column::OnHand).add(input_ref.delta),
                        )
                        .filter(product::Column::Id.eq(product_id));
                    if input_ref.delta < 0 {
                        update = update.filter(product::Column::OnHand.gte(-input_ref.delta));
                    }

                    let result = update.exec(txn).await.map_err(ServiceError::DatabaseError)?;
                    if result.rows_affected != 1 {
                        return Err(ServiceError::Conflict(format!(
                            "Product {} has {} on hand; adjustment of {} would go negative",
                            product.sku, product.on_hand, input_ref.delta
                        )));
                    }

                    stock_movement::ActiveModel {
                        product_id: Set(product_id),
                        kind: Set(MovementKind::Adjustment),
                        quantity_delta: Set(input_ref.delta),
                        on_hand_before: Set(product.on_hand),
                        on_hand_after: Set(product.on_hand + input_ref.delta),
                        reason: Set(input_ref.reason.trim().to_string()),
                        operator: Set(input_ref.operator.trim().to_string()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;

                    ProductEntity::find_by_id(product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::InternalError("Adjusted product disappeared".to_string())
                        })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                product_id,
                quantity_delta: input.delta,
                on_hand_after: adjusted.on_hand,
                reason: input.reason.trim().to_string(),
            })
            .await;

        Ok(adjusted)
    }
}
