use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[sea_orm(string_value = "ingress")]
    Ingress,
    #[sea_orm(string_value = "egress")]
    Egress,
}

impl Direction {
    pub fn receipt_prefix(&self) -> char {
        match self {
            Direction::Ingress => 'I',
            Direction::Egress => 'E',
        }
    }
}

/// One ledger entry against a register session. Append-only: rows are never
/// edited after creation, only superseded by a reversing entry.
///
/// `exchange_rate` is the VES-per-USD rate in effect when the row was
/// written. Every downstream computation uses this stored rate; querying a
/// live rate for a historical transaction is a correctness bug.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "register_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub register_session_id: Uuid,

    pub direction: Direction,

    /// Free-form grouping such as "sale" or "supplier payment"
    pub category: String,

    /// Per-bucket amounts. Each amount carries its bucket explicitly; nothing
    /// is ever inferred from magnitude.
    pub amount_ves_cash: Decimal,
    pub amount_usd_cash: Decimal,
    pub amount_transfer: Decimal,

    /// VES per USD at creation time, immutable forever
    pub exchange_rate: Decimal,

    /// Receipt code: direction prefix + ddMMyy + daily consecutive
    pub receipt_code: String,
    pub daily_seq: i32,

    /// Checkout session that produced this sale; doubles as the idempotency
    /// key for commit retries. Null for manual entries.
    #[sea_orm(unique)]
    pub checkout_session_id: Option<Uuid>,

    pub customer_name: Option<String>,
    pub note: Option<String>,
    pub operator: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::register_session::Entity",
        from = "Column::RegisterSessionId",
        to = "super::register_session::Column::Id"
    )]
    RegisterSession,
    #[sea_orm(has_many = "super::transaction_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::transaction_payment::Entity")]
    Payments,
}

impl Related<super::register_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RegisterSession.def()
    }
}

impl Related<super::transaction_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::transaction_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            active_model.created_at = Set(Utc::now());

            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
        }

        Ok(active_model)
    }
}
