use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Register session lifecycle. `Closed` is terminal: once there, the session
/// and every transaction under it are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum RegisterState {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "pending_physical_close")]
    PendingPhysicalClose,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl RegisterState {
    pub fn is_active(&self) -> bool {
        matches!(self, RegisterState::Open | RegisterState::PendingPhysicalClose)
    }

    pub fn accepts_transactions(&self) -> bool {
        matches!(self, RegisterState::Open)
    }
}

/// One cash-drawer operating period, from open to close.
///
/// The three currency buckets (VES cash, USD cash, electronic transfer) are
/// disjoint; each carries its own opening balance and running ingress/egress
/// accumulators. The exchange rates captured at open stay on the row forever
/// so closed sessions never re-price against a later quote.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "register_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub business_date: NaiveDate,

    pub state: RegisterState,

    pub opening_ves_cash: Decimal,
    pub opening_usd_cash: Decimal,
    pub opening_transfer: Decimal,

    pub ingress_ves_cash: Decimal,
    pub ingress_usd_cash: Decimal,
    pub ingress_transfer: Decimal,

    pub egress_ves_cash: Decimal,
    pub egress_usd_cash: Decimal,
    pub egress_transfer: Decimal,

    /// Official exchange rate (VES per USD) in effect when the drawer opened
    pub rate_official: Decimal,
    /// Parallel-market rate captured at the same moment
    pub rate_parallel: Decimal,

    pub opened_at: DateTime<Utc>,
    pub opened_by: String,
    pub opening_note: Option<String>,

    /// Physically counted balances, recorded by begin-close
    pub counted_ves_cash: Option<Decimal>,
    pub counted_usd_cash: Option<Decimal>,
    pub counted_transfer: Option<Decimal>,

    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub closing_note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::register_transaction::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::discrepancy_authorization::Entity")]
    Authorizations,
}

impl Related<super::register_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::discrepancy_authorization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Authorizations.def()
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
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
        }

        Ok(active_model)
    }
}
