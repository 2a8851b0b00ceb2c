use async_trait::async_trait;
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
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash_ves")]
    CashVes,
    #[sea_orm(string_value = "cash_usd")]
    CashUsd,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "mobile_payment")]
    MobilePayment,
}

impl PaymentMethod {
    /// True for rails that settle into the electronic-transfer bucket
    pub fn is_electronic(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Card | PaymentMethod::Transfer | PaymentMethod::MobilePayment
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentCurrency {
    #[sea_orm(string_value = "ves")]
    Ves,
    #[sea_orm(string_value = "usd")]
    Usd,
}

/// A payment applied to a register transaction. Every payment carries an
/// explicit currency tag; the bucket it lands in follows from method and
/// currency, never from the size of the number.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub transaction_id: Uuid,

    pub method: PaymentMethod,

    pub amount: Decimal,

    pub currency: PaymentCurrency,

    pub bank: Option<String>,

    pub reference: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::register_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::register_transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::register_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
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
