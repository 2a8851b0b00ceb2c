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
pub enum CurrencyBucket {
    #[sea_orm(string_value = "ves_cash")]
    VesCash,
    #[sea_orm(string_value = "usd_cash")]
    UsdCash,
    #[sea_orm(string_value = "transfer")]
    Transfer,
}

/// Record of a supervisor signing off a counted-vs-expected mismatch at
/// close. One row per bucket with a non-zero difference; absence means the
/// bucket matched exactly. The record binds the sign-off to a named identity
/// and a justification; which identities may sign is the deployment's
/// auth-layer concern.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discrepancy_authorizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub register_session_id: Uuid,

    pub bucket: CurrencyBucket,

    pub expected: Decimal,
    pub counted: Decimal,

    /// counted − expected, signed
    pub difference: Decimal,

    pub authorized_by: String,

    pub justification: String,

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
}

impl Related<super::register_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RegisterSession.def()
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
