use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A tracked ingredient or supply, scoped to one owner.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "inventory_items")]
#[serde(rename_all = "camelCase")]
#[schema(as = InventoryItem)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    #[schema(value_type = String, example = "12.5")]
    pub quantity: Decimal,
    #[schema(value_type = String, example = "5")]
    pub reorder_threshold: Decimal,
    #[schema(value_type = String, example = "3.49")]
    pub cost_price: Decimal,
    /// Bumped on every write; the ledger's compare-and-set token.
    #[serde(skip)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quantity_audit_log::Entity")]
    QuantityAuditLogs,
}

impl Related<super::quantity_audit_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuantityAuditLogs.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
            if let ActiveValue::NotSet = active_model.version {
                active_model.version = Set(1);
            }
        }

        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
