use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One applied quantity change. Rows are append-only and only disappear when
/// their item is deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "quantity_audit_logs")]
#[serde(rename_all = "camelCase")]
#[schema(as = QuantityAuditLog)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub owner_id: String,
    #[schema(value_type = String, example = "20")]
    pub change: Decimal,
    #[schema(value_type = String, example = "10")]
    pub previous_quantity: Decimal,
    #[schema(value_type = String, example = "30")]
    pub new_quantity: Decimal,
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_item::Entity",
        from = "Column::ItemId",
        to = "super::inventory_item::Column::Id",
        on_delete = "Cascade"
    )]
    InventoryItem,
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
