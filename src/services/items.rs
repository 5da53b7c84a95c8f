use crate::{
    db::{self, DbPool, RetryConfig},
    entities::{inventory_item, quantity_audit_log},
    errors::ServiceError,
    models::{
        input::{ItemChanges, NewItem},
        inventory::{self, InventorySummary, ItemView, SortKey},
    },
    services::ledger::{
        append_audit_entry, find_owned_item, give_up_on_contention, lock_item_row, AuditDraft,
    },
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Reason recorded when a full update overwrites an item's quantity.
pub const MANUAL_EDIT_REASON: &str = "Manual edit";

const DUPLICATE_NAME: &str = "An item with this name already exists";

/// Narrowing applied to an owner's item list.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<SortKey>,
}

/// CRUD over inventory items, always scoped to one owner.
#[derive(Clone)]
pub struct ItemService {
    db_pool: Arc<DbPool>,
    retry: RetryConfig,
}

impl ItemService {
    pub fn new(db_pool: Arc<DbPool>, max_retries: u32) -> Self {
        Self {
            db_pool,
            retry: RetryConfig::with_max_attempts(max_retries),
        }
    }

    /// Every item the owner has, newest first.
    pub async fn all_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        inventory_item::Entity::find()
            .filter(inventory_item::Column::OwnerId.eq(owner_id))
            .order_by_desc(inventory_item::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        owner_id: &str,
        filter: &ItemFilter,
    ) -> Result<Vec<ItemView>, ServiceError> {
        let items = self.all_for_owner(owner_id).await?;
        let mut items = inventory::filter_items(
            items,
            filter.search.as_deref().unwrap_or_default(),
            filter.category.as_deref().unwrap_or("all"),
        );
        if let Some(key) = filter.sort {
            inventory::sort_items(&mut items, key);
        }
        Ok(items.into_iter().map(ItemView::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, owner_id: &str, item_id: Uuid) -> Result<ItemView, ServiceError> {
        find_owned_item(self.db_pool.as_ref(), item_id, owner_id)
            .await
            .map(ItemView::from)
    }

    #[instrument(skip(self, new_item), fields(name = %new_item.name))]
    pub async fn create(
        &self,
        owner_id: &str,
        new_item: NewItem,
    ) -> Result<ItemView, ServiceError> {
        let owner = owner_id.to_string();
        let model = db::run_in_transaction_with_retry(
            self.db_pool.as_ref(),
            "create_item",
            &self.retry,
            move |txn| {
                let owner = owner.clone();
                let new_item = new_item.clone();
                Box::pin(async move {
                    if name_taken(txn, &owner, &new_item.name, None).await? {
                        return Err(ServiceError::Conflict(DUPLICATE_NAME.to_string()));
                    }

                    inventory_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        owner_id: Set(owner),
                        name: Set(new_item.name),
                        category: Set(new_item.category.to_string()),
                        unit: Set(new_item.unit.to_string()),
                        quantity: Set(new_item.quantity),
                        reorder_threshold: Set(new_item.reorder_threshold),
                        cost_price: Set(new_item.cost_price),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(map_name_conflict)
                })
            },
        )
        .await?;

        info!(item_id = %model.id, "Item created");
        Ok(model.into())
    }

    /// Applies a partial update. A quantity change is audited as a manual edit
    /// in the same transaction.
    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        owner_id: &str,
        item_id: Uuid,
        changes: ItemChanges,
    ) -> Result<ItemView, ServiceError> {
        let owner = owner_id.to_string();
        let item = db::run_in_transaction_with_retry(
            self.db_pool.as_ref(),
            "update_item",
            &self.retry,
            move |txn| {
                let owner = owner.clone();
                let changes = changes.clone();
                Box::pin(async move { apply_changes(txn, item_id, &owner, &changes).await })
            },
        )
        .await
        .map_err(|e| give_up_on_contention(item_id, e))?;

        info!(%item_id, "Item updated");
        Ok(item.into())
    }

    /// Removes the item together with its audit trail.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner_id: &str, item_id: Uuid) -> Result<(), ServiceError> {
        let owner = owner_id.to_string();
        db::run_in_transaction_with_retry(
            self.db_pool.as_ref(),
            "delete_item",
            &self.retry,
            move |txn| {
                let owner = owner.clone();
                Box::pin(async move {
                    lock_item_row(txn, item_id, &owner).await?;

                    quantity_audit_log::Entity::delete_many()
                        .filter(quantity_audit_log::Column::ItemId.eq(item_id))
                        .exec(txn)
                        .await?;
                    inventory_item::Entity::delete_many()
                        .filter(inventory_item::Column::Id.eq(item_id))
                        .filter(inventory_item::Column::OwnerId.eq(owner.as_str()))
                        .exec(txn)
                        .await?;
                    Ok(())
                })
            },
        )
        .await
        .map_err(|e| give_up_on_contention(item_id, e))?;

        info!(%item_id, "Item deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, owner_id: &str) -> Result<InventorySummary, ServiceError> {
        let items = self.all_for_owner(owner_id).await?;
        Ok(InventorySummary::from_items(&items))
    }
}

async fn apply_changes(
    txn: &DatabaseTransaction,
    item_id: Uuid,
    owner_id: &str,
    changes: &ItemChanges,
) -> Result<inventory_item::Model, ServiceError> {
    lock_item_row(txn, item_id, owner_id).await?;
    let current = find_owned_item(txn, item_id, owner_id).await?;

    if let Some(name) = changes.name.as_deref() {
        if name != current.name && name_taken(txn, owner_id, name, Some(item_id)).await? {
            return Err(ServiceError::Conflict(DUPLICATE_NAME.to_string()));
        }
    }

    write_changes(txn, &current, changes).await?;

    if let Some(quantity) = changes.quantity {
        if quantity != current.quantity {
            append_audit_entry(
                txn,
                AuditDraft {
                    item_id,
                    owner_id,
                    previous_quantity: current.quantity,
                    new_quantity: quantity,
                    reason: MANUAL_EDIT_REASON,
                    idempotency_key: None,
                },
            )
            .await?;
        }
    }

    find_owned_item(txn, item_id, owner_id).await
}

/// Writes `changes` only if the row still carries `current`'s version.
async fn write_changes<C: ConnectionTrait>(
    conn: &C,
    current: &inventory_item::Model,
    changes: &ItemChanges,
) -> Result<(), ServiceError> {
    let mut update = inventory_item::Entity::update_many()
        .col_expr(
            inventory_item::Column::Version,
            Expr::value(current.version + 1),
        )
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(name) = changes.name.clone() {
        update = update.col_expr(inventory_item::Column::Name, Expr::value(name));
    }
    if let Some(category) = changes.category {
        update = update.col_expr(
            inventory_item::Column::Category,
            Expr::value(category.to_string()),
        );
    }
    if let Some(unit) = changes.unit {
        update = update.col_expr(inventory_item::Column::Unit, Expr::value(unit.to_string()));
    }
    if let Some(quantity) = changes.quantity {
        update = update.col_expr(inventory_item::Column::Quantity, Expr::value(quantity));
    }
    if let Some(threshold) = changes.reorder_threshold {
        update = update.col_expr(
            inventory_item::Column::ReorderThreshold,
            Expr::value(threshold),
        );
    }
    if let Some(cost) = changes.cost_price {
        update = update.col_expr(inventory_item::Column::CostPrice, Expr::value(cost));
    }

    let result = update
        .filter(inventory_item::Column::Id.eq(current.id))
        .filter(inventory_item::Column::OwnerId.eq(current.owner_id.as_str()))
        .filter(inventory_item::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(map_name_conflict)?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(current.id));
    }
    Ok(())
}

async fn name_taken<C: ConnectionTrait>(
    conn: &C,
    owner_id: &str,
    name: &str,
    except: Option<Uuid>,
) -> Result<bool, ServiceError> {
    let mut query = inventory_item::Entity::find()
        .filter(inventory_item::Column::OwnerId.eq(owner_id))
        .filter(inventory_item::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(inventory_item::Column::Id.ne(id));
    }
    Ok(query.one(conn).await?.is_some())
}

/// The unique (owner, name) index backs up the explicit check under races.
fn map_name_conflict(err: sea_orm::DbErr) -> ServiceError {
    if db::is_unique_violation(&err) {
        ServiceError::Conflict(DUPLICATE_NAME.to_string())
    } else {
        ServiceError::db_error(err)
    }
}
