use crate::{
    db::DbPool,
    entities::{inventory_item, quantity_audit_log},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// The item an audit entry belongs to, as shown next to the entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditItemRef {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryView {
    #[serde(flatten)]
    pub entry: quantity_audit_log::Model,
    pub item: Option<AuditItemRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub audit_logs: Vec<AuditEntryView>,
    pub pagination: Pagination,
}

#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
    default_limit: u64,
    max_limit: u64,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>, default_limit: u64, max_limit: u64) -> Self {
        Self {
            db_pool,
            default_limit,
            max_limit,
        }
    }

    /// Newest-first page of the owner's audit trail, optionally for one item.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        owner_id: &str,
        item_id: Option<Uuid>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<AuditPage, ServiceError> {
        let limit = match limit {
            Some(0) => return Err(ServiceError::InvalidInput("Invalid limit".to_string())),
            Some(l) => l.min(self.max_limit),
            None => self.default_limit,
        };
        let page = page.unwrap_or(1);
        if !page_in_range(page, limit) {
            return Err(ServiceError::InvalidInput("Invalid page".to_string()));
        }

        let mut query = quantity_audit_log::Entity::find()
            .filter(quantity_audit_log::Column::OwnerId.eq(owner_id));
        if let Some(item_id) = item_id {
            query = query.filter(quantity_audit_log::Column::ItemId.eq(item_id));
        }

        let paginator = query
            .order_by_desc(quantity_audit_log::Column::CreatedAt)
            .order_by_desc(quantity_audit_log::Column::Id)
            .find_also_related(inventory_item::Entity)
            .paginate(self.db_pool.as_ref(), limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page - 1).await?;

        let audit_logs = rows
            .into_iter()
            .map(|(entry, item)| AuditEntryView {
                entry,
                item: item.map(|i| AuditItemRef {
                    name: i.name,
                    category: i.category,
                }),
            })
            .collect();

        Ok(AuditPage {
            audit_logs,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
            },
        })
    }
}

/// Pages start at 1, and the row offset of `page` must stay a valid SQL offset.
fn page_in_range(page: u64, limit: u64) -> bool {
    page >= 1
        && (page - 1)
            .checked_mul(limit)
            .is_some_and(|offset| offset <= i64::MAX as u64)
}
