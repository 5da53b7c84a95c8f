//! The quantity ledger: the only path for incremental stock changes.
//!
//! Every adjustment is a single transaction that first takes the item's row
//! write lock, then re-reads the item, checks the non-negative invariant, writes
//! the new quantity with a compare-and-set on the row version and appends
//! exactly one audit entry. Concurrent adjustments on one item therefore queue
//! on the store. A transaction that still loses a lock race (busy store,
//! serialization failure, lost compare-and-set) is rolled back and started over
//! from a fresh read a bounded number of times, so two racing decrements can
//! never both pass the stock check.

use crate::{
    db::{self, DbPool, RetryConfig},
    entities::{inventory_item, quantity_audit_log},
    errors::ServiceError,
    models::{
        input::{ColumnLimit, QuantityAdjustment},
        inventory::ItemView,
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of a successful adjustment.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    pub item: ItemView,
    pub entry: quantity_audit_log::Model,
    /// True when the idempotency key had already been applied and nothing changed.
    pub replayed: bool,
}

#[derive(Clone)]
pub struct QuantityLedger {
    db_pool: Arc<DbPool>,
    retry: RetryConfig,
}

impl QuantityLedger {
    pub fn new(db_pool: Arc<DbPool>, max_retries: u32) -> Self {
        Self::with_retry(db_pool, RetryConfig::with_max_attempts(max_retries))
    }

    pub fn with_retry(db_pool: Arc<DbPool>, retry: RetryConfig) -> Self {
        Self { db_pool, retry }
    }

    /// Applies `adjustment` to the owner's item and records it.
    #[instrument(skip(self, adjustment), fields(change = %adjustment.change))]
    pub async fn adjust_quantity(
        &self,
        item_id: Uuid,
        owner_id: &str,
        adjustment: QuantityAdjustment,
    ) -> Result<LedgerReceipt, ServiceError> {
        if adjustment.change.is_zero() {
            return Err(ServiceError::ValidationError(
                "Change cannot be zero".to_string(),
            ));
        }

        // Unknown or foreign items fail before any transaction is opened.
        find_owned_item(self.db_pool.as_ref(), item_id, owner_id).await?;

        let owner = owner_id.to_string();
        let result = db::run_in_transaction_with_retry(
            self.db_pool.as_ref(),
            "adjust_quantity",
            &self.retry,
            move |txn| {
                let owner = owner.clone();
                let adjustment = adjustment.clone();
                Box::pin(async move { apply_adjustment(txn, item_id, &owner, &adjustment).await })
            },
        )
        .await
        .map_err(|e| give_up_on_contention(item_id, e));

        match &result {
            Ok(receipt) if receipt.replayed => {
                counter!("pizza_pantry_ledger.adjustments.replayed", 1);
                info!(%item_id, "Idempotent adjustment replayed");
            }
            Ok(receipt) => {
                counter!("pizza_pantry_ledger.adjustments.applied", 1);
                info!(
                    %item_id,
                    previous = %receipt.entry.previous_quantity,
                    new = %receipt.entry.new_quantity,
                    "Quantity adjusted"
                );
            }
            Err(ServiceError::InsufficientQuantity { .. }) => {
                counter!("pizza_pantry_ledger.adjustments.insufficient", 1);
            }
            Err(ServiceError::ConcurrentModification(_)) => {
                counter!("pizza_pantry_ledger.adjustments.contended", 1);
            }
            Err(_) => {}
        }

        result
    }
}

/// Reports a write that is still contended after its retries as a conflict on the item.
pub(crate) fn give_up_on_contention(item_id: Uuid, err: ServiceError) -> ServiceError {
    if err.is_contention() {
        warn!(%item_id, error = %err, "Giving up on contended item write");
        ServiceError::ConcurrentModification(item_id)
    } else {
        err
    }
}

async fn apply_adjustment(
    txn: &DatabaseTransaction,
    item_id: Uuid,
    owner_id: &str,
    adjustment: &QuantityAdjustment,
) -> Result<LedgerReceipt, ServiceError> {
    lock_item_row(txn, item_id, owner_id).await?;

    if let Some(key) = adjustment.idempotency_key.as_deref() {
        if let Some(entry) = find_by_idempotency_key(txn, item_id, owner_id, key).await? {
            let item = find_owned_item(txn, item_id, owner_id).await?;
            return Ok(LedgerReceipt {
                item: item.into(),
                entry,
                replayed: true,
            });
        }
    }

    let current = find_owned_item(txn, item_id, owner_id).await?;
    let new_quantity = next_quantity(&current, adjustment.change)?;

    if !compare_and_set_quantity(txn, &current, new_quantity).await? {
        return Err(ServiceError::ConcurrentModification(item_id));
    }

    let entry = append_audit_entry(
        txn,
        AuditDraft {
            item_id,
            owner_id,
            previous_quantity: current.quantity,
            new_quantity,
            reason: &adjustment.reason,
            idempotency_key: adjustment.idempotency_key.as_deref(),
        },
    )
    .await?;
    let item = find_owned_item(txn, item_id, owner_id).await?;
    Ok(LedgerReceipt {
        item: item.into(),
        entry,
        replayed: false,
    })
}

/// `current + change`, refusing results below zero or outside the column.
fn next_quantity(
    current: &inventory_item::Model,
    change: Decimal,
) -> Result<Decimal, ServiceError> {
    let out_of_range = || ServiceError::InvalidInput("Quantity out of range".to_string());
    let new_quantity = current.quantity.checked_add(change).ok_or_else(out_of_range)?;
    if new_quantity < Decimal::ZERO {
        return Err(ServiceError::InsufficientQuantity {
            item_id: current.id,
            available: current.quantity,
            change,
        });
    }
    if !ColumnLimit::QUANTITY.admits(new_quantity) {
        return Err(out_of_range());
    }
    Ok(new_quantity)
}

/// Takes the row's write lock before anything is read, so a second adjuster
/// waits for the first to commit instead of failing a read-to-write upgrade.
pub(crate) async fn lock_item_row<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    owner_id: &str,
) -> Result<(), ServiceError> {
    let result = inventory_item::Entity::update_many()
        .col_expr(
            inventory_item::Column::Version,
            SimpleExpr::from(Expr::col(inventory_item::Column::Version)),
        )
        .filter(inventory_item::Column::Id.eq(item_id))
        .filter(inventory_item::Column::OwnerId.eq(owner_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::item_not_found());
    }
    Ok(())
}

/// Writes `new_quantity` only if the row still carries the version we read.
async fn compare_and_set_quantity<C: ConnectionTrait>(
    conn: &C,
    current: &inventory_item::Model,
    new_quantity: Decimal,
) -> Result<bool, ServiceError> {
    let result = inventory_item::Entity::update_many()
        .col_expr(inventory_item::Column::Quantity, Expr::value(new_quantity))
        .col_expr(
            inventory_item::Column::Version,
            Expr::value(current.version + 1),
        )
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inventory_item::Column::Id.eq(current.id))
        .filter(inventory_item::Column::OwnerId.eq(current.owner_id.as_str()))
        .filter(inventory_item::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

async fn find_by_idempotency_key(
    txn: &DatabaseTransaction,
    item_id: Uuid,
    owner_id: &str,
    key: &str,
) -> Result<Option<quantity_audit_log::Model>, ServiceError> {
    quantity_audit_log::Entity::find()
        .filter(quantity_audit_log::Column::OwnerId.eq(owner_id))
        .filter(quantity_audit_log::Column::ItemId.eq(item_id))
        .filter(quantity_audit_log::Column::IdempotencyKey.eq(key))
        .one(txn)
        .await
        .map_err(ServiceError::db_error)
}

/// Loads an item visible to `owner_id`. Foreign items are reported as missing.
pub(crate) async fn find_owned_item<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    owner_id: &str,
) -> Result<inventory_item::Model, ServiceError> {
    inventory_item::Entity::find_by_id(item_id)
        .filter(inventory_item::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(ServiceError::item_not_found)
}

/// Fields of an audit row about to be appended.
pub(crate) struct AuditDraft<'a> {
    pub item_id: Uuid,
    pub owner_id: &'a str,
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    pub reason: &'a str,
    pub idempotency_key: Option<&'a str>,
}

pub(crate) async fn append_audit_entry<C: ConnectionTrait>(
    conn: &C,
    draft: AuditDraft<'_>,
) -> Result<quantity_audit_log::Model, ServiceError> {
    let entry = quantity_audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        item_id: Set(draft.item_id),
        owner_id: Set(draft.owner_id.to_string()),
        change: Set(draft.new_quantity - draft.previous_quantity),
        previous_quantity: Set(draft.previous_quantity),
        new_quantity: Set(draft.new_quantity),
        reason: Set(Some(draft.reason.to_string())),
        idempotency_key: Set(draft.idempotency_key.map(str::to_string)),
        created_at: Set(Utc::now()),
    };

    entry.insert(conn).await.map_err(|e| {
        if db::is_unique_violation(&e) {
            ServiceError::Conflict("Idempotency key already used".to_string())
        } else {
            ServiceError::db_error(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::{DbErr, RuntimeErr, TransactionTrait};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// A file-backed pantry, so a second pooled connection can commit while a
    /// transaction is open on the first.
    async fn pantry_with(quantity: Decimal) -> (TempDir, DbPool, inventory_item::Model) {
        let dir = tempfile::tempdir().unwrap();
        let db = establish_connection_with_config(&DbConfig {
            url: format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display()),
            max_connections: 2,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();

        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set("user_a".into()),
            name: Set("Flour".into()),
            category: Set("dough".into()),
            unit: Set("kg".into()),
            quantity: Set(quantity),
            reorder_threshold: Set(dec!(2)),
            cost_price: Set(dec!(1.10)),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        (dir, db, item)
    }

    fn quick_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    /// One adjustment attempt in which a rival commits `rival_quantity` on
    /// another connection between our read and our compare-and-set, for as
    /// many attempts as `rival_attempts`.
    async fn adjust_against_rival(
        db: &DbPool,
        item_id: Uuid,
        change: Decimal,
        rival_quantity: Decimal,
        rival_attempts: u32,
        max_attempts: u32,
    ) -> (Result<Decimal, ServiceError>, u32) {
        let attempts = AtomicU32::new(0);
        let result =
            db::run_in_transaction_with_retry(db, "race", &quick_retry(max_attempts), |txn| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let rival = db.clone();
                Box::pin(async move {
                    let current = find_owned_item(txn, item_id, "user_a").await?;
                    if attempt < rival_attempts {
                        let mut theirs = find_owned_item(&rival, item_id, "user_a").await?;
                        theirs.quantity = rival_quantity - Decimal::from(attempt);
                        compare_and_set_quantity(&rival, &theirs, theirs.quantity).await?;
                    }
                    let new_quantity = next_quantity(&current, change)?;
                    if !compare_and_set_quantity(txn, &current, new_quantity).await? {
                        return Err(ServiceError::ConcurrentModification(item_id));
                    }
                    Ok(new_quantity)
                })
            })
            .await;
        (result, attempts.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn stale_version_loses_compare_and_set() {
        let (_dir, db, item) = pantry_with(dec!(10)).await;
        let txn = db.begin().await.unwrap();

        let stale = find_owned_item(&txn, item.id, "user_a").await.unwrap();
        assert!(compare_and_set_quantity(&txn, &stale, dec!(7)).await.unwrap());

        // `stale` still carries the version that was just replaced.
        assert!(!compare_and_set_quantity(&txn, &stale, dec!(4)).await.unwrap());
        let fresh = find_owned_item(&txn, item.id, "user_a").await.unwrap();
        assert_eq!(fresh.quantity, dec!(7));
        assert_eq!(fresh.version, stale.version + 1);
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn lost_race_is_retried_from_a_fresh_read() {
        let (_dir, db, item) = pantry_with(dec!(10)).await;

        let (result, attempts) = adjust_against_rival(&db, item.id, dec!(-4), dec!(5), 1, 3).await;

        assert_eq!(attempts, 2);
        assert_eq!(result.unwrap(), dec!(1));
        let stored = find_owned_item(&db, item.id, "user_a").await.unwrap();
        assert_eq!(stored.quantity, dec!(1));
    }

    #[tokio::test]
    async fn retry_that_finds_too_little_stock_is_insufficient() {
        let (_dir, db, item) = pantry_with(dec!(10)).await;

        let (result, attempts) = adjust_against_rival(&db, item.id, dec!(-4), dec!(2), 1, 3).await;

        assert_eq!(attempts, 2);
        assert_matches!(
            result,
            Err(ServiceError::InsufficientQuantity { available, .. }) if available == dec!(2)
        );
    }

    #[tokio::test]
    async fn exhausted_retries_report_concurrent_modification() {
        let (_dir, db, item) = pantry_with(dec!(10)).await;

        let (result, attempts) = adjust_against_rival(&db, item.id, dec!(-1), dec!(9), 5, 3).await;

        assert_eq!(attempts, 3);
        let err = give_up_on_contention(item.id, result.unwrap_err());
        assert_matches!(err, ServiceError::ConcurrentModification(id) if id == item.id);
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn only_contention_becomes_concurrent_modification() {
        let id = Uuid::new_v4();
        let busy = ServiceError::db_error(DbErr::Exec(RuntimeErr::Internal(
            "database is locked".into(),
        )));
        assert_matches!(
            give_up_on_contention(id, busy),
            ServiceError::ConcurrentModification(_)
        );
        assert_matches!(
            give_up_on_contention(id, ServiceError::item_not_found()),
            ServiceError::NotFound(_)
        );
    }

    #[test]
    fn next_quantity_guards_overflow_and_negatives() {
        let now = Utc::now();
        let item = inventory_item::Model {
            id: Uuid::new_v4(),
            owner_id: "user_a".into(),
            name: "Flour".into(),
            category: "dough".into(),
            unit: "kg".into(),
            quantity: dec!(1),
            reorder_threshold: dec!(2),
            cost_price: dec!(1.10),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(next_quantity(&item, dec!(-1)).unwrap(), dec!(0));
        assert_matches!(
            next_quantity(&item, dec!(-1.5)),
            Err(ServiceError::InsufficientQuantity { .. })
        );
        assert_matches!(
            next_quantity(&item, Decimal::MAX),
            Err(ServiceError::InvalidInput(ref msg)) if msg == "Quantity out of range"
        );
        assert_matches!(
            next_quantity(&item, dec!(99999999999.999)),
            Err(ServiceError::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn lock_on_foreign_item_reports_not_found() {
        let (_dir, db, item) = pantry_with(dec!(3)).await;
        let err = lock_item_row(&db, item.id, "user_b").await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
        lock_item_row(&db, item.id, "user_a").await.unwrap();
    }
}
