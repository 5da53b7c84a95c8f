use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    RuntimeErr, SqlErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Future returned by the body of a [`run_in_transaction`] call.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Configuring database connection"
    );

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("pizza_pantry_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(ServiceError::db_error)?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies all pending schema migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    info!("Running database migrations");
    Migrator::up(db, None).await?;
    info!("Database migrations complete");
    Ok(())
}

/// Round-trips a trivial statement to confirm the pool is usable.
pub async fn check_connection(db: &DbPool) -> Result<(), ServiceError> {
    db.execute_unprepared("SELECT 1")
        .await
        .map(|_| ())
        .map_err(ServiceError::db_error)
}

pub async fn close_pool(db: DbPool) -> Result<(), ServiceError> {
    db.close().await.map_err(ServiceError::db_error)
}

/// True when `err` is a unique-index violation reported by the driver.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Driver codes for lock waits that a fresh transaction can get past:
/// SQLite `SQLITE_BUSY`/`SQLITE_LOCKED` (and their extended forms) and Postgres
/// serialization failure or deadlock.
const CONTENTION_CODES: &[&str] = &["5", "6", "261", "262", "517", "40001", "40P01"];

/// True when `err` means the statement lost a lock race rather than failed.
pub fn is_contention(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return false,
    };
    if let RuntimeErr::SqlxError(e) = runtime {
        let known_code = e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .is_some_and(|code| CONTENTION_CODES.iter().any(|known| *known == code));
        if known_code {
            return true;
        }
    }
    runtime.to_string().contains("database is locked")
}

/// Backoff between attempts of [`run_in_transaction_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }
}

/// Runs `body` in a fresh transaction, starting over when it fails with a
/// contention error (see [`ServiceError::is_contention`]).
///
/// Each attempt rolls back completely before the next one starts, so `body`
/// re-reads everything it depends on. The last error is returned once
/// `max_attempts` is used up.
pub async fn run_in_transaction_with_retry<F, T>(
    db: &DbPool,
    operation: &'static str,
    retry: &RetryConfig,
    body: F,
) -> Result<T, ServiceError>
where
    F: for<'c> Fn(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send + Sync,
    T: Send,
{
    let mut delay = retry.initial_delay;
    let mut attempt = 1;
    loop {
        match run_in_transaction(db, operation, &body).await {
            Err(e) if e.is_contention() && attempt < retry.max_attempts => {
                counter!("pizza_pantry_db.transaction.retried", 1);
                debug!(operation, attempt, ?delay, error = %e, "Transaction contended, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(retry.max_delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Runs `body` inside one database transaction.
///
/// The transaction commits when `body` returns `Ok` and rolls back otherwise;
/// every statement issued through the `&DatabaseTransaction` handle belongs to it.
pub async fn run_in_transaction<F, T>(
    db: &DbPool,
    operation: &'static str,
    body: F,
) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send,
    T: Send,
{
    let transaction_id = Uuid::new_v4();
    let start = Instant::now();

    debug!(%transaction_id, operation, "Starting database transaction");
    counter!("pizza_pantry_db.transaction.started", 1);

    let result = db.transaction::<F, T, ServiceError>(body).await;

    let elapsed = start.elapsed();
    histogram!("pizza_pantry_db.transaction.duration", elapsed);

    match &result {
        Ok(_) => {
            counter!("pizza_pantry_db.transaction.committed", 1);
            debug!(%transaction_id, operation, ?elapsed, "Transaction committed");
        }
        Err(e) => {
            counter!("pizza_pantry_db.transaction.rolled_back", 1);
            warn!(%transaction_id, operation, ?elapsed, error = %e, "Transaction rolled back");
        }
    }

    result.map_err(ServiceError::from)
}
