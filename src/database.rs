//! Database handle shared by the HTTP server and the admin CLI.
//!
//! Each entry point builds one [`Database`] with [`Database::connect`] and
//! passes the `Arc` to every consumer. Entity queries live next to their
//! handlers (`server::products`, `server::users`, ...) as further `impl
//! Database` blocks; migration bookkeeping lives in `migrations::record`.

use std::sync::Arc;
use tracing::{debug, error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
#[cfg(feature = "sqlite")]
use sqlx::{Sqlite, SqlitePool};

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
#[cfg(feature = "postgres")]
use sqlx::{PgPool, Postgres};

use crate::config::DatabaseConfig;
use crate::errors::{PizzeriaError, PizzeriaResult};

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

/// An open transaction on either backend.
///
/// Dropping it without calling [`DbTransaction::commit`] rolls it back.
#[derive(Debug)]
pub enum DbTransaction {
    #[cfg(feature = "sqlite")]
    SQLite(sqlx::Transaction<'static, Sqlite>),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::Transaction<'static, Postgres>),
}

/// Log a driver error and convert it for callers.
///
/// Unique constraint violations become [`PizzeriaError::Conflict`] so handlers
/// can answer 409 when two writers race past their existence checks.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> PizzeriaError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            debug!("{context}: unique constraint violated: {db_err}");
            return PizzeriaError::Conflict(db_err.message().to_string());
        }
    }

    error!("{context} failed: {err}");
    PizzeriaError::DatabaseError(format!("{context}: {err}"))
}

impl Database {
    /// Open a connection pool for the configured backend.
    ///
    /// SQLite files are created when missing. In-memory SQLite URLs get a
    /// single connection that never expires, otherwise the schema would
    /// vanish with the connection that created it.
    pub async fn connect(config: &DatabaseConfig) -> PizzeriaResult<Arc<Self>> {
        match config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                use std::str::FromStr;

                let url = config.sqlite_url();
                let options = SqliteConnectOptions::from_str(&url)
                    .map_err(|e| {
                        PizzeriaError::ConfigError(format!("invalid SQLite URL '{url}': {e}"))
                    })?
                    .create_if_missing(true);

                let pool_options = if config.is_in_memory() {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                } else {
                    SqlitePoolOptions::new().max_connections(config.max_connections)
                };

                let pool = pool_options.connect_with(options).await.map_err(|e| {
                    error!("Failed to connect to SQLite: {e}");
                    PizzeriaError::DatabaseError(format!("failed to connect to SQLite: {e}"))
                })?;

                info!("Connected to SQLite at {url}");
                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(PizzeriaError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool_options = PgPoolOptions::new().max_connections(config.max_connections);

                let pool = if config.url.is_empty() {
                    let options = PgConnectOptions::new()
                        .host(&config.host)
                        .port(config.port)
                        .username(&config.user)
                        .password(&config.password)
                        .database(&config.name)
                        .options([("client_encoding", config.charset.as_str())]);
                    pool_options.connect_with(options).await
                } else {
                    pool_options.connect(&config.url).await
                }
                .map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {e}");
                    PizzeriaError::DatabaseError(format!("failed to connect to PostgreSQL: {e}"))
                })?;

                info!("Connected to PostgreSQL database '{}'", config.name);
                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(PizzeriaError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(PizzeriaError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Name of the active backend, as used in `DB_TYPE`.
    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Run a single statement outside any transaction.
    ///
    /// Returns the number of affected rows.
    pub async fn execute(&self, sql: &str) -> PizzeriaResult<u64> {
        let affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .map_err(|e| db_error("execute", e))?;

        Ok(affected)
    }

    /// Check that the pool can reach the database.
    pub async fn ping(&self) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        }
        .map_err(|e| db_error("ping", e))
    }

    /// Start a transaction on a pooled connection.
    pub async fn begin(&self) -> PizzeriaResult<DbTransaction> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => pool
                .begin()
                .await
                .map(DbTransaction::SQLite)
                .map_err(|e| db_error("begin transaction", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => pool
                .begin()
                .await
                .map(DbTransaction::Postgres)
                .map_err(|e| db_error("begin transaction", e)),
        }
    }
}

impl DbTransaction {
    /// Run a single statement inside this transaction.
    pub async fn execute(&mut self, sql: &str) -> PizzeriaResult<u64> {
        match self {
            #[cfg(feature = "sqlite")]
            DbTransaction::SQLite(tx) => sqlx::raw_sql(sql)
                .execute(&mut **tx)
                .await
                .map(|r| r.rows_affected()),
            #[cfg(feature = "postgres")]
            DbTransaction::Postgres(tx) => sqlx::raw_sql(sql)
                .execute(&mut **tx)
                .await
                .map(|r| r.rows_affected()),
        }
        .map_err(|e| db_error("execute in transaction", e))
    }

    pub async fn commit(self) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            DbTransaction::SQLite(tx) => tx.commit().await,
            #[cfg(feature = "postgres")]
            DbTransaction::Postgres(tx) => tx.commit().await,
        }
        .map_err(|e| db_error("commit", e))
    }

    pub async fn rollback(self) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            DbTransaction::SQLite(tx) => tx.rollback().await,
            #[cfg(feature = "postgres")]
            DbTransaction::Postgres(tx) => tx.rollback().await,
        }
        .map_err(|e| db_error("rollback", e))
    }
}

/// A transaction holder that tolerates unbalanced calls.
///
/// - `begin` while a transaction is open is a no-op that still reports success.
/// - `commit` / `rollback` without an open transaction return `Ok(false)`.
/// - `execute` uses the open transaction, or the pool when there is none.
///
/// Dropping the scope with a transaction still open rolls it back.
#[derive(Debug)]
pub struct TransactionScope {
    db: Arc<Database>,
    tx: Option<DbTransaction>,
}

impl TransactionScope {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db, tx: None }
    }

    pub async fn begin(&mut self) -> PizzeriaResult<bool> {
        if self.tx.is_some() {
            debug!("begin() called with a transaction already open; reusing it");
            return Ok(true);
        }

        self.tx = Some(self.db.begin().await?);
        Ok(true)
    }

    pub async fn commit(&mut self) -> PizzeriaResult<bool> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn rollback(&mut self) -> PizzeriaResult<bool> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn execute(&mut self, sql: &str) -> PizzeriaResult<u64> {
        match self.tx.as_mut() {
            Some(tx) => tx.execute(sql).await,
            None => self.db.execute(sql).await,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Borrow the open transaction for bound queries.
    pub fn transaction_mut(&mut self) -> Option<&mut DbTransaction> {
        self.tx.as_mut()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    async fn memory_db() -> Arc<Database> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        Database::connect(&config).await.expect("connect")
    }

    #[allow(irrefutable_let_patterns)]
    async fn count_rows(db: &Database, table: &str) -> i64 {
        let Database::SQLite(pool) = db else {
            panic!("expected SQLite");
        };
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn ping_and_backend_name() {
        let db = memory_db().await;
        db.ping().await.expect("ping");
        assert_eq!(db.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn commit_and_rollback_without_transaction_return_false() {
        let db = memory_db().await;
        let mut scope = TransactionScope::new(db);

        assert!(!scope.in_transaction());
        assert!(!scope.commit().await.expect("commit"));
        assert!(!scope.rollback().await.expect("rollback"));
    }

    #[tokio::test]
    async fn nested_begin_reuses_open_transaction() {
        let db = memory_db().await;
        db.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .expect("create");

        let mut scope = TransactionScope::new(db.clone());
        assert!(scope.begin().await.expect("begin"));
        assert!(scope.begin().await.expect("nested begin"));
        assert!(scope.in_transaction());

        scope
            .execute("INSERT INTO items (name) VALUES ('margherita')")
            .await
            .expect("insert");

        // A single rollback undoes everything since the first begin.
        assert!(scope.rollback().await.expect("rollback"));
        assert!(!scope.in_transaction());
        assert!(!scope.rollback().await.expect("second rollback"));

        assert_eq!(count_rows(&db, "items").await, 0);
    }

    #[tokio::test]
    async fn commit_persists_writes() {
        let db = memory_db().await;
        db.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .expect("create");

        let mut scope = TransactionScope::new(db.clone());
        scope.begin().await.expect("begin");
        scope
            .execute("INSERT INTO items (name) VALUES ('diavola')")
            .await
            .expect("insert");
        assert!(scope.commit().await.expect("commit"));

        assert_eq!(count_rows(&db, "items").await, 1);
    }

    #[tokio::test]
    async fn execute_without_transaction_uses_pool() {
        let db = memory_db().await;
        let mut scope = TransactionScope::new(db.clone());

        scope
            .execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .expect("create");
        let affected = scope
            .execute("INSERT INTO items (name) VALUES ('capricciosa')")
            .await
            .expect("insert");

        assert_eq!(affected, 1);
        assert_eq!(count_rows(&db, "items").await, 1);
    }

    #[tokio::test]
    async fn dropping_scope_rolls_back() {
        let db = memory_db().await;
        db.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .expect("create");

        {
            let mut scope = TransactionScope::new(db.clone());
            scope.begin().await.expect("begin");
            scope
                .execute("INSERT INTO items (name) VALUES ('quattro formaggi')")
                .await
                .expect("insert");
        }

        assert_eq!(count_rows(&db, "items").await, 0);
    }

    #[tokio::test]
    async fn unique_violation_maps_to_conflict() {
        let db = memory_db().await;
        db.execute("CREATE TABLE tags (name TEXT UNIQUE)")
            .await
            .expect("create");
        db.execute("INSERT INTO tags (name) VALUES ('vegan')")
            .await
            .expect("first insert");

        let err = db
            .execute("INSERT INTO tags (name) VALUES ('vegan')")
            .await
            .expect_err("duplicate insert");
        assert!(matches!(err, PizzeriaError::Conflict(_)));
    }
}
