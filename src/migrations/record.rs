//! Queries against the `migrations` tracking table.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::database::{db_error, Database, DbTransaction};
use crate::errors::PizzeriaResult;

/// One applied migration.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub migration: String,
    pub executed_at: NaiveDateTime,
}

impl Database {
    pub(crate) async fn ensure_migrations_table(&self) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS migrations (
                        id          INTEGER PRIMARY KEY AUTOINCREMENT,
                        migration   VARCHAR(255) NOT NULL UNIQUE,
                        executed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| db_error("create migrations table", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS migrations (
                        id          BIGSERIAL PRIMARY KEY,
                        migration   VARCHAR(255) NOT NULL UNIQUE,
                        executed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| db_error("create migrations table", e))?;
            }
        }

        Ok(())
    }

    pub(crate) async fn is_migration_recorded(&self, name: &str) -> PizzeriaResult<bool> {
        let count: i64 = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar("SELECT COUNT(*) FROM migrations WHERE migration = ?")
                    .bind(name)
                    .fetch_one(pool)
                    .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar("SELECT COUNT(*) FROM migrations WHERE migration = $1")
                    .bind(name)
                    .fetch_one(pool)
                    .await
            }
        }
        .map_err(|e| db_error("check migration", e))?;

        Ok(count > 0)
    }

    /// Applied migrations, oldest first.
    pub(crate) async fn migration_history(&self) -> PizzeriaResult<Vec<MigrationRecord>> {
        let sql = "SELECT id, migration, executed_at FROM migrations ORDER BY executed_at, id";

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, MigrationRecord>(sql).fetch_all(pool).await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, MigrationRecord>(sql).fetch_all(pool).await,
        }
        .map_err(|e| db_error("fetch migration history", e))
    }

    /// Applied migration names, most recent first.
    pub(crate) async fn migrations_newest_first(&self) -> PizzeriaResult<Vec<String>> {
        let sql = "SELECT migration FROM migrations ORDER BY executed_at DESC, id DESC";

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar(sql).fetch_all(pool).await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar(sql).fetch_all(pool).await,
        }
        .map_err(|e| db_error("fetch applied migrations", e))
    }
}

impl DbTransaction {
    pub(crate) async fn record_migration(&mut self, name: &str) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            DbTransaction::SQLite(tx) => query("INSERT INTO migrations (migration) VALUES (?)")
                .bind(name)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
            #[cfg(feature = "postgres")]
            DbTransaction::Postgres(tx) => {
                query("INSERT INTO migrations (migration) VALUES ($1)")
                    .bind(name)
                    .execute(&mut **tx)
                    .await
                    .map(|_| ())
            }
        }
        .map_err(|e| db_error("record migration", e))
    }

    pub(crate) async fn forget_migration(&mut self, name: &str) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            DbTransaction::SQLite(tx) => query("DELETE FROM migrations WHERE migration = ?")
                .bind(name)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
            #[cfg(feature = "postgres")]
            DbTransaction::Postgres(tx) => query("DELETE FROM migrations WHERE migration = $1")
                .bind(name)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
        }
        .map_err(|e| db_error("remove migration record", e))
    }
}
