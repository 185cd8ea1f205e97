//! Tracked schema migrations.
//!
//! The [`MigrationManager`] applies migration files from a directory in
//! filename order, one transaction per file, and records each applied file in
//! the `migrations` table. Rollbacks walk that table newest first and run each
//! migration's `down` script.
//!
//! SQLite and PostgreSQL run DDL inside transactions, so a failed migration
//! leaves no partial schema behind. Engines with implicitly committing DDL
//! would not get that guarantee.

mod file;
mod record;
mod sql;

pub use file::{discover, load, MigrationScript};
pub use record::MigrationRecord;
pub use sql::split_statements;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::{Database, TransactionScope};
use crate::errors::{PizzeriaError, PizzeriaResult};

/// A migration that could not be applied or reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub migration: String,
    pub error: String,
}

/// Outcome of [`MigrationManager::run_migrations`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<MigrationFailure>,
}

/// Outcome of [`MigrationManager::rollback_migrations`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackReport {
    pub reverted: Vec<String>,
    pub errors: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl RollbackReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Applies and reverts the migration files of one directory.
#[derive(Debug, Clone)]
pub struct MigrationManager {
    db: Arc<Database>,
    migrations_dir: PathBuf,
}

impl MigrationManager {
    pub fn new(db: Arc<Database>, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Apply every migration that is not yet recorded.
    ///
    /// A failing migration is rolled back and reported; the remaining ones
    /// still run. Only failures outside a single migration (tracking table,
    /// directory listing) abort the batch.
    pub async fn run_migrations(&self) -> PizzeriaResult<MigrationReport> {
        self.db.ensure_migrations_table().await?;

        let mut report = MigrationReport::default();

        for name in discover(&self.migrations_dir).await? {
            if self.db.is_migration_recorded(&name).await? {
                report.skipped.push(name);
                continue;
            }

            match self.apply(&name).await {
                Ok(()) => {
                    info!(migration = %name, "Migration applied");
                    report.executed.push(name);
                }
                Err(e) => {
                    warn!(migration = %name, error = %e, "Migration failed");
                    report.errors.push(MigrationFailure {
                        migration: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Revert the `steps` most recently applied migrations (all when `steps` is 0).
    ///
    /// Migrations whose file is gone or that have no `down` script are
    /// reported and keep their tracking row.
    pub async fn rollback_migrations(&self, steps: usize) -> PizzeriaResult<RollbackReport> {
        self.db.ensure_migrations_table().await?;

        let mut applied = self.db.migrations_newest_first().await?;
        if steps > 0 {
            applied.truncate(steps);
        }

        let mut report = RollbackReport::default();

        for name in applied {
            match self.revert(&name).await {
                Ok(()) => {
                    info!(migration = %name, "Migration reverted");
                    report.reverted.push(name);
                }
                Err(e) => {
                    warn!(migration = %name, error = %e, "Rollback failed");
                    report.errors.push(MigrationFailure {
                        migration: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Applied migrations, oldest first.
    pub async fn history(&self) -> PizzeriaResult<Vec<MigrationRecord>> {
        self.db.ensure_migrations_table().await?;
        self.db.migration_history().await
    }

    /// Migration files not yet applied, in the order they would run.
    pub async fn pending(&self) -> PizzeriaResult<Vec<String>> {
        self.db.ensure_migrations_table().await?;

        let mut pending = Vec::new();
        for name in discover(&self.migrations_dir).await? {
            if !self.db.is_migration_recorded(&name).await? {
                pending.push(name);
            }
        }

        Ok(pending)
    }

    /// The `description` of a migration file, if it declares one.
    pub async fn describe(&self, name: &str) -> PizzeriaResult<Option<String>> {
        let script = load(&self.migrations_dir.join(name)).await?;
        Ok(script.description)
    }

    async fn apply(&self, name: &str) -> PizzeriaResult<()> {
        let script = load(&self.migrations_dir.join(name)).await?;
        self.run_in_transaction(name, &script.up, Direction::Up).await
    }

    async fn revert(&self, name: &str) -> PizzeriaResult<()> {
        let path = self.migrations_dir.join(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(PizzeriaError::MigrationError(
                "migration file not found".to_string(),
            ));
        }

        let script = load(&path).await?;
        let down = script.down.ok_or_else(|| {
            PizzeriaError::MigrationError("no down instructions for this migration".to_string())
        })?;

        self.run_in_transaction(name, &down, Direction::Down).await
    }

    /// Run `script` and update the tracking row in one transaction.
    async fn run_in_transaction(
        &self,
        name: &str,
        script: &str,
        direction: Direction,
    ) -> PizzeriaResult<()> {
        let mut scope = TransactionScope::new(self.db.clone());
        scope.begin().await?;

        let result = async {
            for statement in split_statements(script) {
                scope.execute(&statement).await?;
            }

            let tx = scope.transaction_mut().ok_or_else(|| {
                PizzeriaError::MigrationError("transaction closed unexpectedly".to_string())
            })?;
            match direction {
                Direction::Up => tx.record_migration(name).await,
                Direction::Down => tx.forget_migration(name).await,
            }
        }
        .await;

        match result {
            Ok(()) => {
                scope.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = scope.rollback().await {
                    warn!(
                        migration = %name,
                        error = %rollback_err,
                        "Rollback after failure also failed"
                    );
                }
                Err(e)
            }
        }
    }
}
