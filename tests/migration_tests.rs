//! Migration manager tests against in-memory SQLite.

use std::path::Path;
use std::sync::Arc;

use pizzeria::config::DatabaseConfig;
use pizzeria::database::Database;
use pizzeria::migrations::MigrationManager;
use tempfile::TempDir;

async fn memory_db() -> Arc<Database> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    Database::connect(&config).await.expect("in-memory database")
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write migration file");
}

fn create_table(table: &str) -> String {
    format!(
        "up = \"CREATE TABLE {table} (id INTEGER PRIMARY KEY, label TEXT);\"\n\
         down = \"DROP TABLE {table};\"\n"
    )
}

async fn table_exists(db: &Database, table: &str) -> bool {
    db.execute(&format!("SELECT COUNT(*) FROM {table}"))
        .await
        .is_ok()
}

#[tokio::test]
async fn run_migrations_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "001_first.toml", &create_table("alpha"));
    write(dir.path(), "002_second.toml", &create_table("beta"));

    let db = memory_db().await;
    let manager = MigrationManager::new(db.clone(), dir.path());

    let report = manager.run_migrations().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.executed, vec!["001_first.toml", "002_second.toml"]);
    assert!(report.skipped.is_empty());

    let again = manager.run_migrations().await.unwrap();
    assert!(again.executed.is_empty());
    assert_eq!(again.skipped, vec!["001_first.toml", "002_second.toml"]);

    let history = manager.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].migration, "001_first.toml");
    assert!(manager.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_migration_is_rolled_back_and_batch_continues() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "001_first.toml", &create_table("alpha"));
    write(
        dir.path(),
        "002_broken.sql",
        "CREATE TABLE half_done (id INTEGER PRIMARY KEY);\nTHIS IS NOT SQL;\n",
    );
    write(dir.path(), "003_third.toml", &create_table("gamma"));

    let db = memory_db().await;
    let manager = MigrationManager::new(db.clone(), dir.path());

    let report = manager.run_migrations().await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.executed, vec!["001_first.toml", "003_third.toml"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].migration, "002_broken.sql");

    assert!(!table_exists(&db, "half_done").await);
    assert!(table_exists(&db, "gamma").await);
    assert_eq!(manager.pending().await.unwrap(), vec!["002_broken.sql"]);
}

#[tokio::test]
async fn rollback_reverts_most_recent_first() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "001_first.toml", &create_table("alpha"));
    write(dir.path(), "002_second.toml", &create_table("beta"));
    write(dir.path(), "003_third.toml", &create_table("gamma"));

    let db = memory_db().await;
    let manager = MigrationManager::new(db.clone(), dir.path());
    manager.run_migrations().await.unwrap();

    let report = manager.rollback_migrations(1).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.reverted, vec!["003_third.toml"]);
    assert!(!table_exists(&db, "gamma").await);
    assert!(table_exists(&db, "beta").await);

    let report = manager.rollback_migrations(0).await.unwrap();
    assert_eq!(report.reverted, vec!["002_second.toml", "001_first.toml"]);
    assert!(manager.history().await.unwrap().is_empty());
    assert_eq!(manager.pending().await.unwrap().len(), 3);
}

#[tokio::test]
async fn rollback_without_down_is_refused() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "001_up_only.sql",
        "CREATE TABLE kept (id INTEGER PRIMARY KEY);",
    );

    let db = memory_db().await;
    let manager = MigrationManager::new(db.clone(), dir.path());
    manager.run_migrations().await.unwrap();

    let report = manager.rollback_migrations(1).await.unwrap();
    assert!(report.reverted.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].error.contains("no down instructions"));

    assert!(table_exists(&db, "kept").await);
    assert_eq!(manager.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn rollback_with_missing_file_keeps_tracking_row() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "001_first.toml", &create_table("alpha"));

    let db = memory_db().await;
    let manager = MigrationManager::new(db.clone(), dir.path());
    manager.run_migrations().await.unwrap();

    std::fs::remove_file(dir.path().join("001_first.toml")).unwrap();

    let report = manager.rollback_migrations(1).await.unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].error.contains("migration file not found"));
    assert_eq!(manager.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let migrations = dir.path().join("not").join("yet");

    let db = memory_db().await;
    let manager = MigrationManager::new(db, &migrations);

    let report = manager.run_migrations().await.unwrap();
    assert!(report.executed.is_empty());
    assert!(migrations.is_dir());
}

#[tokio::test]
async fn shipped_sqlite_migrations_apply_and_fully_roll_back() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations/sqlite");

    let db = memory_db().await;
    let manager = MigrationManager::new(db.clone(), dir);

    let report = manager.run_migrations().await.unwrap();
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.executed.len(), 5);
    assert!(table_exists(&db, "products").await);

    let report = manager.rollback_migrations(0).await.unwrap();
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.reverted.len(), 5);
    assert!(!table_exists(&db, "users").await);
    assert!(!table_exists(&db, "products").await);
}

#[tokio::test]
async fn describe_reads_declared_description() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "001_first.toml",
        &format!("description = \"Create alpha\"\n{}", create_table("alpha")),
    );
    write(dir.path(), "002_plain.sql", "CREATE TABLE plain (id INTEGER);");

    let db = memory_db().await;
    let manager = MigrationManager::new(db, dir.path());

    assert_eq!(
        manager.describe("001_first.toml").await.unwrap().as_deref(),
        Some("Create alpha")
    );
    assert_eq!(manager.describe("002_plain.sql").await.unwrap(), None);
}
