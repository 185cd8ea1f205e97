//! Migration file discovery and loading.
//!
//! Two formats are understood:
//!
//! - `NNN_name.toml` with an `up` script, an optional `down` script and an
//!   optional `description`
//! - `NNN_name.sql`, a plain up-only script
//!
//! ```toml
//! description = "Create the categories table"
//! up = """
//! CREATE TABLE categories (id INTEGER PRIMARY KEY, name VARCHAR(100) NOT NULL);
//! """
//! down = "DROP TABLE IF EXISTS categories;"
//! ```

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::errors::{PizzeriaError, PizzeriaResult};

/// The apply/undo scripts of one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub up: String,
    /// `None` when the migration cannot be rolled back.
    pub down: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlMigration {
    up: String,
    #[serde(default)]
    down: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Kind of migration file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationFormat {
    Toml,
    Sql,
}

impl MigrationFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("sql") => Some(Self::Sql),
            _ => None,
        }
    }
}

/// List migration file names in `dir`, sorted lexicographically.
///
/// The directory is created when missing. Files with other extensions are
/// ignored.
pub async fn discover(dir: &Path) -> PizzeriaResult<Vec<String>> {
    if !tokio::fs::try_exists(dir).await? {
        debug!("Creating migrations directory {}", dir.display());
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || MigrationFormat::from_path(&path).is_none() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

/// Load a migration file.
pub async fn load(path: &Path) -> PizzeriaResult<MigrationScript> {
    let format = MigrationFormat::from_path(path).ok_or_else(|| {
        PizzeriaError::MigrationError(format!(
            "unsupported migration format: {}",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<none>")
        ))
    })?;

    let contents = tokio::fs::read_to_string(path).await?;
    parse(format, &contents)
}

fn parse(format: MigrationFormat, contents: &str) -> PizzeriaResult<MigrationScript> {
    match format {
        MigrationFormat::Sql => Ok(MigrationScript {
            up: contents.to_string(),
            down: None,
            description: None,
        }),
        MigrationFormat::Toml => {
            let parsed: TomlMigration = toml::from_str(contents).map_err(|e| {
                PizzeriaError::MigrationError(format!("invalid migration file: {e}"))
            })?;

            Ok(MigrationScript {
                up: parsed.up,
                down: parsed.down.filter(|d| !d.trim().is_empty()),
                description: parsed.description,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_with_down() {
        let script = parse(
            MigrationFormat::Toml,
            "description = \"widgets\"\nup = \"CREATE TABLE w (id INT);\"\ndown = \"DROP TABLE w;\"\n",
        )
        .unwrap();

        assert_eq!(script.up, "CREATE TABLE w (id INT);");
        assert_eq!(script.down.as_deref(), Some("DROP TABLE w;"));
        assert_eq!(script.description.as_deref(), Some("widgets"));
    }

    #[test]
    fn blank_down_means_irreversible() {
        let script = parse(MigrationFormat::Toml, "up = \"SELECT 1;\"\ndown = \"  \"\n").unwrap();
        assert!(script.down.is_none());

        let script = parse(MigrationFormat::Toml, "up = \"SELECT 1;\"\n").unwrap();
        assert!(script.down.is_none());
    }

    #[test]
    fn toml_without_up_is_rejected() {
        let err = parse(MigrationFormat::Toml, "down = \"DROP TABLE w;\"\n").unwrap_err();
        assert!(matches!(err, PizzeriaError::MigrationError(_)));
    }

    #[test]
    fn sql_files_are_up_only() {
        let script = parse(MigrationFormat::Sql, "CREATE TABLE w (id INT);").unwrap();
        assert_eq!(script.up, "CREATE TABLE w (id INT);");
        assert!(script.down.is_none());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            MigrationFormat::from_path(Path::new("001_a.toml")),
            Some(MigrationFormat::Toml)
        );
        assert_eq!(
            MigrationFormat::from_path(Path::new("002_b.sql")),
            Some(MigrationFormat::Sql)
        );
        assert_eq!(MigrationFormat::from_path(Path::new("README.md")), None);
    }

    #[tokio::test]
    async fn discover_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["010_late.sql", "002_early.toml", "notes.txt", "001_first.sql"] {
            std::fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }

        let names = discover(dir.path()).await.unwrap();
        assert_eq!(names, vec!["001_first.sql", "002_early.toml", "010_late.sql"]);
    }

    #[tokio::test]
    async fn discover_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("migrations").join("sqlite");

        let names = discover(&nested).await.unwrap();
        assert!(names.is_empty());
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001_x.yaml");
        std::fs::write(&path, "up: nope").unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(err.to_string().contains("unsupported migration format"));
    }
}
