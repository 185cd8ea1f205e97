//! Configuration system for the pizzeria backend.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority, optionally seeded from `.env`)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `SERVER_HOST`, `SERVER_PORT` - HTTP bind address
//! - `MIGRATE_ON_START` - Apply pending migrations before serving
//! - `DB_TYPE` - `sqlite` or `postgres`
//! - `DATABASE_URL` - Full connection URL (takes precedence over the parts below)
//! - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASS`, `DB_CHARSET` - PostgreSQL parts
//! - `DB_MAX_CONNECTIONS` - Pool size
//! - `JWT_SECRET` - HMAC secret for signing tokens
//! - `JWT_EXPIRATION` - Token lifetime in seconds
//! - `BCRYPT_COST` - Password hashing cost
//! - `CORS_ALLOW_ORIGIN`, `CORS_ALLOW_METHODS`, `CORS_ALLOW_HEADERS` - CORS response headers
//! - `LOG_LEVEL` - trace, debug, info, warn, error
//! - `MIGRATIONS_DIR` - Directory holding migration files

use config::Config;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::errors::{PizzeriaError, PizzeriaResult};

/// Global configuration singleton.
static CONFIG: OnceLock<PizzeriaConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PizzeriaConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub migrations: MigrationsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Apply pending migrations before accepting requests
    pub migrate_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            migrate_on_start: false,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// Full connection URL; empty means "derive from the other fields"
    pub url: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub charset: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            url: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            name: "pizzeria".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            charset: "utf8".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// SQLite connection URL, falling back to a `pizzeria.db` file in the
    /// working directory.
    pub fn sqlite_url(&self) -> String {
        if self.url.is_empty() {
            "sqlite://pizzeria.db".to_string()
        } else {
            self.url.clone()
        }
    }

    /// Whether the configured SQLite URL points at an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.db_type == "sqlite" && self.sqlite_url().contains(":memory:")
    }
}

/// Token and password settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for HS256 signing (required by the server)
    pub jwt_secret: String,
    /// Token expiration time in seconds (default: 1 hour)
    pub token_expiration_secs: u64,
    /// bcrypt cost factor
    pub password_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiration_secs: 3600,
            password_cost: 12,
        }
    }
}

/// CORS response headers, kept as the comma-separated strings operators
/// already write in `.env` files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allow_headers:
                "Content-Type, Access-Control-Allow-Headers, Authorization, X-Requested-With"
                    .to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Migration file location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory of migration files; empty means `migrations/<db_type>`
    pub dir: String,
}

impl PizzeriaConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    pub fn load() -> PizzeriaResult<Self> {
        let builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.migrate_on_start", false)?
            .set_default("database.db_type", "sqlite")?
            .set_default("database.url", "")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.name", "pizzeria")?
            .set_default("database.user", "postgres")?
            .set_default("database.password", "")?
            .set_default("database.charset", "utf8")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.token_expiration_secs", 3600)?
            .set_default("auth.password_cost", 12)?
            .set_default("cors.allow_origin", "*")?
            .set_default("cors.allow_methods", "GET, POST, PUT, DELETE, OPTIONS")?
            .set_default(
                "cors.allow_headers",
                "Content-Type, Access-Control-Allow-Headers, Authorization, X-Requested-With",
            )?
            .set_default("logging.level", "info")?
            .set_default("migrations.dir", "")?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", env_parsed::<i64>("SERVER_PORT"))?
            .set_override_option("server.migrate_on_start", env_parsed::<bool>("MIGRATE_ON_START"))?
            .set_override_option("database.db_type", env::var("DB_TYPE").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("database.host", env::var("DB_HOST").ok())?
            .set_override_option("database.port", env_parsed::<i64>("DB_PORT"))?
            .set_override_option("database.name", env::var("DB_NAME").ok())?
            .set_override_option("database.user", env::var("DB_USER").ok())?
            .set_override_option("database.password", env::var("DB_PASS").ok())?
            .set_override_option("database.charset", env::var("DB_CHARSET").ok())?
            .set_override_option(
                "database.max_connections",
                env_parsed::<i64>("DB_MAX_CONNECTIONS"),
            )?
            .set_override_option("auth.jwt_secret", env::var("JWT_SECRET").ok())?
            .set_override_option(
                "auth.token_expiration_secs",
                env_parsed::<i64>("JWT_EXPIRATION"),
            )?
            .set_override_option("auth.password_cost", env_parsed::<i64>("BCRYPT_COST"))?
            .set_override_option("cors.allow_origin", env::var("CORS_ALLOW_ORIGIN").ok())?
            .set_override_option("cors.allow_methods", env::var("CORS_ALLOW_METHODS").ok())?
            .set_override_option("cors.allow_headers", env::var("CORS_ALLOW_HEADERS").ok())?
            .set_override_option("logging.level", env::var("LOG_LEVEL").ok())?
            .set_override_option("migrations.dir", env::var("MIGRATIONS_DIR").ok())?;

        let settings = builder
            .build()
            .map_err(|e| PizzeriaError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| PizzeriaError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    ///
    /// The JWT secret is not checked here: only the server needs it, and
    /// [`crate::server::auth::TokenSigner::from_config`] rejects an empty one.
    pub fn validate(&self) -> PizzeriaResult<()> {
        if self.server.port == 0 {
            return Err(PizzeriaError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(PizzeriaError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(PizzeriaError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if !(4..=31).contains(&self.auth.password_cost) {
            return Err(PizzeriaError::ConfigError(format!(
                "auth.password_cost must be between 4 and 31, got {}",
                self.auth.password_cost
            )));
        }

        if self.auth.token_expiration_secs == 0 {
            return Err(PizzeriaError::ConfigError(
                "auth.token_expiration_secs must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(PizzeriaError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Directory the migration manager reads from.
    pub fn migrations_dir(&self) -> PathBuf {
        if self.migrations.dir.is_empty() {
            Path::new("migrations").join(&self.database.db_type)
        } else {
            PathBuf::from(&self.migrations.dir)
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Load `KEY=value` pairs from an env file into the process environment.
///
/// With `None` the usual `.env` lookup (current directory and parents) is used.
/// Variables already present in the environment are not overwritten.
/// Returns `false` when no file was found; a malformed file is an error.
pub fn load_env_file(path: Option<&Path>) -> PizzeriaResult<bool> {
    let result = match path {
        Some(p) => dotenvy::from_path(p).map(|_| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match result {
        Ok(loaded) => {
            debug!("Loaded environment from {}", loaded.display());
            Ok(true)
        }
        Err(e) if e.not_found() => {
            warn!("Env file not found, using process environment only");
            Ok(false)
        }
        Err(e) => Err(PizzeriaError::ConfigError(format!(
            "failed to parse env file: {e}"
        ))),
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
pub fn get_config() -> PizzeriaResult<&'static PizzeriaConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = PizzeriaConfig::load()?;
    config.validate()?;

    Ok(CONFIG.get_or_init(|| config))
}
