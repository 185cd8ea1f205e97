use thiserror::Error;

/// Errors produced by the pizzeria backend outside of the HTTP layer.
///
/// Handlers convert these into [`crate::server::api_error::ApiError`], which
/// decides what (if anything) of the message reaches the client.
#[derive(Debug, Error)]
pub enum PizzeriaError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("token error: {0}")]
    TokenError(String),

    #[error("password hashing failed: {0}")]
    PasswordError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PizzeriaResult<T> = Result<T, PizzeriaError>;

impl From<config::ConfigError> for PizzeriaError {
    fn from(err: config::ConfigError) -> Self {
        PizzeriaError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for PizzeriaError {
    fn from(err: sqlx::Error) -> Self {
        PizzeriaError::DatabaseError(err.to_string())
    }
}
