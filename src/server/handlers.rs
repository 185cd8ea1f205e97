use std::sync::Arc;

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::config::PizzeriaConfig;
use crate::database::Database;
use crate::errors::{PizzeriaError, PizzeriaResult};
use crate::server::api_error::ApiError;
use crate::server::auth::TokenSigner;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tokens: Arc<TokenSigner>,
    /// bcrypt cost for new password hashes
    pub password_cost: u32,
}

impl AppState {
    /// Build the state from loaded configuration and an open database.
    pub fn new(db: Arc<Database>, config: &PizzeriaConfig) -> PizzeriaResult<Self> {
        Ok(Self {
            db,
            tokens: Arc::new(TokenSigner::from_config(&config.auth)?),
            password_cost: config.auth.password_cost,
        })
    }
}

/// Result type returned by every handler.
pub type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

/// `{"data": ...}` envelope for reads.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// `{"message": ...}` for updates and deletes.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `{"message": ..., "id": ...}` for creates.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}

pub fn ok_data<T>(data: T) -> ApiResult<DataResponse<T>> {
    Ok((StatusCode::OK, Json(DataResponse { data })))
}

pub fn ok_message(message: &str) -> ApiResult<MessageResponse> {
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    ))
}

pub fn created(message: &str, id: i64) -> ApiResult<CreatedResponse> {
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: message.to_string(),
            id,
        }),
    ))
}

/// Hash a password with bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> PizzeriaResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| PizzeriaError::PasswordError(format!("hashing task failed: {e}")))?
        .map_err(|e| PizzeriaError::PasswordError(e.to_string()))
}

/// Check a password against a stored bcrypt hash on the blocking pool.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> PizzeriaResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| PizzeriaError::PasswordError(format!("verification task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_hash_roundtrip() {
        let hash = hash_password("s3cret!".to_string(), 4).await.unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(verify_password("s3cret!".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("anything".to_string(), "not-a-hash".to_string())
            .await
            .unwrap());
    }

    #[test]
    fn response_envelopes_serialize() {
        let body = serde_json::to_value(CreatedResponse {
            message: "Product created".to_string(),
            id: 3,
        })
        .unwrap();
        assert_eq!(body["id"], 3);

        let body = serde_json::to_value(DataResponse { data: vec![1, 2] }).unwrap();
        assert_eq!(body["data"][1], 2);
    }
}
