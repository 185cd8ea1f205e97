//! User accounts: storage, creation and the authenticated profile endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::database::{db_error, Database};
use crate::errors::{PizzeriaError, PizzeriaResult};
use crate::server::api_error::ApiError;
use crate::server::auth::{Claims, Role};
use crate::server::handlers::{
    hash_password, ok_data, ok_message, ApiResult, AppState, DataResponse, MessageResponse,
};
use crate::server::logging::{log_event, CatalogEvent};
use crate::server::validation::{
    parse_body, require_field, validate_email, validate_length, ValidationResult,
};

/// Minimum password length for new and changed passwords.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Stored credentials, used by login.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    /// bcrypt hash
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    id: i64,
    username: String,
    email: String,
    role: String,
}

/// The authenticated user's own account data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            role: Role::from_db(&row.role),
        }
    }
}

/// A user about to be created, by registration or the admin CLI.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_length(self.username.trim(), 3, 50, "username")?;
        validate_email(&self.email, "email")?;
        validate_length(&self.password, MIN_PASSWORD_LEN, usize::MAX, "password")?;
        Ok(())
    }
}

/// Body of `PUT /api/user/profile`.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Database {
    pub async fn find_credentials(
        &self,
        username: &str,
    ) -> PizzeriaResult<Option<UserCredentials>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, UserCredentials>(
                    "SELECT id, username, password, role FROM users WHERE username = ?",
                )
                .bind(username)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, UserCredentials>(
                    "SELECT id, username, password, role FROM users WHERE username = $1",
                )
                .bind(username)
                .fetch_optional(pool)
                .await
            }
        }
        .map_err(|e| db_error("find user", e))
    }

    pub async fn find_profile(&self, user_id: i64) -> PizzeriaResult<Option<Profile>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, ProfileRow>(
                    "SELECT id, username, email, role FROM users WHERE id = ?",
                )
                .bind(user_id)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, ProfileRow>(
                    "SELECT id, username, email, role FROM users WHERE id = $1",
                )
                .bind(user_id)
                .fetch_optional(pool)
                .await
            }
        }
        .map_err(|e| db_error("find profile", e))?;

        Ok(row.map(Profile::from))
    }

    pub async fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> PizzeriaResult<bool> {
        let count: i64 = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                    .bind(username)
                    .bind(email)
                    .fetch_one(pool)
                    .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar("SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2")
                    .bind(username)
                    .bind(email)
                    .fetch_one(pool)
                    .await
            }
        }
        .map_err(|e| db_error("check user uniqueness", e))?;

        Ok(count > 0)
    }

    pub async fn email_taken_by_other(&self, email: &str, user_id: i64) -> PizzeriaResult<bool> {
        let count: i64 = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id <> ?")
                    .bind(email)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar("SELECT COUNT(*) FROM users WHERE email = $1 AND id <> $2")
                    .bind(email)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
            }
        }
        .map_err(|e| db_error("check email", e))?;

        Ok(count > 0)
    }

    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PizzeriaResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar(
                    "INSERT INTO users (username, email, password, role) VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(username)
                .bind(email)
                .bind(password_hash)
                .bind(role.as_str())
                .fetch_one(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar(
                    "INSERT INTO users (username, email, password, role) VALUES ($1, $2, $3, $4) RETURNING id",
                )
                .bind(username)
                .bind(email)
                .bind(password_hash)
                .bind(role.as_str())
                .fetch_one(pool)
                .await
            }
        }
        .map_err(|e| db_error("insert user", e))
    }

    /// Set a user's email and, when given, a new password hash.
    pub async fn update_profile(
        &self,
        user_id: i64,
        email: &str,
        password_hash: Option<&str>,
    ) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    UPDATE users
                    SET email = ?, password = COALESCE(?, password), updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(email)
                .bind(password_hash)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|_| ())
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    UPDATE users
                    SET email = $1, password = COALESCE($2, password), updated_at = CURRENT_TIMESTAMP
                    WHERE id = $3
                    "#,
                )
                .bind(email)
                .bind(password_hash)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|_| ())
            }
        }
        .map_err(|e| db_error("update profile", e))
    }
}

/// Create a user after checking that username and email are free.
///
/// Returns [`PizzeriaError::Conflict`] when either is taken, including when a
/// concurrent insert wins the race to the unique index.
pub async fn create_user(
    db: &Database,
    user: &NewUser,
    role: Role,
    password_cost: u32,
) -> PizzeriaResult<i64> {
    let username = user.username.trim();

    if db.username_or_email_taken(username, &user.email).await? {
        return Err(PizzeriaError::Conflict(
            "username or email already exists".to_string(),
        ));
    }

    let hash = hash_password(user.password.clone(), password_cost).await?;
    db.insert_user(username, &user.email, &hash, role).await
}

/// `GET /api/user/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<DataResponse<Profile>> {
    match state.db.find_profile(claims.user_id).await? {
        Some(profile) => ok_data(profile),
        None => Err(ApiError::not_found("User")),
    }
}

/// `PUT /api/user/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    claims: Claims,
    payload: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let body = parse_body(payload)?;
    let email = require_field(body.email, "email")?;
    validate_email(&email, "email")?;

    let password = body.password.filter(|p| !p.is_empty());
    if let Some(password) = &password {
        validate_length(password, MIN_PASSWORD_LEN, usize::MAX, "password")?;
    }

    if state.db.find_profile(claims.user_id).await?.is_none() {
        return Err(ApiError::not_found("User"));
    }

    if state.db.email_taken_by_other(&email, claims.user_id).await? {
        return Err(ApiError::conflict("Email is already in use"));
    }

    let password_hash = match password {
        Some(password) => Some(hash_password(password, state.password_cost).await?),
        None => None,
    };

    state
        .db
        .update_profile(claims.user_id, &email, password_hash.as_deref())
        .await
        .map_err(|e| match e {
            PizzeriaError::Conflict(_) => ApiError::conflict("Email is already in use"),
            other => other.into(),
        })?;

    log_event(CatalogEvent::ProfileUpdated, &claims.username, None);
    ok_message("Profile updated successfully")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn new_user_validation() {
        assert!(new_user("mario", "mario@pizzeria.test", "secret1")
            .validate()
            .is_ok());

        let err = new_user("mo", "mario@pizzeria.test", "secret1")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "username");

        let err = new_user("mario", "mario-at-pizzeria", "secret1")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "email");

        let err = new_user("mario", "mario@pizzeria.test", "12345")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "password");
    }

    #[test]
    fn profile_role_comes_from_column() {
        let profile = Profile::from(ProfileRow {
            id: 1,
            username: "admin".to_string(),
            email: "admin@pizzeria.test".to_string(),
            role: "admin".to_string(),
        });
        assert_eq!(profile.role, Role::Admin);

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["role"], "admin");
    }
}
