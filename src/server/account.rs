//! Login and registration.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::PizzeriaError;
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::Role;
use crate::server::handlers::{verify_password, ApiResult, AppState};
use crate::server::logging::{log_event, CatalogEvent};
use crate::server::users::{create_user, NewUser};
use crate::server::validation::{parse_body, require_field};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public user summary embedded in auth responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// Response of login and register.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: AuthUser,
}

fn invalid_credentials() -> ApiError {
    ApiError::new(ErrorCode::InvalidCredentials)
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let body = parse_body(payload)?;
    let username = require_field(body.username, "username")?;
    let password = require_field(body.password, "password")?;

    let Some(user) = state.db.find_credentials(&username).await? else {
        log_event(CatalogEvent::LoginFailed, &username, Some("unknown user"));
        return Err(invalid_credentials());
    };

    if !verify_password(password, user.password.clone()).await? {
        log_event(CatalogEvent::LoginFailed, &username, Some("wrong password"));
        return Err(invalid_credentials());
    }

    let role = Role::from_db(&user.role);
    let token = state.tokens.generate_token(user.id, &user.username, role)?;
    log_event(CatalogEvent::LoginSucceeded, &user.username, None);

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            message: "Login successful".to_string(),
            token,
            user: AuthUser {
                id: user.id,
                username: user.username,
                role,
            },
        }),
    ))
}

/// `POST /api/auth/register`
///
/// New accounts always get the `user` role.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let body = parse_body(payload)?;
    let new_user = NewUser {
        username: require_field(body.username, "username")?,
        email: require_field(body.email, "email")?,
        password: require_field(body.password, "password")?,
    };
    new_user.validate()?;

    let id = create_user(&state.db, &new_user, Role::User, state.password_cost)
        .await
        .map_err(|e| match e {
            PizzeriaError::Conflict(_) => ApiError::conflict("Username or email already exists"),
            other => other.into(),
        })?;

    let username = new_user.username.trim().to_string();
    let token = state.tokens.generate_token(id, &username, Role::User)?;
    log_event(CatalogEvent::UserRegistered, &username, None);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            token,
            user: AuthUser {
                id,
                username,
                role: Role::User,
            },
        }),
    ))
}
