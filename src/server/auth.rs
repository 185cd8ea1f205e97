//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs signed with `JWT_SECRET`. The payload carries the
//! user's id, username and role plus `iat`/`exp`; nothing else is trusted.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pizzeria::server::auth::Claims;
//!
//! // Behind `require_auth`, handlers receive the verified claims:
//! async fn profile(claims: Claims) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.username)
//! }
//! ```
//!
//! # Configuration
//!
//! - `JWT_SECRET` - Required secret key for HS256 signing
//! - `JWT_EXPIRATION` - Token lifetime in seconds (default: 3600)

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::errors::{PizzeriaError, PizzeriaResult};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::logging::{log_event, CatalogEvent};

/// Account role stored on the user row and carried in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse the role column; anything unknown is treated as a plain user.
    pub fn from_db(value: &str) -> Self {
        if value.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require the admin role, returning 403 otherwise.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            log_event(CatalogEvent::AccessDenied, &self.username, Some("admin role required"));
            Err(ApiError::forbidden())
        }
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing Authorization header
    MissingToken,
    /// Authorization header is not `Bearer <token>`
    InvalidHeader,
    /// Token validation failed
    InvalidToken(String),
    /// Token has expired
    TokenExpired,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "missing authorization token"),
            AuthError::InvalidHeader => write!(f, "invalid authorization header format"),
            AuthError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            AuthError::TokenExpired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = match &self {
            AuthError::MissingToken => ErrorCode::MissingToken,
            AuthError::InvalidHeader | AuthError::InvalidToken(_) => ErrorCode::InvalidToken,
            AuthError::TokenExpired => ErrorCode::TokenExpired,
        };

        ApiError::new(code).into_response()
    }
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    expiration_secs: u64,
}

impl TokenSigner {
    /// Create a signer from auth configuration.
    pub fn from_config(config: &AuthConfig) -> PizzeriaResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(PizzeriaError::ConfigError(
                "JWT_SECRET is required to sign tokens".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let secret = config.jwt_secret.as_bytes();
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            validation,
            expiration_secs: config.token_expiration_secs,
        })
    }

    /// Issue a token for a user.
    pub fn generate_token(
        &self,
        user_id: i64,
        username: &str,
        role: Role,
    ) -> PizzeriaResult<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| PizzeriaError::TokenError(format!("system time error: {e}")))?
            .as_secs();

        let claims = Claims {
            iat: now,
            exp: now + self.expiration_secs,
            user_id,
            username: username.to_string(),
            role,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PizzeriaError::TokenError(format!("failed to create token: {e}")))
    }

    /// Verify a raw token and extract its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    /// Verify the bearer token carried in the `Authorization` header.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?;

        let token = parse_bearer(value).ok_or(AuthError::InvalidHeader)?;
        self.verify(token)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

/// Extract the token from a `Bearer <token>` header value.
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// ignored. The token itself must be a single non-empty word.
fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(token)
}

/// Middleware for authenticated routes.
///
/// Verifies the bearer token and stores the [`Claims`] in the request
/// extensions; failures end the request with 401.
pub async fn require_auth(
    State(signer): State<Arc<TokenSigner>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match signer.verify_headers(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            log_event(
                CatalogEvent::AuthRejected,
                request.uri().path(),
                Some(&e.to_string()),
            );
            Err(e)
        }
    }
}

/// Axum extractor for the claims verified by [`require_auth`].
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key-for-testing-only".to_string(),
            token_expiration_secs: 3600,
            password_cost: 4,
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn generate_and_verify_token() {
        let signer = TokenSigner::from_config(&test_config()).unwrap();

        let token = signer.generate_token(7, "mario", Role::Admin).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "mario");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn token_has_three_segments_and_hs256_header() {
        let signer = TokenSigner::from_config(&test_config()).unwrap();
        let token = signer.generate_token(1, "luigi", Role::User).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["role"], "user");
        assert_eq!(payload["username"], "luigi");
    }

    #[test]
    fn reject_tampered_payload() {
        let signer = TokenSigner::from_config(&test_config()).unwrap();
        let token = signer.generate_token(2, "peach", Role::User).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["role"] = serde_json::json!("admin");
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            signer.verify(&forged),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn reject_invalid_token() {
        let signer = TokenSigner::from_config(&test_config()).unwrap();
        assert!(signer.verify("invalid-token").is_err());
        assert!(signer.verify("a.b.c").is_err());
    }

    #[test]
    fn reject_wrong_secret() {
        let signer = TokenSigner::from_config(&test_config()).unwrap();
        let token = signer.generate_token(3, "toad", Role::User).unwrap();

        let other = TokenSigner::from_config(&AuthConfig {
            jwt_secret: "different-secret".to_string(),
            ..test_config()
        })
        .unwrap();

        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn reject_expired_token() {
        let config = test_config();
        let signer = TokenSigner::from_config(&config).unwrap();

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let expired_claims = Claims {
            iat: now - 7200,
            exp: now - 1,
            user_id: 4,
            username: "bowser".to_string(),
            role: Role::User,
        };

        let token = encode(
            &Header::default(),
            &expired_claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(signer.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn empty_secret_fails() {
        let config = AuthConfig {
            jwt_secret: String::new(),
            ..test_config()
        };
        assert!(TokenSigner::from_config(&config).is_err());
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("  bearer   abc.def.ghi  "), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("BEARER abc"), Some("abc"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
        assert_eq!(parse_bearer("abc.def.ghi"), None);
    }

    #[test]
    fn verify_headers_reports_missing_and_malformed() {
        let signer = TokenSigner::from_config(&test_config()).unwrap();

        assert_eq!(
            signer.verify_headers(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            signer.verify_headers(&headers_with("Token xyz")),
            Err(AuthError::InvalidHeader)
        );

        let token = signer.generate_token(5, "daisy", Role::User).unwrap();
        let claims = signer
            .verify_headers(&headers_with(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(claims.username, "daisy");
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::from_db("admin"), Role::Admin);
        assert_eq!(Role::from_db("user"), Role::User);
        assert_eq!(Role::from_db("something"), Role::User);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn require_admin_checks_role() {
        let mut claims = Claims {
            iat: 0,
            exp: u64::MAX,
            user_id: 1,
            username: "yoshi".to_string(),
            role: Role::User,
        };
        assert_eq!(
            claims.require_admin().unwrap_err().code,
            ErrorCode::Forbidden
        );

        claims.role = Role::Admin;
        assert!(claims.require_admin().is_ok());
    }
}
