//! Request logging middleware and catalog event logging.
//!
//! Every request gets a unique `X-Request-Id`, a tracing span with its method
//! and path, and a completion line with status and duration. Domain events
//! (product created, login failed, ...) go through [`log_event`] so they share
//! one structured shape.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` (from `LOG_LEVEL`) applies.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Catalog and account events worth an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    CategoryCreated,
    CategoryUpdated,
    CategoryDeleted,
    UserRegistered,
    LoginSucceeded,
    LoginFailed,
    ProfileUpdated,
    /// A token was missing, malformed, expired or forged
    AuthRejected,
    /// An authenticated user lacked the required role
    AccessDenied,
}

impl std::fmt::Display for CatalogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CatalogEvent::ProductCreated => "product_created",
            CatalogEvent::ProductUpdated => "product_updated",
            CatalogEvent::ProductDeleted => "product_deleted",
            CatalogEvent::CategoryCreated => "category_created",
            CatalogEvent::CategoryUpdated => "category_updated",
            CatalogEvent::CategoryDeleted => "category_deleted",
            CatalogEvent::UserRegistered => "user_registered",
            CatalogEvent::LoginSucceeded => "login_succeeded",
            CatalogEvent::LoginFailed => "login_failed",
            CatalogEvent::ProfileUpdated => "profile_updated",
            CatalogEvent::AuthRejected => "auth_rejected",
            CatalogEvent::AccessDenied => "access_denied",
        };
        write!(f, "{}", s)
    }
}

impl CatalogEvent {
    fn is_failure(&self) -> bool {
        matches!(
            self,
            CatalogEvent::LoginFailed | CatalogEvent::AuthRejected | CatalogEvent::AccessDenied
        )
    }
}

/// Log a catalog or account event.
///
/// # Arguments
///
/// * `event` - What happened
/// * `subject` - The entity involved (product id, username, ...)
/// * `details` - Optional additional context
pub fn log_event(event: CatalogEvent, subject: &str, details: Option<&str>) {
    let span = info_span!("catalog_event", event = %event, subject = %subject);
    let _enter = span.enter();

    match (event.is_failure(), details) {
        (true, Some(d)) => warn!(reason = %d, "Catalog event occurred"),
        (true, None) => warn!("Catalog event occurred"),
        (false, Some(d)) => info!(details = %d, "Catalog event occurred"),
        (false, None) => info!("Catalog event occurred"),
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
///
/// This middleware:
/// 1. Generates a unique request ID for each incoming request
/// 2. Creates a tracing span with the request ID
/// 3. Logs the request method and path
/// 4. Measures and logs the response time
/// 5. Adds the request ID to the response headers
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}
