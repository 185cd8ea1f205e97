// src/server/mod.rs

//! HTTP side of the pizzeria backend.
//!
//! This module contains:
//! - `routes`      → Route table and router builder
//! - `auth`        → JWT signing, verification and the auth middleware
//! - `account`     → Login and registration
//! - `users`       → User storage and the profile endpoints
//! - `products`    → Product catalog
//! - `categories`  → Product categories
//! - `handlers`    → Shared state and response envelopes
//! - `api_error`   → JSON error body and status mapping
//! - `validation`  → Request validation utilities
//! - `logging`     → Tracing setup, request logging and catalog events

pub mod account;
pub mod api_error;
pub mod auth;
pub mod categories;
pub mod handlers;
pub mod logging;
pub mod products;
pub mod routes;
pub mod users;
pub mod validation;

pub use api_error::{ApiError, ErrorCode};
pub use auth::{AuthError, Claims, Role, TokenSigner};
pub use handlers::AppState;
pub use routes::{build_router, Endpoint};
pub use users::{create_user, NewUser};
pub use validation::{ValidationError, ValidationResult};
