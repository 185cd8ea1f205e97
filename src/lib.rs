//! Pizzeria - REST backend for a pizzeria ordering site
//!
//! Products, categories and user accounts over a small JSON API with bearer
//! token authentication, plus a tracked migration/rollback tool for the schema.
//!
//! # Features
//!
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//!
//! # Binaries
//!
//! - `pizzeria_server` - serves the HTTP API
//! - `pizzeria_admin` - applies and rolls back migrations, creates admin users
//!
//! ```toml
//! # Server with PostgreSQL
//! pizzeria-api = { path = ".", features = ["postgres"] }
//! ```

pub mod config;
pub mod database;
pub mod errors;
pub mod migrations;

#[path = "server/mod.rs"]
pub mod server;
