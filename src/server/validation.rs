//! Request validation utilities for the pizzeria API.
//!
//! Handlers take their body as `Result<Json<T>, JsonRejection>` and run it
//! through [`parse_body`] so malformed JSON gets the standard error body
//! instead of axum's plain-text rejection.

use axum::{extract::rejection::JsonRejection, Json};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::sync::OnceLock;

use crate::server::api_error::{ApiError, ErrorCode};

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field_name: &str, message: impl Into<String>) -> Self {
        Self {
            field: field_name.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid_field(&err.field, &err.message)
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest price a `DECIMAL(10,2)` column holds.
const MAX_PRICE_CENTS: i64 = 99_999_999_99;

/// Unwrap a JSON body, turning extractor rejections into a 400.
pub fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            ApiError::with_message(
                ErrorCode::InvalidRequest,
                format!("Invalid JSON body: {}", rejection.body_text()),
            )
        })
}

/// Require an optional request field to be present.
pub fn require_field<T>(value: Option<T>, field_name: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::missing_field(field_name))
}

/// Parse a numeric row id from a path segment or query parameter.
///
/// # Example
/// ```
/// use pizzeria::server::validation::parse_id;
///
/// assert_eq!(parse_id("42", "id").unwrap(), 42);
/// assert!(parse_id("abc", "id").is_err());
/// assert!(parse_id("0", "id").is_err());
/// ```
pub fn parse_id(raw: &str, field_name: &str) -> ValidationResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::new(field_name, "must be a positive integer")),
    }
}

/// Validate that a string is not empty or whitespace only.
///
/// # Example
/// ```
/// use pizzeria::server::validation::validate_not_empty;
///
/// assert!(validate_not_empty("hello", "name").is_ok());
/// assert!(validate_not_empty("", "name").is_err());
/// assert!(validate_not_empty("   ", "name").is_err());
/// ```
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field_name, "cannot be empty"))
    } else {
        Ok(())
    }
}

/// Validate string length (in characters) is within bounds.
///
/// # Example
/// ```
/// use pizzeria::server::validation::validate_length;
///
/// assert!(validate_length("hello", 1, 10, "name").is_ok());
/// assert!(validate_length("", 1, 10, "name").is_err());
/// assert!(validate_length("a".repeat(100).as_str(), 1, 10, "name").is_err());
/// ```
pub fn validate_length(
    value: &str,
    min: usize,
    max: usize,
    field_name: &str,
) -> ValidationResult<()> {
    let len = value.chars().count();
    if len < min {
        Err(ValidationError::new(
            field_name,
            format!("must be at least {} characters", min),
        ))
    } else if len > max {
        Err(ValidationError::new(
            field_name,
            format!("must be at most {} characters", max),
        ))
    } else {
        Ok(())
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Validate an email address (format and a 100 character limit).
///
/// # Example
/// ```
/// use pizzeria::server::validation::validate_email;
///
/// assert!(validate_email("chef@pizzeria.test", "email").is_ok());
/// assert!(validate_email("not-an-email", "email").is_err());
/// ```
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    validate_length(value, 3, 100, field_name)?;

    match email_regex() {
        Some(re) if re.is_match(value) => Ok(()),
        _ => Err(ValidationError::new(field_name, "must be a valid email address")),
    }
}

/// Validate a price and convert it to integer cents.
///
/// Negative prices are rejected, extra fractional digits are rounded half
/// away from zero to two places, and the result must fit `DECIMAL(10,2)`.
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use pizzeria::server::validation::price_to_cents;
///
/// assert_eq!(price_to_cents(Decimal::new(1250, 2), "price").unwrap(), 1250);
/// assert!(price_to_cents(Decimal::new(-1, 0), "price").is_err());
/// ```
pub fn price_to_cents(price: Decimal, field_name: &str) -> ValidationResult<i64> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new(field_name, "cannot be negative"));
    }

    price
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .filter(|cents| *cents <= MAX_PRICE_CENTS)
        .ok_or_else(|| ValidationError::new(field_name, "exceeds the maximum of 99999999.99"))
}

/// Render integer cents as a two-decimal price.
pub fn cents_to_price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
