//! Product catalog: public reads and admin CRUD.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::database::{db_error, Database};
use crate::errors::PizzeriaResult;
use crate::server::api_error::ApiError;
use crate::server::auth::Claims;
use crate::server::handlers::{
    created, ok_data, ok_message, ApiResult, AppState, CreatedResponse, DataResponse,
    MessageResponse,
};
use crate::server::logging::{log_event, CatalogEvent};
use crate::server::validation::{
    cents_to_price, parse_body, parse_id, price_to_cents, require_field, validate_length,
    validate_not_empty,
};

/// Product row as stored; price is kept in integer cents.
#[derive(Debug, Clone, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price_cents: i64,
    image: Option<String>,
    category_id: Option<i64>,
}

/// A product as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Serialized as a decimal string such as `"12.50"`.
    pub price: Decimal,
    pub image: Option<String>,
    pub category_id: Option<i64>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: cents_to_price(row.price_cents),
            image: row.image,
            category_id: row.category_id,
        }
    }
}

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<String>,
}

/// Body of create and update requests.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// A validated product body.
#[derive(Debug)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub image: String,
    pub category_id: Option<i64>,
}

impl ProductRequest {
    fn validate(self) -> Result<ProductInput, ApiError> {
        let name = require_field(self.name, "name")?;
        let price = require_field(self.price, "price")?;

        validate_not_empty(&name, "name")?;
        validate_length(&name, 1, 100, "name")?;
        let price_cents = price_to_cents(price, "price")?;

        let image = self.image.unwrap_or_default();
        validate_length(&image, 0, 255, "image")?;

        Ok(ProductInput {
            name,
            description: self.description.unwrap_or_default(),
            price_cents,
            image,
            category_id: self.category_id,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, image, category_id";

impl Database {
    /// Active products ordered by id, optionally limited to one category.
    pub async fn list_products(&self, category_id: Option<i64>) -> PizzeriaResult<Vec<Product>> {
        let rows = match (self, category_id) {
            #[cfg(feature = "sqlite")]
            (Database::SQLite(pool), None) => {
                query_as::<_, ProductRow>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = TRUE ORDER BY id"
                ))
                .fetch_all(pool)
                .await
            }
            #[cfg(feature = "sqlite")]
            (Database::SQLite(pool), Some(category_id)) => {
                query_as::<_, ProductRow>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = TRUE AND category_id = ? ORDER BY id"
                ))
                .bind(category_id)
                .fetch_all(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            (Database::Postgres(pool), None) => {
                query_as::<_, ProductRow>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = TRUE ORDER BY id"
                ))
                .fetch_all(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            (Database::Postgres(pool), Some(category_id)) => {
                query_as::<_, ProductRow>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = TRUE AND category_id = $1 ORDER BY id"
                ))
                .bind(category_id)
                .fetch_all(pool)
                .await
            }
        }
        .map_err(|e| db_error("list products", e))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Fetch an active product.
    pub async fn find_product(&self, id: i64) -> PizzeriaResult<Option<Product>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, ProductRow>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND active = TRUE"
                ))
                .bind(id)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, ProductRow>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND active = TRUE"
                ))
                .bind(id)
                .fetch_optional(pool)
                .await
            }
        }
        .map_err(|e| db_error("find product", e))?;

        Ok(row.map(Product::from))
    }

    /// Whether a product row exists, soft-deleted or not.
    pub async fn product_exists(&self, id: i64) -> PizzeriaResult<bool> {
        let count: i64 = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar("SELECT COUNT(*) FROM products WHERE id = ?")
                    .bind(id)
                    .fetch_one(pool)
                    .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar("SELECT COUNT(*) FROM products WHERE id = $1")
                    .bind(id)
                    .fetch_one(pool)
                    .await
            }
        }
        .map_err(|e| db_error("check product", e))?;

        Ok(count > 0)
    }

    pub async fn insert_product(&self, input: &ProductInput) -> PizzeriaResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar(
                    r#"
                    INSERT INTO products (name, description, price_cents, image, category_id, active)
                    VALUES (?, ?, ?, ?, ?, TRUE)
                    RETURNING id
                    "#,
                )
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.price_cents)
                .bind(&input.image)
                .bind(input.category_id)
                .fetch_one(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar(
                    r#"
                    INSERT INTO products (name, description, price_cents, image, category_id, active)
                    VALUES ($1, $2, $3, $4, $5, TRUE)
                    RETURNING id
                    "#,
                )
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.price_cents)
                .bind(&input.image)
                .bind(input.category_id)
                .fetch_one(pool)
                .await
            }
        }
        .map_err(|e| db_error("insert product", e))
    }

    /// Replace every editable field of a product.
    pub async fn update_product(&self, id: i64, input: &ProductInput) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    UPDATE products
                    SET name = ?, description = ?, price_cents = ?, image = ?, category_id = ?,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.price_cents)
                .bind(&input.image)
                .bind(input.category_id)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    UPDATE products
                    SET name = $1, description = $2, price_cents = $3, image = $4, category_id = $5,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = $6
                    "#,
                )
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.price_cents)
                .bind(&input.image)
                .bind(input.category_id)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
        }
        .map_err(|e| db_error("update product", e))
    }

    /// Mark a product inactive. The row stays in place.
    pub async fn soft_delete_product(&self, id: i64) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "UPDATE products SET active = FALSE, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                )
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "UPDATE products SET active = FALSE, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
                )
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
        }
        .map_err(|e| db_error("delete product", e))
    }
}

/// Reject a `category_id` that does not point at an active category.
async fn check_category(state: &AppState, category_id: Option<i64>) -> Result<(), ApiError> {
    if let Some(category_id) = category_id {
        if state.db.find_category(category_id).await?.is_none() {
            return Err(ApiError::invalid_field(
                "category_id",
                "does not reference an existing category",
            ));
        }
    }
    Ok(())
}

/// `GET /api/products[?category_id=N]`
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<DataResponse<Vec<Product>>> {
    let category_id = filter
        .category_id
        .as_deref()
        .map(|raw| parse_id(raw, "category_id"))
        .transpose()?;

    ok_data(state.db.list_products(category_id).await?)
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DataResponse<Product>> {
    let id = parse_id(&id, "id")?;

    match state.db.find_product(id).await? {
        Some(product) => ok_data(product),
        None => Err(ApiError::not_found("Product")),
    }
}

/// `POST /api/products` (admin)
pub async fn create_product(
    State(state): State<AppState>,
    claims: Claims,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> ApiResult<CreatedResponse> {
    claims.require_admin()?;
    let input = parse_body(payload)?.validate()?;
    check_category(&state, input.category_id).await?;

    let id = state.db.insert_product(&input).await?;
    log_event(CatalogEvent::ProductCreated, &id.to_string(), Some(&input.name));

    created("Product created successfully", id)
}

/// `PUT /api/products/{id}` (admin)
pub async fn update_product(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    claims.require_admin()?;
    let id = parse_id(&id, "id")?;
    let input = parse_body(payload)?.validate()?;

    if !state.db.product_exists(id).await? {
        return Err(ApiError::not_found("Product"));
    }
    check_category(&state, input.category_id).await?;

    state.db.update_product(id, &input).await?;
    log_event(CatalogEvent::ProductUpdated, &id.to_string(), None);

    ok_message("Product updated successfully")
}

/// `DELETE /api/products/{id}` (admin)
pub async fn delete_product(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    claims.require_admin()?;
    let id = parse_id(&id, "id")?;

    if !state.db.product_exists(id).await? {
        return Err(ApiError::not_found("Product"));
    }

    state.db.soft_delete_product(id).await?;
    log_event(CatalogEvent::ProductDeleted, &id.to_string(), None);

    ok_message("Product deleted successfully")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::api_error::ErrorCode;
    use std::str::FromStr;

    fn request(name: Option<&str>, price: Option<&str>) -> ProductRequest {
        ProductRequest {
            name: name.map(str::to_string),
            price: price.map(|p| Decimal::from_str(p).unwrap()),
            description: None,
            image: None,
            category_id: None,
        }
    }

    #[test]
    fn name_and_price_are_required() {
        let err = request(None, Some("9.50")).validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert!(err.message.contains("name"));

        let err = request(Some("Margherita"), None).validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert!(err.message.contains("price"));
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let input = request(Some("Margherita"), Some("9.5")).validate().unwrap();
        assert_eq!(input.description, "");
        assert_eq!(input.image, "");
        assert_eq!(input.price_cents, 950);
        assert_eq!(input.category_id, None);
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = request(Some("Margherita"), Some("-1")).validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidField);
    }

    #[test]
    fn row_converts_to_two_decimal_price() {
        let product = Product::from(ProductRow {
            id: 1,
            name: "Diavola".to_string(),
            description: None,
            price_cents: 1250,
            image: None,
            category_id: Some(2),
        });

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["price"], "12.50");
        assert_eq!(json["category_id"], 2);
    }

    #[test]
    fn price_accepts_numbers_and_strings() {
        let from_number: ProductRequest =
            serde_json::from_str(r#"{"name":"Quattro","price":11.9}"#).unwrap();
        assert_eq!(from_number.price, Some(Decimal::from_str("11.9").unwrap()));

        let from_string: ProductRequest =
            serde_json::from_str(r#"{"name":"Quattro","price":"11.90"}"#).unwrap();
        assert_eq!(from_string.price, Some(Decimal::from_str("11.90").unwrap()));
    }
}
