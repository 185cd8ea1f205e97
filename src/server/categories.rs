//! Category listing and admin CRUD.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
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
    parse_body, parse_id, require_field, validate_length, validate_not_empty,
};

/// A category as returned by the API.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Body of create and update requests.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A validated category body.
#[derive(Debug)]
pub struct CategoryInput {
    pub name: String,
    pub description: String,
}

impl CategoryRequest {
    fn validate(self) -> Result<CategoryInput, ApiError> {
        let name = require_field(self.name, "name")?;
        validate_not_empty(&name, "name")?;
        validate_length(&name, 1, 100, "name")?;

        Ok(CategoryInput {
            name,
            description: self.description.unwrap_or_default(),
        })
    }
}

impl Database {
    /// Active categories ordered by id.
    pub async fn list_categories(&self) -> PizzeriaResult<Vec<Category>> {
        let sql = "SELECT id, name, description FROM categories WHERE active = TRUE ORDER BY id";

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Category>(sql).fetch_all(pool).await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Category>(sql).fetch_all(pool).await,
        }
        .map_err(|e| db_error("list categories", e))
    }

    /// Fetch an active category.
    pub async fn find_category(&self, id: i64) -> PizzeriaResult<Option<Category>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, Category>(
                    "SELECT id, name, description FROM categories WHERE id = ? AND active = TRUE",
                )
                .bind(id)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Category>(
                    "SELECT id, name, description FROM categories WHERE id = $1 AND active = TRUE",
                )
                .bind(id)
                .fetch_optional(pool)
                .await
            }
        }
        .map_err(|e| db_error("find category", e))
    }

    /// Whether a category row exists, soft-deleted or not.
    pub async fn category_exists(&self, id: i64) -> PizzeriaResult<bool> {
        let count: i64 = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
                    .bind(id)
                    .fetch_one(pool)
                    .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar("SELECT COUNT(*) FROM categories WHERE id = $1")
                    .bind(id)
                    .fetch_one(pool)
                    .await
            }
        }
        .map_err(|e| db_error("check category", e))?;

        Ok(count > 0)
    }

    pub async fn insert_category(&self, input: &CategoryInput) -> PizzeriaResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_scalar(
                    "INSERT INTO categories (name, description, active) VALUES (?, ?, TRUE) RETURNING id",
                )
                .bind(&input.name)
                .bind(&input.description)
                .fetch_one(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_scalar(
                    "INSERT INTO categories (name, description, active) VALUES ($1, $2, TRUE) RETURNING id",
                )
                .bind(&input.name)
                .bind(&input.description)
                .fetch_one(pool)
                .await
            }
        }
        .map_err(|e| db_error("insert category", e))
    }

    pub async fn update_category(&self, id: i64, input: &CategoryInput) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "UPDATE categories SET name = ?, description = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                )
                .bind(&input.name)
                .bind(&input.description)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "UPDATE categories SET name = $1, description = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3",
                )
                .bind(&input.name)
                .bind(&input.description)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
        }
        .map_err(|e| db_error("update category", e))
    }

    /// Mark a category inactive. The row stays in place.
    pub async fn soft_delete_category(&self, id: i64) -> PizzeriaResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "UPDATE categories SET active = FALSE, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                )
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "UPDATE categories SET active = FALSE, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
                )
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ())
            }
        }
        .map_err(|e| db_error("delete category", e))
    }
}

/// `GET /api/categories`
pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<DataResponse<Vec<Category>>> {
    ok_data(state.db.list_categories().await?)
}

/// `GET /api/categories/{id}`
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DataResponse<Category>> {
    let id = parse_id(&id, "id")?;

    match state.db.find_category(id).await? {
        Some(category) => ok_data(category),
        None => Err(ApiError::not_found("Category")),
    }
}

/// `POST /api/categories` (admin)
pub async fn create_category(
    State(state): State<AppState>,
    claims: Claims,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<CreatedResponse> {
    claims.require_admin()?;
    let input = parse_body(payload)?.validate()?;

    let id = state.db.insert_category(&input).await?;
    log_event(CatalogEvent::CategoryCreated, &id.to_string(), Some(&input.name));

    created("Category created successfully", id)
}

/// `PUT /api/categories/{id}` (admin)
pub async fn update_category(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    claims.require_admin()?;
    let id = parse_id(&id, "id")?;
    let input = parse_body(payload)?.validate()?;

    if !state.db.category_exists(id).await? {
        return Err(ApiError::not_found("Category"));
    }

    state.db.update_category(id, &input).await?;
    log_event(CatalogEvent::CategoryUpdated, &id.to_string(), None);

    ok_message("Category updated successfully")
}

/// `DELETE /api/categories/{id}` (admin)
pub async fn delete_category(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    claims.require_admin()?;
    let id = parse_id(&id, "id")?;

    if !state.db.category_exists(id).await? {
        return Err(ApiError::not_found("Category"));
    }

    state.db.soft_delete_category(id).await?;
    log_event(CatalogEvent::CategoryDeleted, &id.to_string(), None);

    ok_message("Category deleted successfully")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::api_error::ErrorCode;

    #[test]
    fn request_requires_name() {
        let err = CategoryRequest {
            name: None,
            description: Some("Tomato based".to_string()),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
    }

    #[test]
    fn request_rejects_blank_and_long_names() {
        let blank = CategoryRequest {
            name: Some("   ".to_string()),
            description: None,
        };
        assert_eq!(blank.validate().unwrap_err().code, ErrorCode::InvalidField);

        let long = CategoryRequest {
            name: Some("x".repeat(101)),
            description: None,
        };
        assert_eq!(long.validate().unwrap_err().code, ErrorCode::InvalidField);
    }

    #[test]
    fn description_defaults_to_empty() {
        let input = CategoryRequest {
            name: Some("Calzoni".to_string()),
            description: None,
        }
        .validate()
        .unwrap();
        assert_eq!(input.description, "");
    }
}
