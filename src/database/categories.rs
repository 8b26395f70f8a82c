use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

use super::models::{Category, Kind};

pub async fn list(pool: &PgPool) -> Result<Vec<Category>, ApiError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, kind, color, created_at FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    kind: Kind,
    color: &str,
) -> Result<Category, ApiError> {
    sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, kind, color) VALUES ($1, $2, $3) \
         RETURNING id, name, kind, color, created_at",
    )
    .bind(name)
    .bind(kind.as_str())
    .bind(color)
    .fetch_one(pool)
    .await
    .map_err(|e| match unique_violation(&e) {
        true => ApiError::conflict("Category name already exists"),
        false => e.into(),
    })
}

/// Kind is immutable after creation: existing transactions were validated
/// against it and flipping it would silently break the kind invariant.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    color: Option<&str>,
) -> Result<Category, ApiError> {
    sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = COALESCE($1, name), color = COALESCE($2, color) \
         WHERE id = $3 RETURNING id, name, kind, color, created_at",
    )
    .bind(name)
    .bind(color)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| match unique_violation(&e) {
        true => ApiError::conflict("Category name already exists"),
        false => e.into(),
    })?
    .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// Deletion is blocked while any transaction references the category.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ApiError> {
    let referenced = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM transactions WHERE category_id = $1)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    if referenced {
        return Err(ApiError::conflict("Category is referenced by transactions"));
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Category not found"));
    }
    Ok(())
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
