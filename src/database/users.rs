use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::ApiError;

use super::models::{Role, User, UserWithStats};
use super::{page_offset, PageMeta};

const USER_COLUMNS: &str =
    "id, email, password_hash, name, role, created_at, updated_at";

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// New registrations always start as plain users; promotion is an admin
/// operation.
pub async fn create(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    name: &str,
) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password_hash, name, role) VALUES ($1, $2, $3, 'user') \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| match unique_violation(&e) {
        true => ApiError::conflict("Email already registered"),
        false => e.into(),
    })
}

pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email), \
         updated_at = now() WHERE id = $3 RETURNING {USER_COLUMNS}"
    ))
    .bind(name)
    .bind(email)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| match unique_violation(&e) {
        true => ApiError::conflict("Email already registered"),
        false => e.into(),
    })?
    .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Admin listing: paginated users, filterable by role and free-text
/// search, each with the number of transactions they own.
pub async fn admin_list(
    pool: &PgPool,
    role: Option<Role>,
    search: Option<&str>,
    page: i64,
    limit: i64,
) -> Result<(Vec<UserWithStats>, PageMeta), ApiError> {
    fn push_filters(
        qb: &mut QueryBuilder<'static, Postgres>,
        role: Option<Role>,
        search: Option<&str>,
    ) {
        qb.push(" WHERE 1=1");
        if let Some(role) = role {
            qb.push(" AND u.role = ").push_bind(role.as_str());
        }
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (u.email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM users u");
    push_filters(&mut count_qb, role, search);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(
        "SELECT u.id, u.email, u.name, u.role, u.created_at, \
         (SELECT COUNT(*) FROM transactions t WHERE t.user_id = u.id) AS transaction_count \
         FROM users u",
    );
    push_filters(&mut qb, role, search);
    qb.push(" ORDER BY u.created_at DESC");
    qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(page_offset(page, limit));

    let users = qb.build_query_as::<UserWithStats>().fetch_all(pool).await?;
    Ok((users, PageMeta::new(page, limit, total)))
}

pub async fn set_role(pool: &PgPool, id: Uuid, role: Role) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET role = $1, updated_at = now() WHERE id = $2 RETURNING {USER_COLUMNS}"
    ))
    .bind(role.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Owned transactions go with the user (ON DELETE CASCADE).
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(())
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
