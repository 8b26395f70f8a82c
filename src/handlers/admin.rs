use axum::{
    extract::{Path, Query, State},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{Role, User};
use crate::database::users;
use crate::database::{clamp_limit, clamp_page};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::middleware::cache::touching;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::FieldErrors;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::parse(raw).ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.add("role", "Role must be 'admin', 'user' or 'read-only'");
        errors.into_error()
    })
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<serde_json::Value> {
    let role = query.role.as_deref().map(parse_role).transpose()?;
    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit);

    let (users, meta) =
        users::admin_list(&state.db, role, query.search.as_deref(), page, limit).await?;
    Ok(ApiResponse::success(json!({
        "users": users,
        "pagination": meta,
    })))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<User> {
    let role = parse_role(&body.role)?;
    if id == current.id {
        return Err(ApiError::bad_request("Cannot change your own role"));
    }

    let user = users::set_role(&state.db, id, role).await?;
    tracing::info!(user_id = %user.id, role = %role, "role changed");
    Ok(ApiResponse::success(user).with_message("Role updated"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    if id == current.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    users::delete(&state.db, id).await?;
    tracing::info!(user_id = %id, "user deleted");
    // Deleting a user cascades to their transactions, so their cached
    // reads must go too.
    Ok(touching(
        id,
        ApiResponse::success(json!({ "id": id })).with_message("User deleted"),
    ))
}
