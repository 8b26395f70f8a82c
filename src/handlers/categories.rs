use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::categories;
use crate::database::models::{Category, Kind};
use crate::error::ApiError;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::{valid_color, FieldErrors};

const DEFAULT_COLOR: &str = "#4f46e5";

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let categories = categories::list(&state.db).await?;
    Ok(ApiResponse::success(categories))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateRequest>,
) -> ApiResult<Category> {
    let mut errors = FieldErrors::new();
    if body.name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    let kind = Kind::parse(&body.kind);
    if kind.is_none() {
        errors.add("type", "Type must be 'income' or 'expense'");
    }
    if let Some(color) = &body.color {
        if !valid_color(color) {
            errors.add("color", "Color must be a hex value like #4f46e5");
        }
    }
    errors.into_result()?;
    let Some(kind) = kind else {
        return Err(ApiError::bad_request("Type must be 'income' or 'expense'"));
    };

    let category = categories::create(
        &state.db,
        body.name.trim(),
        kind,
        body.color.as_deref().unwrap_or(DEFAULT_COLOR),
    )
    .await?;
    tracing::info!(category_id = %category.id, "category created");
    Ok(ApiResponse::created(category).with_message("Category created"))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Category> {
    let mut errors = FieldErrors::new();
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            errors.add("name", "Name cannot be empty");
        }
    }
    if let Some(color) = &body.color {
        if !valid_color(color) {
            errors.add("color", "Color must be a hex value like #4f46e5");
        }
    }
    errors.into_result()?;

    let category = categories::update(
        &state.db,
        id,
        body.name.as_deref().map(str::trim),
        body.color.as_deref(),
    )
    .await?;
    Ok(ApiResponse::success(category).with_message("Category updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    categories::delete(&state.db, id).await?;
    Ok(ApiResponse::success(json!({ "id": id })).with_message("Category deleted"))
}
