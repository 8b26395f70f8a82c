use axum::{
    extract::{Path, Query, State},
    response::Response,
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{Kind, Role};
use crate::database::transactions::{
    self, NewTransaction, TransactionFilters, TransactionPatch,
};
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
    pub category: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    /// Admin-only scope override; silently ignored for everyone else.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub amount: Decimal,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub category_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// Ownership scoping at the query level: non-admins are always pinned to
/// their own rows regardless of what they ask for; admins see everything
/// unless they narrow to a specific user.
fn scope_for(user: &CurrentUser, requested: Option<Uuid>) -> Option<Uuid> {
    if user.role == Role::Admin {
        requested
    } else {
        Some(user.id)
    }
}

fn parse_kind(raw: &str) -> Result<Kind, ApiError> {
    Kind::parse(raw).ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.add("type", "Type must be 'income' or 'expense'");
        errors.into_error()
    })
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<serde_json::Value> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;
    let filters = TransactionFilters {
        category_id: query.category,
        kind,
        search: query.search,
        start_date: query.start_date,
        end_date: query.end_date,
        sort_by: query.sort_by,
        sort_order: query.sort_order,
    };

    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit);
    let scope = scope_for(&user, query.user_id);

    let (rows, meta) = transactions::list(&state.db, scope, &filters, page, limit).await?;
    Ok(ApiResponse::success(json!({
        "transactions": rows,
        "pagination": meta,
    })))
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<transactions::Summary> {
    let scope = scope_for(&user, query.user_id);
    let summary =
        transactions::summarize(&state.db, scope, query.start_date, query.end_date).await?;
    Ok(ApiResponse::success(summary))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<crate::database::models::TransactionWithCategory> {
    let transaction = transactions::get_one(&state.db, scope_for(&user, None), id).await?;
    Ok(ApiResponse::success(transaction))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateRequest>,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&body.kind)?;
    let mut errors = FieldErrors::new();
    if body.amount <= Decimal::ZERO {
        errors.add("amount", "Amount must be a positive number");
    }
    errors.into_result()?;

    let new = NewTransaction {
        category_id: body.category_id,
        amount: body.amount,
        description: body.description.unwrap_or_default(),
        kind,
        date: body.date,
    };
    let transaction = transactions::create(&state.db, user.id, &new).await?;
    tracing::debug!(transaction_id = %transaction.id, "transaction created");

    let owner = transaction.user_id;
    Ok(touching(
        owner,
        ApiResponse::created(transaction).with_message("Transaction created"),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRequest>,
) -> Result<Response, ApiError> {
    let kind = body.kind.as_deref().map(parse_kind).transpose()?;
    let mut errors = FieldErrors::new();
    if let Some(amount) = body.amount {
        if amount <= Decimal::ZERO {
            errors.add("amount", "Amount must be a positive number");
        }
    }
    errors.into_result()?;

    let patch = TransactionPatch {
        category_id: body.category_id,
        amount: body.amount,
        description: body.description,
        kind,
        date: body.date,
    };
    let transaction =
        transactions::update(&state.db, scope_for(&user, None), id, &patch).await?;

    let owner = transaction.user_id;
    Ok(touching(
        owner,
        ApiResponse::success(transaction).with_message("Transaction updated"),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let transaction = transactions::delete(&state.db, scope_for(&user, None), id).await?;
    Ok(touching(
        transaction.user_id,
        ApiResponse::success(json!({ "id": transaction.id }))
            .with_message("Transaction deleted"),
    ))
}
