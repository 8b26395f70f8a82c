use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;

use super::models::{Kind, Transaction, TransactionWithCategory};
use super::{page_offset, PageMeta};

/// Client-supplied list filters, already parsed by the handler.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilters {
    pub category_id: Option<Uuid>,
    pub kind: Option<Kind>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub category_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub kind: Kind,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub category_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub kind: Option<Kind>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub income: KindSummary,
    pub expense: KindSummary,
    pub balance: Decimal,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    income_count: i64,
    income_total: Decimal,
    expense_count: i64,
    expense_total: Decimal,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Summary {
            income: KindSummary { count: row.income_count, total: row.income_total },
            expense: KindSummary { count: row.expense_count, total: row.expense_total },
            balance: row.income_total - row.expense_total,
        }
    }
}

// Client-facing sort names mapped to real columns. Anything else falls
// back to the default ordering instead of reaching the query.
const SORT_COLUMNS: &[(&str, &str)] = &[
    ("date", "t.date"),
    ("amount", "t.amount"),
    ("created_at", "t.created_at"),
    ("description", "t.description"),
];

fn sort_column(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|name| SORT_COLUMNS.iter().find(|(k, _)| *k == name))
        .map(|(_, col)| *col)
        .unwrap_or("t.date")
}

fn sort_direction(requested: Option<&str>) -> &'static str {
    match requested {
        Some(dir) if dir.eq_ignore_ascii_case("asc") => "ASC",
        Some(dir) if dir.eq_ignore_ascii_case("desc") => "DESC",
        _ => "DESC",
    }
}

/// Appends the WHERE clause shared by list/count/summary. `scope` is the
/// ownership filter: non-admin callers always carry their own id here as
/// defense in depth behind the ownership gate.
fn push_filters(
    qb: &mut QueryBuilder<'static, Postgres>,
    scope: Option<Uuid>,
    filters: &TransactionFilters,
) {
    qb.push(" WHERE 1=1");
    if let Some(user_id) = scope {
        qb.push(" AND t.user_id = ").push_bind(user_id);
    }
    if let Some(category_id) = filters.category_id {
        qb.push(" AND t.category_id = ").push_bind(category_id);
    }
    if let Some(kind) = filters.kind {
        qb.push(" AND t.kind = ").push_bind(kind.as_str());
    }
    if let Some(search) = &filters.search {
        qb.push(" AND t.description ILIKE ").push_bind(format!("%{}%", search));
    }
    if let Some(date) = filters.start_date {
        qb.push(" AND t.date >= ").push_bind(date);
    }
    if let Some(date) = filters.end_date {
        qb.push(" AND t.date <= ").push_bind(date);
    }
}

const LIST_SELECT: &str = "SELECT t.id, t.user_id, t.category_id, \
     c.name AS category_name, c.color AS category_color, \
     t.amount, t.description, t.kind, t.date, t.created_at, t.updated_at \
     FROM transactions t JOIN categories c ON c.id = t.category_id";

fn build_list_query(
    scope: Option<Uuid>,
    filters: &TransactionFilters,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(LIST_SELECT);
    push_filters(&mut qb, scope, filters);
    qb.push(" ORDER BY ")
        .push(sort_column(filters.sort_by.as_deref()))
        .push(" ")
        .push(sort_direction(filters.sort_order.as_deref()))
        .push(", t.id DESC");
    qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    qb
}

pub async fn list(
    pool: &PgPool,
    scope: Option<Uuid>,
    filters: &TransactionFilters,
    page: i64,
    limit: i64,
) -> Result<(Vec<TransactionWithCategory>, PageMeta), ApiError> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM transactions t");
    push_filters(&mut count_qb, scope, filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let offset = page_offset(page, limit);
    let rows = build_list_query(scope, filters, limit, offset)
        .build_query_as::<TransactionWithCategory>()
        .fetch_all(pool)
        .await?;

    Ok((rows, PageMeta::new(page, limit, total)))
}

pub async fn get_one(
    pool: &PgPool,
    scope: Option<Uuid>,
    id: Uuid,
) -> Result<TransactionWithCategory, ApiError> {
    let mut qb = QueryBuilder::new(LIST_SELECT);
    qb.push(" WHERE t.id = ").push_bind(id);
    if let Some(user_id) = scope {
        qb.push(" AND t.user_id = ").push_bind(user_id);
    }
    qb.build_query_as::<TransactionWithCategory>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))
}

/// Owning user of a transaction, if it exists. Used by the ownership gate.
pub async fn owner_of(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, ApiError> {
    let owner = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(owner)
}

/// The referenced category must exist and agree on kind; a mismatch is a
/// client error, reported before anything is written.
async fn check_category_kind(
    pool: &PgPool,
    category_id: Uuid,
    kind: Kind,
) -> Result<(), ApiError> {
    let category_kind =
        sqlx::query_scalar::<_, Kind>("SELECT kind FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(pool)
            .await?;

    match category_kind {
        None => {
            let mut errors = HashMap::new();
            errors.insert("category_id".to_string(), "Category does not exist".to_string());
            Err(ApiError::validation("Validation failed", errors))
        }
        Some(category_kind) if category_kind != kind => {
            let mut errors = HashMap::new();
            errors.insert(
                "type".to_string(),
                format!("Transaction type '{}' does not match category type '{}'", kind, category_kind),
            );
            Err(ApiError::validation("Validation failed", errors))
        }
        Some(_) => Ok(()),
    }
}

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    new: &NewTransaction,
) -> Result<Transaction, ApiError> {
    check_category_kind(pool, new.category_id, new.kind).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        "INSERT INTO transactions (user_id, category_id, amount, description, kind, date) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, user_id, category_id, amount, description, kind, date, created_at, updated_at",
    )
    .bind(user_id)
    .bind(new.category_id)
    .bind(new.amount)
    .bind(&new.description)
    .bind(new.kind.as_str())
    .bind(new.date)
    .fetch_one(pool)
    .await?;

    Ok(transaction)
}

/// Re-selects the row under the ownership filter before mutating; a row
/// that exists but belongs to someone else reads as absent (404).
pub async fn update(
    pool: &PgPool,
    scope: Option<Uuid>,
    id: Uuid,
    patch: &TransactionPatch,
) -> Result<Transaction, ApiError> {
    let existing = fetch_scoped(pool, scope, id).await?;

    let category_id = patch.category_id.unwrap_or(existing.category_id);
    let kind = patch.kind.unwrap_or(existing.kind);
    check_category_kind(pool, category_id, kind).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET category_id = $1, amount = $2, description = $3, \
         kind = $4, date = $5, updated_at = now() WHERE id = $6 \
         RETURNING id, user_id, category_id, amount, description, kind, date, created_at, updated_at",
    )
    .bind(category_id)
    .bind(patch.amount.unwrap_or(existing.amount))
    .bind(patch.description.as_deref().unwrap_or(&existing.description))
    .bind(kind.as_str())
    .bind(patch.date.unwrap_or(existing.date))
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(transaction)
}

pub async fn delete(
    pool: &PgPool,
    scope: Option<Uuid>,
    id: Uuid,
) -> Result<Transaction, ApiError> {
    let existing = fetch_scoped(pool, scope, id).await?;

    sqlx::query("DELETE FROM transactions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(existing)
}

async fn fetch_scoped(
    pool: &PgPool,
    scope: Option<Uuid>,
    id: Uuid,
) -> Result<Transaction, ApiError> {
    let mut qb = QueryBuilder::new(
        "SELECT id, user_id, category_id, amount, description, kind, date, created_at, updated_at \
         FROM transactions t WHERE t.id = ",
    );
    qb.push_bind(id);
    if let Some(user_id) = scope {
        qb.push(" AND t.user_id = ").push_bind(user_id);
    }
    qb.build_query_as::<Transaction>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))
}

/// Count and total per kind over an optional date range, plus the balance.
pub async fn summarize(
    pool: &PgPool,
    scope: Option<Uuid>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Summary, ApiError> {
    let filters = TransactionFilters { start_date, end_date, ..Default::default() };
    let mut qb = QueryBuilder::new(
        "SELECT \
         COUNT(*) FILTER (WHERE t.kind = 'income') AS income_count, \
         COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'income'), 0) AS income_total, \
         COUNT(*) FILTER (WHERE t.kind = 'expense') AS expense_count, \
         COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'expense'), 0) AS expense_total \
         FROM transactions t",
    );
    push_filters(&mut qb, scope, &filters);

    let row = qb.build_query_as::<SummaryRow>().fetch_one(pool).await?;
    Ok(row.into())
}
