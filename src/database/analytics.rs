use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;

use super::models::Kind;
use super::transactions::{self, Summary};

/// Date window selector, computed relative to the current date at request
/// time. Calendar-anchored: `month` starts on the 1st, `quarter` on the
/// first month of the quarter, `year` on Jan 1; `week` is the trailing 7
/// days including today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw {
            None => Ok(Period::Month),
            Some("week") => Ok(Period::Week),
            Some("month") => Ok(Period::Month),
            Some("quarter") => Ok(Period::Quarter),
            Some("year") => Ok(Period::Year),
            Some(other) => {
                let mut errors = HashMap::new();
                errors.insert(
                    "period".to_string(),
                    format!("'{}' is not one of week, month, quarter, year", other),
                );
                Err(ApiError::validation("Validation failed", errors))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }

    /// Inclusive `[start, today]` window.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self {
            Period::Week => today - Duration::days(6),
            Period::Month => today.with_day(1).expect("day 1 is valid"),
            Period::Quarter => {
                let quarter_month = ((today.month() - 1) / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(today.year(), quarter_month, 1)
                    .expect("quarter start is valid")
            }
            Period::Year => {
                NaiveDate::from_ymd_opt(today.year(), 1, 1).expect("year start is valid")
            }
        };
        (start, today)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// Months as a flat index so trailing windows can be computed without
// calendar edge cases.
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn month_start(index: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(index.div_euclid(12), (index.rem_euclid(12) + 1) as u32, 1)
        .expect("month start is valid")
}

fn month_key(index: i32) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

fn percentage_of(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    let pct = (part / whole * Decimal::from(100)).to_f64().unwrap_or(0.0);
    (pct * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Dashboard

#[derive(Debug, sqlx::FromRow)]
struct BreakdownRow {
    category_id: Uuid,
    name: String,
    color: String,
    kind: Kind,
    count: i64,
    total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CategoryBreakdown {
    pub category_id: Uuid,
    pub name: String,
    pub color: String,
    pub kind: Kind,
    pub count: i64,
    pub total: Decimal,
    /// Share of this category within its kind's window total, in percent.
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub period: &'static str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: Summary,
    pub categories: Vec<CategoryBreakdown>,
}

fn apply_shares(
    rows: Vec<BreakdownRow>,
    income_total: Decimal,
    expense_total: Decimal,
) -> Vec<CategoryBreakdown> {
    rows.into_iter()
        .map(|row| {
            let kind_total = match row.kind {
                Kind::Income => income_total,
                Kind::Expense => expense_total,
            };
            CategoryBreakdown {
                percentage: percentage_of(row.total, kind_total),
                category_id: row.category_id,
                name: row.name,
                color: row.color,
                kind: row.kind,
                count: row.count,
                total: row.total,
            }
        })
        .collect()
}

pub async fn dashboard(
    pool: &PgPool,
    user_id: Uuid,
    period: Period,
) -> Result<Dashboard, ApiError> {
    let (start, end) = period.window(today());
    let summary = transactions::summarize(pool, Some(user_id), Some(start), Some(end)).await?;

    let rows = sqlx::query_as::<_, BreakdownRow>(
        "SELECT c.id AS category_id, c.name, c.color, t.kind, \
         COUNT(*) AS count, COALESCE(SUM(t.amount), 0) AS total \
         FROM transactions t JOIN categories c ON c.id = t.category_id \
         WHERE t.user_id = $1 AND t.date >= $2 AND t.date <= $3 \
         GROUP BY c.id, c.name, c.color, t.kind \
         ORDER BY total DESC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let categories = apply_shares(rows, summary.income.total, summary.expense.total);

    Ok(Dashboard {
        period: period.as_str(),
        start_date: start,
        end_date: end,
        summary,
        categories,
    })
}

// ---------------------------------------------------------------------------
// Trends

#[derive(Debug, sqlx::FromRow)]
struct MonthRow {
    month: String,
    income: Decimal,
    expense: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TrendPoint {
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

pub fn clamp_months(months: Option<i64>) -> i64 {
    months.unwrap_or(12).clamp(1, 24)
}

/// Builds a contiguous chronological series ending at the current month.
/// Months without transactions appear as zeros so the chart axis never
/// has holes.
fn zero_filled_series(end: NaiveDate, months: i64, rows: Vec<MonthRow>) -> Vec<TrendPoint> {
    let by_month: HashMap<String, (Decimal, Decimal)> = rows
        .into_iter()
        .map(|r| (r.month, (r.income, r.expense)))
        .collect();

    let end_index = month_index(end);
    (0..months)
        .map(|i| {
            let key = month_key(end_index - (months - 1 - i) as i32);
            let (income, expense) = by_month.get(&key).copied().unwrap_or((Decimal::ZERO, Decimal::ZERO));
            TrendPoint { month: key, income, expense, balance: income - expense }
        })
        .collect()
}

pub async fn trends(
    pool: &PgPool,
    user_id: Uuid,
    months: i64,
) -> Result<Vec<TrendPoint>, ApiError> {
    let now = today();
    let start = month_start(month_index(now) - (months - 1) as i32);

    let rows = sqlx::query_as::<_, MonthRow>(
        "SELECT to_char(date_trunc('month', t.date), 'YYYY-MM') AS month, \
         COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'income'), 0) AS income, \
         COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'expense'), 0) AS expense \
         FROM transactions t WHERE t.user_id = $1 AND t.date >= $2 \
         GROUP BY 1 ORDER BY 1",
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(pool)
    .await?;

    Ok(zero_filled_series(now, months, rows))
}

// ---------------------------------------------------------------------------
// Patterns

const WEEKDAY_NAMES: [&str; 7] =
    ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

#[derive(Debug, sqlx::FromRow)]
struct BucketRow {
    bucket: i32,
    count: i64,
    total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WeekdayBucket {
    pub weekday: u32,
    pub name: &'static str,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct HourBucket {
    pub hour: u32,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Patterns {
    pub period: &'static str,
    pub by_weekday: Vec<WeekdayBucket>,
    pub by_hour: Vec<HourBucket>,
    pub summary: Summary,
}

/// All 7 weekdays are always present, zero-filled. Postgres DOW numbering:
/// 0 = Sunday.
fn zero_filled_weekdays(rows: &[BucketRow]) -> Vec<WeekdayBucket> {
    (0..7u32)
        .map(|weekday| {
            let row = rows.iter().find(|r| r.bucket == weekday as i32);
            WeekdayBucket {
                weekday,
                name: WEEKDAY_NAMES[weekday as usize],
                count: row.map(|r| r.count).unwrap_or(0),
                total: row.map(|r| r.total).unwrap_or(Decimal::ZERO),
            }
        })
        .collect()
}

fn zero_filled_hours(rows: &[BucketRow]) -> Vec<HourBucket> {
    (0..24u32)
        .map(|hour| {
            let row = rows.iter().find(|r| r.bucket == hour as i32);
            HourBucket {
                hour,
                count: row.map(|r| r.count).unwrap_or(0),
                total: row.map(|r| r.total).unwrap_or(Decimal::ZERO),
            }
        })
        .collect()
}

pub async fn patterns(
    pool: &PgPool,
    user_id: Uuid,
    period: Period,
) -> Result<Patterns, ApiError> {
    let (start, end) = period.window(today());

    let weekday_rows = sqlx::query_as::<_, BucketRow>(
        "SELECT EXTRACT(DOW FROM t.date)::int AS bucket, COUNT(*) AS count, \
         COALESCE(SUM(t.amount), 0) AS total \
         FROM transactions t WHERE t.user_id = $1 AND t.date >= $2 AND t.date <= $3 \
         GROUP BY 1",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    // Transaction dates carry no time of day; the entry timestamp does.
    let hour_rows = sqlx::query_as::<_, BucketRow>(
        "SELECT EXTRACT(HOUR FROM t.created_at)::int AS bucket, COUNT(*) AS count, \
         COALESCE(SUM(t.amount), 0) AS total \
         FROM transactions t WHERE t.user_id = $1 AND t.date >= $2 AND t.date <= $3 \
         GROUP BY 1",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let summary = transactions::summarize(pool, Some(user_id), Some(start), Some(end)).await?;

    Ok(Patterns {
        period: period.as_str(),
        by_weekday: zero_filled_weekdays(&weekday_rows),
        by_hour: zero_filled_hours(&hour_rows),
        summary,
    })
}

// ---------------------------------------------------------------------------
// Budget

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetState {
    Good,
    Warning,
    Over,
}

/// `good` under 80%, `warning` from 80 to 100, `over` above 100.
pub fn budget_state(percentage: f64) -> BudgetState {
    if percentage < 80.0 {
        BudgetState::Good
    } else if percentage <= 100.0 {
        BudgetState::Warning
    } else {
        BudgetState::Over
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BudgetRow {
    category_id: Uuid,
    name: String,
    color: String,
    spent: Decimal,
    history_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BudgetEntry {
    pub category_id: Uuid,
    pub name: String,
    pub color: String,
    pub spent: Decimal,
    pub monthly_average: Decimal,
    pub percentage: f64,
    pub status: BudgetState,
}

fn budget_entry(row: BudgetRow) -> BudgetEntry {
    let monthly_average = (row.history_total / Decimal::from(12)).round_dp(2);
    let percentage = percentage_of(row.spent, monthly_average);
    BudgetEntry {
        status: budget_state(percentage),
        percentage,
        category_id: row.category_id,
        name: row.name,
        color: row.color,
        spent: row.spent,
        monthly_average,
    }
}

/// Current-window spend per expense category against the trailing
/// 12-month monthly average for that category.
pub async fn budget(
    pool: &PgPool,
    user_id: Uuid,
    period: Period,
) -> Result<Vec<BudgetEntry>, ApiError> {
    let (start, end) = period.window(today());
    let history_start = month_start(month_index(start) - 12);

    let rows = sqlx::query_as::<_, BudgetRow>(
        "SELECT c.id AS category_id, c.name, c.color, \
         COALESCE(SUM(t.amount) FILTER (WHERE t.date >= $2 AND t.date <= $3), 0) AS spent, \
         COALESCE(SUM(t.amount) FILTER (WHERE t.date >= $4 AND t.date < $2), 0) AS history_total \
         FROM categories c \
         LEFT JOIN transactions t ON t.category_id = c.id \
             AND t.user_id = $1 AND t.kind = 'expense' AND t.date >= $4 \
         WHERE c.kind = 'expense' \
         GROUP BY c.id, c.name, c.color \
         ORDER BY c.name",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .bind(history_start)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(budget_entry).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(Period::parse(None).unwrap(), Period::Month);
        assert_eq!(Period::parse(Some("week")).unwrap(), Period::Week);
        assert_eq!(Period::parse(Some("year")).unwrap(), Period::Year);
        assert!(Period::parse(Some("decade")).is_err());
    }

    #[test]
    fn test_window_anchors() {
        let today = date(2024, 5, 17);
        assert_eq!(Period::Week.window(today).0, date(2024, 5, 11));
        assert_eq!(Period::Month.window(today).0, date(2024, 5, 1));
        assert_eq!(Period::Quarter.window(today).0, date(2024, 4, 1));
        assert_eq!(Period::Year.window(today).0, date(2024, 1, 1));
        assert_eq!(Period::Month.window(today).1, today);
    }

    #[test]
    fn test_months_clamping() {
        assert_eq!(clamp_months(None), 12);
        assert_eq!(clamp_months(Some(0)), 1);
        assert_eq!(clamp_months(Some(99)), 24);
        assert_eq!(clamp_months(Some(3)), 3);
    }

    #[test]
    fn test_trend_series_is_contiguous_and_zero_filled() {
        let rows = vec![MonthRow {
            month: "2024-02".to_string(),
            income: Decimal::new(500, 0),
            expense: Decimal::new(200, 0),
        }];
        let series = zero_filled_series(date(2024, 3, 15), 3, rows);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].month, "2024-01");
        assert_eq!(series[0].income, Decimal::ZERO);
        assert_eq!(series[1].month, "2024-02");
        assert_eq!(series[1].balance, Decimal::new(300, 0));
        assert_eq!(series[2].month, "2024-03");
    }

    #[test]
    fn test_trend_series_crosses_year_boundary() {
        let series = zero_filled_series(date(2024, 1, 10), 3, vec![]);
        let months: Vec<&str> = series.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01"]);
    }

    #[test]
    fn test_weekday_buckets_always_complete() {
        let rows = vec![BucketRow { bucket: 5, count: 2, total: Decimal::new(40, 0) }];
        let buckets = zero_filled_weekdays(&rows);
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].name, "Sunday");
        assert_eq!(buckets[5].count, 2);
        assert_eq!(buckets[6].count, 0);
    }

    #[test]
    fn test_hour_buckets_always_complete() {
        let buckets = zero_filled_hours(&[]);
        assert_eq!(buckets.len(), 24);
        assert!(buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_share_division_by_zero_is_zero() {
        assert_eq!(percentage_of(Decimal::new(10, 0), Decimal::ZERO), 0.0);
        assert_eq!(percentage_of(Decimal::new(25, 0), Decimal::new(100, 0)), 25.0);
    }

    #[test]
    fn test_budget_state_boundaries() {
        assert_eq!(budget_state(79.99), BudgetState::Good);
        assert_eq!(budget_state(80.0), BudgetState::Warning);
        assert_eq!(budget_state(100.0), BudgetState::Warning);
        assert_eq!(budget_state(100.01), BudgetState::Over);
    }

    #[test]
    fn test_budget_entry_without_history() {
        let entry = budget_entry(BudgetRow {
            category_id: Uuid::new_v4(),
            name: "Groceries".to_string(),
            color: "#00aa00".to_string(),
            spent: Decimal::ZERO,
            history_total: Decimal::ZERO,
        });
        assert_eq!(entry.percentage, 0.0);
        assert_eq!(entry.status, BudgetState::Good);
    }

    #[test]
    fn test_budget_entry_over_average() {
        let entry = budget_entry(BudgetRow {
            category_id: Uuid::new_v4(),
            name: "Dining".to_string(),
            color: "#aa0000".to_string(),
            spent: Decimal::new(300, 0),
            history_total: Decimal::new(2400, 0), // avg 200/month
        });
        assert_eq!(entry.monthly_average, Decimal::new(200, 0));
        assert_eq!(entry.percentage, 150.0);
        assert_eq!(entry.status, BudgetState::Over);
    }
}
