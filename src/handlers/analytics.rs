use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::analytics::{self, clamp_months, Dashboard, Patterns, Period};
use crate::database::models::Role;
use crate::middleware::auth::CurrentUser;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
    pub months: Option<i64>,
    /// Admin-only scope override; silently ignored for everyone else.
    pub user_id: Option<Uuid>,
}

fn target_user(user: &CurrentUser, requested: Option<Uuid>) -> Uuid {
    match (user.role, requested) {
        (Role::Admin, Some(id)) => id,
        _ => user.id,
    }
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Dashboard> {
    let period = Period::parse(query.period.as_deref())?;
    let target = target_user(&user, query.user_id);
    let dashboard = analytics::dashboard(&state.db, target, period).await?;
    Ok(ApiResponse::success(dashboard))
}

pub async fn trends(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<serde_json::Value> {
    let months = clamp_months(query.months);
    let target = target_user(&user, query.user_id);
    let series = analytics::trends(&state.db, target, months).await?;
    Ok(ApiResponse::success(serde_json::json!({
        "months": months,
        "trends": series,
    })))
}

pub async fn patterns(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Patterns> {
    let period = Period::parse(query.period.as_deref())?;
    let target = target_user(&user, query.user_id);
    let patterns = analytics::patterns(&state.db, target, period).await?;
    Ok(ApiResponse::success(patterns))
}

pub async fn budget(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<serde_json::Value> {
    let period = Period::parse(query.period.as_deref())?;
    let target = target_user(&user, query.user_id);
    let entries = analytics::budget(&state.db, target, period).await?;
    Ok(ApiResponse::success(serde_json::json!({
        "period": period.as_str(),
        "budget": entries,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            role,
        }
    }

    #[test]
    fn test_admin_can_target_another_user() {
        let admin = current(Role::Admin);
        let other = Uuid::new_v4();
        assert_eq!(target_user(&admin, Some(other)), other);
        assert_eq!(target_user(&admin, None), admin.id);
    }

    #[test]
    fn test_non_admin_is_pinned_to_self() {
        let user = current(Role::User);
        let other = Uuid::new_v4();
        assert_eq!(target_user(&user, Some(other)), user.id);
        let reader = current(Role::ReadOnly);
        assert_eq!(target_user(&reader, Some(other)), reader.id);
    }
}
