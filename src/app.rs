use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::policy::Action;
use crate::cache::Namespace;
use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{
    auth as auth_mw, cache as cache_mw, ownership,
    rate_limit::{rate_limit, RouteClass},
    roles,
};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let api = auth_routes(state.clone())
        .merge(profile_routes(state.clone()))
        .merge(transaction_routes(state.clone()))
        .merge(category_routes(state.clone()))
        .merge(analytics_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        // Every /api route shares the general window on top of its class.
        .layer(from_fn_with_state((state.clone(), RouteClass::General), rate_limit));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(api)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "disconnected" })),
            )
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state((state, RouteClass::Auth), rate_limit))
}

fn profile_routes(state: AppState) -> Router<AppState> {
    let me = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .layer(from_fn_with_state(Action::Read, roles::require));

    // Profile changes are writes; read-only accounts only get to look.
    let profile = Router::new()
        .route("/api/auth/profile", put(handlers::auth::update_profile))
        .layer(from_fn_with_state(Action::Write, roles::require));

    me.merge(profile).layer(from_fn_with_state(state, auth_mw::auth))
}

fn transaction_routes(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/api/transactions", get(handlers::transactions::list))
        .route("/api/transactions/summary", get(handlers::transactions::summary))
        .layer(from_fn_with_state(
            (state.clone(), Namespace::Transactions),
            cache_mw::read_through,
        ))
        .layer(from_fn_with_state(Action::Read, roles::require));

    // Single-row reads are keyed by path id, not query, so they bypass the
    // list cache entirely.
    let read_one = Router::new()
        .route("/api/transactions/:id", get(handlers::transactions::get_one))
        .layer(from_fn_with_state(state.clone(), ownership::transaction_ownership))
        .layer(from_fn_with_state(Action::Read, roles::require));

    let create = Router::new()
        .route("/api/transactions", post(handlers::transactions::create))
        .layer(from_fn_with_state(Action::Write, roles::require));

    let writes_one = Router::new()
        .route(
            "/api/transactions/:id",
            put(handlers::transactions::update).delete(handlers::transactions::delete),
        )
        .layer(from_fn_with_state(state.clone(), ownership::transaction_ownership))
        .layer(from_fn_with_state(Action::Write, roles::require));

    reads
        .merge(read_one)
        .merge(create)
        .merge(writes_one)
        .layer(from_fn_with_state(state.clone(), cache_mw::invalidate_user_on_write))
        .layer(from_fn_with_state(state.clone(), auth_mw::auth))
        .layer(from_fn_with_state((state, RouteClass::Transactions), rate_limit))
}

fn category_routes(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/api/categories", get(handlers::categories::list))
        .layer(from_fn_with_state(
            (state.clone(), Namespace::Categories),
            cache_mw::read_through,
        ))
        .layer(from_fn_with_state(Action::Read, roles::require));

    let writes = Router::new()
        .route("/api/categories", post(handlers::categories::create))
        .route(
            "/api/categories/:id",
            put(handlers::categories::update).delete(handlers::categories::delete),
        )
        .layer(from_fn_with_state(Action::Admin, roles::require));

    reads
        .merge(writes)
        .layer(from_fn_with_state(state.clone(), cache_mw::invalidate_categories_on_write))
        .layer(from_fn_with_state(state, auth_mw::auth))
}

fn analytics_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/analytics/dashboard", get(handlers::analytics::dashboard))
        .route("/api/analytics/trends", get(handlers::analytics::trends))
        .route("/api/analytics/patterns", get(handlers::analytics::patterns))
        .route("/api/analytics/budget", get(handlers::analytics::budget))
        .layer(from_fn_with_state(
            (state.clone(), Namespace::Analytics),
            cache_mw::read_through,
        ))
        .layer(from_fn_with_state(Action::Read, roles::require))
        .layer(from_fn_with_state(state.clone(), auth_mw::auth))
        .layer(from_fn_with_state((state, RouteClass::Analytics), rate_limit))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/users/:id/role", put(handlers::admin::update_role))
        .route("/api/admin/users/:id", delete(handlers::admin::delete_user))
        .layer(from_fn_with_state(state.clone(), cache_mw::invalidate_user_on_write))
        .layer(from_fn_with_state(Action::Admin, roles::require))
        .layer(from_fn_with_state(state, auth_mw::auth))
}
