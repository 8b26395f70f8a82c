use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{cache_key, global_prefix, user_prefix, Namespace};
use crate::state::AppState;

use super::auth::CurrentUser;

/// Response extension naming the user whose cached reads a mutation made
/// stale. Set by handlers when an admin acts on another user's data;
/// otherwise invalidation falls back to the acting user.
#[derive(Clone, Copy, Debug)]
pub struct TouchedUser(pub Uuid);

/// Attaches a [`TouchedUser`] marker to a handler response.
pub fn touching(user_id: Uuid, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    response.extensions_mut().insert(TouchedUser(user_id));
    response
}

fn ttl_for(state: &AppState, ns: Namespace) -> Duration {
    let secs = match ns {
        Namespace::Analytics => state.config.cache.analytics_ttl_secs,
        Namespace::Categories => state.config.cache.categories_ttl_secs,
        Namespace::Transactions => state.config.cache.transactions_ttl_secs,
    };
    Duration::from_secs(secs)
}

/// Read-through cache for GET routes. On a hit the stored payload is
/// returned verbatim and the handler never runs; on a miss the handler's
/// successful response body is stored under the namespace TTL. Population
/// is best-effort and never fails the request.
pub async fn read_through(
    State((state, ns)): State<(AppState, Namespace)>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    // Category listings are shared; everything else is per-user.
    let scope = match ns {
        Namespace::Categories => None,
        _ => match request.extensions().get::<CurrentUser>() {
            Some(user) => Some(user.id),
            // No resolved user means no stable key; skip caching.
            None => return next.run(request).await,
        },
    };

    let key = cache_key(
        ns,
        scope,
        request.uri().path(),
        request.uri().query().unwrap_or(""),
    );
    if let Some(body) = state.cache.get(&key).await {
        tracing::debug!(key = %key, "cache hit");
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            state.cache.set(&key, bytes.to_vec(), ttl_for(&state, ns)).await;
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            // The body is already consumed; nothing left to forward.
            tracing::warn!(key = %key, error = %e, "failed to buffer response for caching");
            crate::error::ApiError::internal(e).into_response()
        }
    }
}

fn is_mutation(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Invalidates transaction-list and analytics entries after a successful
/// mutation — for the acting user and, when a handler tagged the response
/// with [`TouchedUser`], for that user as well. Both matter: an admin's
/// cached list view includes other users' rows, so mutating on someone's
/// behalf stales the admin's own entries too. Best-effort: the response
/// is already committed and invalidation failures only extend staleness.
pub async fn invalidate_user_on_write(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let actor = request.extensions().get::<CurrentUser>().cloned();
    let response = next.run(request).await;

    if !is_mutation(&method) || !response.status().is_success() {
        return response;
    }

    let mut stale = Vec::new();
    if let Some(actor) = actor {
        stale.push(actor.id);
    }
    if let Some(TouchedUser(touched)) = response.extensions().get::<TouchedUser>() {
        if !stale.contains(touched) {
            stale.push(*touched);
        }
    }

    for user_id in stale {
        state.cache.invalidate_prefix(&user_prefix(Namespace::Transactions, user_id)).await;
        state.cache.invalidate_prefix(&user_prefix(Namespace::Analytics, user_id)).await;
    }

    response
}

/// Clears the shared category listing after a successful category mutation.
pub async fn invalidate_categories_on_write(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;

    if is_mutation(&method) && response.status().is_success() {
        state.cache.invalidate_prefix(&global_prefix(Namespace::Categories)).await;
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::cache_key;
    use crate::config::AppConfig;
    use crate::database::models::Role;
    use crate::state::AppState;
    use axum::middleware::{from_fn, from_fn_with_state};
    use axum::routing::put;
    use axum::Router;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn list_key(user: Uuid) -> String {
        cache_key(Namespace::Transactions, Some(user), "/api/transactions", "page=1")
    }

    async fn seed(state: &AppState, key: &str, body: &[u8]) {
        state.cache.set(key, body.to_vec(), Duration::from_secs(60)).await;
    }

    #[tokio::test]
    async fn test_admin_mutation_clears_actor_and_owner_views() {
        let state = AppState::fake(AppConfig::test());
        let admin_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();

        let admin_key = list_key(admin_id);
        let owner_key = list_key(owner_id);
        seed(&state, &admin_key, b"admin-view").await;
        seed(&state, &owner_key, b"owner-view").await;

        let admin = CurrentUser {
            id: admin_id,
            email: "admin@example.com".to_string(),
            name: "Admin".to_string(),
            role: Role::Admin,
        };
        let app = Router::new()
            .route(
                "/api/transactions/:id",
                put(move || async move { touching(owner_id, StatusCode::OK) }),
            )
            .layer(from_fn_with_state(state.clone(), invalidate_user_on_write))
            .layer(from_fn(move |mut request: Request, next: Next| {
                let admin = admin.clone();
                async move {
                    request.extensions_mut().insert(admin);
                    next.run(request).await
                }
            }));

        let request = Request::builder()
            .method("PUT")
            .uri("/api/transactions/abc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(state.cache.get(&owner_key).await, None);
        assert_eq!(state.cache.get(&admin_key).await, None);
    }

    #[tokio::test]
    async fn test_self_mutation_clears_own_view() {
        let state = AppState::fake(AppConfig::test());
        let user_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        let own_key = list_key(user_id);
        let other_key = list_key(other_id);
        seed(&state, &own_key, b"mine").await;
        seed(&state, &other_key, b"theirs").await;

        let user = CurrentUser {
            id: user_id,
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            role: Role::User,
        };
        let app = Router::new()
            .route("/api/transactions/:id", put(|| async { StatusCode::OK }))
            .layer(from_fn_with_state(state.clone(), invalidate_user_on_write))
            .layer(from_fn(move |mut request: Request, next: Next| {
                let user = user.clone();
                async move {
                    request.extensions_mut().insert(user);
                    next.run(request).await
                }
            }));

        let request = Request::builder()
            .method("PUT")
            .uri("/api/transactions/abc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(state.cache.get(&own_key).await, None);
        assert_eq!(state.cache.get(&other_key).await, Some(b"theirs".to_vec()));
    }
}
