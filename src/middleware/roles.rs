use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};

use crate::auth::policy::{self, Action};
use crate::error::ApiError;

use super::auth::CurrentUser;

/// Rejects with 403 when the resolved user's role does not permit the
/// route group's action. Must run after the auth middleware.
pub async fn require(
    State(action): State<Action>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !policy::permits(user.role, action) {
        tracing::debug!(user_id = %user.id, role = %user.role, ?action, "role denied");
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::middleware::{from_fn, from_fn_with_state};
    use axum::routing::put;
    use axum::Router;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn write_gated(role: Role) -> Router {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            role,
        };
        Router::new()
            .route("/profile", put(|| async { "ok" }))
            .layer(from_fn_with_state(Action::Write, require))
            .layer(from_fn(move |mut request: Request, next: Next| {
                let user = user.clone();
                async move {
                    request.extensions_mut().insert(user);
                    next.run(request).await
                }
            }))
    }

    async fn put_profile(app: Router) -> StatusCode {
        let request = HttpRequest::builder()
            .method("PUT")
            .uri("/profile")
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_read_only_role_cannot_write() {
        assert_eq!(put_profile(write_gated(Role::ReadOnly)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_user_and_admin_roles_may_write() {
        assert_eq!(put_profile(write_gated(Role::User)).await, StatusCode::OK);
        assert_eq!(put_profile(write_gated(Role::Admin)).await, StatusCode::OK);
    }
}
