use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use uuid::Uuid;

use crate::auth::policy;
use crate::database::models::Role;
use crate::error::ApiError;
use crate::state::AppState;

use super::auth::CurrentUser;

/// Ownership gate for `/api/transactions/:id`. Admins bypass it; everyone
/// else gets 404 whether the row is missing or owned by someone else, so
/// existence never leaks across the ownership boundary.
pub async fn transaction_ownership(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if user.role != Role::Admin {
        let owner = crate::database::transactions::owner_of(&state.db, id).await?;
        match owner {
            Some(owner_id) if policy::owns_or_admin(user.role, user.id, owner_id) => {}
            _ => {
                tracing::debug!(user_id = %user.id, transaction_id = %id, "ownership gate miss");
                return Err(ApiError::not_found("Transaction not found"));
            }
        }
    }
    Ok(next.run(request).await)
}
