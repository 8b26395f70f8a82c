use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_token, password, Claims};
use crate::database::models::User;
use crate::database::users;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::{valid_email, FieldErrors};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    let claims = Claims::new(user.id, user.role, state.config.security.jwt_expiry_hours as i64);
    generate_token(&claims, &state.config.security.jwt_secret)
        .map_err(|e| ApiError::internal(format!("token generation failed: {e}")))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<AuthPayload> {
    let mut errors = FieldErrors::new();
    if !valid_email(&body.email) {
        errors.add("email", "A valid email address is required");
    }
    if body.password.len() < 8 {
        errors.add("password", "Password must be at least 8 characters");
    }
    if body.name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    errors.into_result()?;

    let hash = password::hash_password(&body.password).map_err(ApiError::internal)?;
    let user = users::create(&state.db, &body.email, &hash, body.name.trim()).await?;
    tracing::info!(user_id = %user.id, "user registered");

    let token = issue_token(&state, &user)?;
    Ok(ApiResponse::created(AuthPayload { token, user }).with_message("Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<AuthPayload> {
    // Validate before touching the database so malformed attempts stay
    // cheap even under the auth rate limit.
    let mut errors = FieldErrors::new();
    if body.email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if body.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()?;

    let user = users::find_by_email(&state.db, &body.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let verified =
        password::verify_password(&body.password, &user.password_hash).unwrap_or(false);
    if !verified {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let token = issue_token(&state, &user)?;
    Ok(ApiResponse::success(AuthPayload { token, user }).with_message("Login successful"))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<User> {
    let user = users::find_by_id(&state.db, current.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ProfileRequest>,
) -> ApiResult<User> {
    let mut errors = FieldErrors::new();
    if let Some(email) = &body.email {
        if !valid_email(email) {
            errors.add("email", "A valid email address is required");
        }
    }
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            errors.add("name", "Name cannot be empty");
        }
    }
    errors.into_result()?;

    let user = users::update_profile(
        &state.db,
        current.id,
        body.name.as_deref().map(str::trim),
        body.email.as_deref(),
    )
    .await?;
    Ok(ApiResponse::success(user).with_message("Profile updated"))
}
