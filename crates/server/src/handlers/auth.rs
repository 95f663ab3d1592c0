//! Account and token handlers

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::middleware::AuthUser;
use crate::AppState;
use scoutdeck_common::{
    auth::{hash_password, verify_password},
    errors::{AppError, Result},
    models::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RegisterRequest, User},
};

/// Create an account and log it in
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>)> {
    request.validate()?;

    let password_hash = hash_password(&request.password)?;
    let user = state.store.create_user(&request, password_hash).await?;
    let tokens = state.jwt.issue_pair(&user)?;

    tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(LoginResponse { tokens, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    request.validate()?;

    let (user, password_hash) = state
        .store
        .credentials(&request.username)
        .await
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&request.password, &password_hash) {
        tracing::warn!(username = %request.username, "Failed login attempt");
        return Err(AppError::InvalidCredentials);
    }

    let tokens = state.jwt.issue_pair(&user)?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(LoginResponse { tokens, user }))
}

/// Exchange a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let access = state.jwt.refresh_access(&request.refresh)?;
    Ok(Json(RefreshResponse { access }))
}

pub async fn current_user(State(state): State<AppState>, auth: AuthUser) -> Result<Json<User>> {
    state
        .store
        .user(auth.id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized {
            message: "User no longer exists".to_string(),
        })
}
