//! Login endpoints.

use axum::extract::State;

use super::{success, ApiResult, JsonBody};
use crate::auth::verify_password;
use crate::db::members;
use crate::errors::AppError;
use crate::models::{LoginRequest, LoginTokenRequest, TokenResponse};
use crate::AppState;

/// POST /api/auth/login - Exchange NRA and password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<TokenResponse> {
    if request.nra.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "nra and password are required".to_string(),
        ));
    }

    let mut conn = state.repo.pool().acquire().await?;
    let member = members::find_member_by_nra(&mut conn, request.nra.trim()).await?;

    // Unknown NRA, unset password and wrong password look the same to the caller
    let member = match member {
        Some(m)
            if m.password_hash
                .as_deref()
                .is_some_and(|digest| verify_password(digest, &request.password)) =>
        {
            m
        }
        _ => {
            tracing::warn!(nra = %request.nra, "Login failed");
            return Err(AppError::Unauthorized("Invalid NRA or password".to_string()));
        }
    };

    let token = state.tokens.issue_token(&member)?;
    tracing::info!(member = %member.id, "Member logged in");
    success("Login successful", TokenResponse { token })
}

/// POST /api/auth/token - Exchange the single-use registration token for a bearer token.
pub async fn login_with_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginTokenRequest>,
) -> ApiResult<TokenResponse> {
    let login_token = request.token.trim();
    if login_token.is_empty() {
        return Err(AppError::Validation("token is required".to_string()));
    }

    let mut tx = state.repo.begin().await?;
    let member = members::find_member_by_login_token(&mut *tx, login_token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or already used login token".to_string()))?;

    let token = state.tokens.issue_token(&member)?;
    members::set_login_token(&mut *tx, &member.id, None).await?;
    tx.commit().await?;

    tracing::info!(member = %member.id, "Login token redeemed");
    success("Login successful", TokenResponse { token })
}
