//! Registration and token issuance handlers

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::auth::generate_token;
use crate::error::{ApiError, ApiResult};
use crate::models::UserResponse;
use crate::state::AppState;
use crate::users::{LoginRequest, RegisterRequest, TokenResponse};

/// Create a new account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    payload.validate()?;

    let user = state.user_service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchange credentials for a bearer token
pub async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    payload.validate()?;

    let user = state
        .user_service
        .authenticate(&payload.username, &payload.password)
        .await?;

    let token = generate_token(&user, &state.jwt_secret, state.jwt_token_ttl_seconds)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(TokenResponse {
        token,
        user: user.into(),
    }))
}
