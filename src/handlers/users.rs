//! User account handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::{ensure_admin, ensure_self_or_admin, AuthenticatedUser};
use crate::models::UserResponse;
use crate::state::AppState;
use crate::users::BalanceChangeRequest;

pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    ensure_admin(&caller)?;

    let users = state.user_service.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    ensure_self_or_admin(&caller, user_id)?;

    let user = state.user_service.get_user(user_id).await?;
    Ok(Json(user.into()))
}

/// Add money to an account
pub async fn deposit(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<BalanceChangeRequest>,
) -> ApiResult<Json<UserResponse>> {
    ensure_self_or_admin(&caller, user_id)?;

    let user = state
        .user_service
        .deposit_funds(user_id, payload.amount)
        .await?;
    Ok(Json(user.into()))
}

/// Take money out of an account
pub async fn withdraw(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<BalanceChangeRequest>,
) -> ApiResult<Json<UserResponse>> {
    ensure_self_or_admin(&caller, user_id)?;

    let user = state
        .user_service
        .withdraw_funds(user_id, payload.amount)
        .await?;
    Ok(Json(user.into()))
}
