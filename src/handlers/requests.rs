//! Active-request handlers: submission, underwriting, edits

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{ensure_admin, ensure_role, AuthenticatedUser};
use crate::models::UserRole;
use crate::requests::{
    ApprovalData, CreateRequestPayload, LoanApplication, RequestDetail, UpdateRequestPayload,
};
use crate::state::AppState;

/// All open applications, for the underwriting queue
pub async fn list_active_requests(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    ensure_admin(&caller)?;

    let requests = state.request_service.list_active().await?;
    Ok(Json(requests))
}

/// Submit a loan application
pub async fn create_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(payload): Json<CreateRequestPayload>,
) -> ApiResult<(StatusCode, Json<LoanApplication>)> {
    ensure_role(&caller, UserRole::Borrower)?;

    let request = state
        .request_service
        .create(caller.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's own applications, across all stages
pub async fn my_requests(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    let requests = state
        .request_service
        .list_by_borrower(caller.user_id)
        .await?;
    Ok(Json(requests))
}

pub async fn get_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RequestDetail>> {
    let detail = state.request_service.get_detail(id).await?;

    if detail.borrower_id != caller.user_id && !caller.has_role(UserRole::Admin) {
        return Err(ApiError::Forbidden(
            "Not allowed to view another borrower's application".to_string(),
        ));
    }

    Ok(Json(detail))
}

pub async fn update_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(patch): Json<UpdateRequestPayload>,
) -> ApiResult<Json<LoanApplication>> {
    let detail = state.request_service.get_detail(id).await?;
    if detail.borrower_id != caller.user_id && !caller.has_role(UserRole::Admin) {
        return Err(ApiError::Forbidden(
            "Not allowed to edit another borrower's application".to_string(),
        ));
    }

    let updated = state.request_service.update(id, patch).await?;
    Ok(Json(updated))
}

pub async fn delete_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let detail = state.request_service.get_detail(id).await?;
    if detail.borrower_id != caller.user_id && !caller.has_role(UserRole::Admin) {
        return Err(ApiError::Forbidden(
            "Not allowed to delete another borrower's application".to_string(),
        ));
    }

    state.request_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Approve an application with a rate, amount, and term
pub async fn approve_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(data): Json<ApprovalData>,
) -> ApiResult<Json<LoanApplication>> {
    ensure_admin(&caller)?;

    let approved = state.request_service.approve(id, data).await?;
    Ok(Json(approved))
}

/// Turn down an application
pub async fn reject_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LoanApplication>> {
    ensure_admin(&caller)?;

    let rejected = state.request_service.reject(id).await?;
    Ok(Json(rejected))
}

/// Applications that left the pipeline, for reporting
pub async fn list_cancelled_requests(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    ensure_admin(&caller)?;

    let requests = state.request_service.list_cancelled().await?;
    Ok(Json(requests))
}
