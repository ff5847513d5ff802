//! Approved-request handlers: funding and cancellation

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{ApiError, ApiResult};
use crate::funding::{FundPayload, InvestorPosition, Pledge};
use crate::middleware::{ensure_admin, ensure_role, AuthenticatedUser};
use crate::models::UserRole;
use crate::requests::{CancelPayload, LoanApplication};
use crate::state::AppState;

pub async fn list_approved_requests(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    ensure_admin(&caller)?;

    let requests = state.funding_service.list_approved().await?;
    Ok(Json(requests))
}

/// Requests currently open for investment
pub async fn list_available_requests(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    let requests = state.funding_service.list_available().await?;
    Ok(Json(requests))
}

pub async fn get_approved_request(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LoanApplication>> {
    let request = state.funding_service.get_approved(id).await?;
    Ok(Json(request))
}

/// The caller's open pledges
pub async fn my_positions(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<InvestorPosition>>> {
    let positions = state
        .funding_service
        .positions_for_investor(caller.user_id)
        .await?;
    Ok(Json(positions))
}

pub async fn list_pledges(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Pledge>>> {
    ensure_admin(&caller)?;

    let pledges = state.funding_service.pledges_for_request(id).await?;
    Ok(Json(pledges))
}

/// Open an approved request to investors
pub async fn enable_funding(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LoanApplication>> {
    ensure_admin(&caller)?;

    let request = state.funding_service.enable_funding(id).await?;
    Ok(Json(request))
}

/// Pledge money toward an approved request
pub async fn fund_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<FundPayload>,
) -> ApiResult<Json<LoanApplication>> {
    ensure_role(&caller, UserRole::Investor)?;

    let request = state
        .funding_service
        .fund(id, caller.user_id, payload.amount)
        .await?;
    Ok(Json(request))
}

/// Withdraw an approved request before full funding
pub async fn cancel_request(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<CancelPayload>,
) -> ApiResult<Json<LoanApplication>> {
    let request = state.funding_service.get_approved(id).await?;
    if request.borrower_id != caller.user_id && !caller.has_role(UserRole::Admin) {
        return Err(ApiError::Forbidden(
            "Not allowed to cancel another borrower's application".to_string(),
        ));
    }

    let cancelled = state.request_service.cancel(id, payload.reason).await?;
    Ok(Json(cancelled))
}
