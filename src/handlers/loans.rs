//! Funded-loan handlers: installments and payoff

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{ApiError, ApiResult};
use crate::loans::{InstallmentReceipt, Investment};
use crate::middleware::{ensure_admin, AuthenticatedUser};
use crate::models::UserRole;
use crate::requests::LoanApplication;
use crate::state::AppState;

pub async fn list_funded_loans(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    ensure_admin(&caller)?;

    let loans = state.loan_service.list_funded().await?;
    Ok(Json(loans))
}

pub async fn get_funded_loan(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LoanApplication>> {
    let loan = state.loan_service.get_funded(id).await?;
    Ok(Json(loan))
}

/// The caller's loans as a borrower
pub async fn my_loans(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    let loans = state
        .loan_service
        .funded_by_borrower(caller.user_id)
        .await?;
    Ok(Json(loans))
}

/// The caller's loans as an investor
pub async fn my_investments(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    let loans = state
        .loan_service
        .funded_by_investor(caller.user_id)
        .await?;
    Ok(Json(loans))
}

pub async fn list_loan_investments(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Investment>>> {
    ensure_admin(&caller)?;

    let investments = state.loan_service.investments_for_loan(id).await?;
    Ok(Json(investments))
}

/// Pay one scheduled installment on a loan
pub async fn pay_installment(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<InstallmentReceipt>> {
    let loan = state.loan_service.get_funded(id).await?;
    if loan.borrower_id != caller.user_id && !caller.has_role(UserRole::Admin) {
        return Err(ApiError::Forbidden(
            "Only the borrower can pay an installment".to_string(),
        ));
    }

    let receipt = state.loan_service.pay_installment(id).await?;
    Ok(Json(receipt))
}

/// Archive a loan to the paid-off stage
pub async fn payoff_loan(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LoanApplication>> {
    ensure_admin(&caller)?;

    let archived = state.loan_service.payoff_loan(id).await?;
    Ok(Json(archived))
}

pub async fn list_paid_off_loans(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Vec<LoanApplication>>> {
    ensure_admin(&caller)?;

    let loans = state.loan_service.list_paid_off().await?;
    Ok(Json(loans))
}
