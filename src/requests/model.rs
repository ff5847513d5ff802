//! Loan-application records and request/response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::{AppStage, CancellationReason};

/// One loan application, across its whole lifecycle. A single row holds the
/// record from submission to payoff or cancellation; the `stage` tag says
/// which fields are currently meaningful.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LoanApplication {
    pub id: i64,
    pub stage: AppStage,
    pub borrower_id: Uuid,
    pub purpose_id: i32,
    pub amt_requested: Decimal,
    pub amt_approved: Option<Decimal>,
    pub amt_funded: Decimal,
    /// Annual rate as a fraction (0.085 = 8.5%)
    pub interest_rate: Decimal,
    pub term_months: i32,
    pub installment_amt: Decimal,
    pub remaining_balance: Option<Decimal>,
    pub app_open_date: DateTime<Utc>,
    pub app_approved_date: Option<DateTime<Utc>>,
    pub funding_deadline: Option<DateTime<Utc>>,
    pub funded_date: Option<DateTime<Utc>>,
    pub paidoff_date: Option<DateTime<Utc>>,
    pub app_cancelled_date: Option<DateTime<Utc>>,
    pub available_for_funding: bool,
    pub is_funded: bool,
    pub was_approved: Option<bool>,
    pub reason: Option<CancellationReason>,
}

/// Application joined with the borrower's financial profile, for the
/// underwriting view.
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct RequestDetail {
    pub id: i64,
    pub stage: AppStage,
    pub borrower_id: Uuid,
    pub borrower_username: String,
    pub annual_income: Option<Decimal>,
    pub other_monthly_debt: Option<Decimal>,
    pub purpose_id: i32,
    pub purpose_title: String,
    pub amt_requested: Decimal,
    pub amt_approved: Option<Decimal>,
    pub amt_funded: Decimal,
    pub interest_rate: Decimal,
    pub term_months: i32,
    pub installment_amt: Decimal,
    pub app_open_date: DateTime<Utc>,
    pub funding_deadline: Option<DateTime<Utc>>,
}

/// New-application payload
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateRequestPayload {
    pub amt_requested: Decimal,
    pub purpose_id: i32,
    pub term_months: i32,
}

/// Underwriting decision. All three fields must be present; the service
/// validates the domains before any write.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovalData {
    pub interest_rate: Option<Decimal>,
    pub amt_approved: Option<Decimal>,
    pub term_months: Option<i32>,
}

/// Partial update to an application. Which fields may change depends on
/// the stage; anything outside this set is rejected at the boundary.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequestPayload {
    pub amt_requested: Option<Decimal>,
    pub purpose_id: Option<i32>,
    pub interest_rate: Option<Decimal>,
    pub term_months: Option<i32>,
}

impl UpdateRequestPayload {
    pub fn is_empty(&self) -> bool {
        self.amt_requested.is_none()
            && self.purpose_id.is_none()
            && self.interest_rate.is_none()
            && self.term_months.is_none()
    }
}

/// Cancellation payload
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelPayload {
    pub reason: CancellationReason,
}
