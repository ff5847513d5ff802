//! Request/response types for user endpoints

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::UserResponse;

/// New-account payload
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30))]
    pub username: String,

    #[validate(length(min = 8))]
    pub password: String,

    #[validate(length(min = 1))]
    pub first_name: String,

    #[validate(length(min = 1))]
    pub last_name: String,

    #[validate(email)]
    pub email: String,

    /// Opening balance; defaults to zero
    pub account_balance: Option<Decimal>,

    pub annual_income: Option<Decimal>,
    pub other_monthly_debt: Option<Decimal>,

    /// Roles requested for the account (borrower / investor / admin)
    #[validate(length(min = 1))]
    pub roles: Vec<String>,
}

/// Credential payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Deposit/withdraw payload
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceChangeRequest {
    pub amount: Decimal,
}

/// Issued-token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserResponse,
}
