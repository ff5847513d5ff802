//! Application state shared across handlers

use std::sync::Arc;

use crate::funding::FundingService;
use crate::loans::LoanService;
use crate::requests::RequestService;
use crate::users::UserService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub request_service: Arc<RequestService>,
    pub funding_service: Arc<FundingService>,
    pub loan_service: Arc<LoanService>,
    pub jwt_secret: String,
    pub jwt_token_ttl_seconds: i64,
}
