//! Pledge records and funding request types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An investor's committed money against an approved request. Accumulates
/// across repeat funding calls by the same investor; dissolved either
/// into investments at full funding or back to the investor on
/// cancellation.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Pledge {
    pub request_id: i64,
    pub investor_id: Uuid,
    pub pledged_amt: Decimal,
}

/// Funding payload
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FundPayload {
    pub amount: Decimal,
}

/// A pledge joined with the request it backs, for the investor's
/// portfolio view.
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct InvestorPosition {
    pub request_id: i64,
    pub pledged_amt: Decimal,
    pub amt_approved: Decimal,
    pub amt_funded: Decimal,
    pub interest_rate: Decimal,
    pub term_months: i32,
}
