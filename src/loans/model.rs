//! Investment records and installment result types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::requests::model::LoanApplication;

/// An investor's immutable ownership share in a funded loan, written once
/// when the pledge set converts at full funding.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Investment {
    pub loan_id: i64,
    pub investor_id: Uuid,
    pub invested_amt: Decimal,
}

/// One investor's cut of a distributed installment.
#[derive(Debug, Serialize, Clone)]
pub struct InvestorShare {
    pub investor_id: Uuid,
    pub amount: Decimal,
}

/// Outcome of processing one installment.
#[derive(Debug, Serialize)]
pub struct InstallmentReceipt {
    /// The loan as of this payment. For the final installment this is the
    /// state the loan had going into the payment, before archival.
    pub loan: LoanApplication,
    pub interest_paid: Decimal,
    pub principal_paid: Decimal,
    pub distributions: Vec<InvestorShare>,
    pub paid_off: bool,
}
