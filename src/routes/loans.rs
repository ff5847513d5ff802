//! Funded-loan route definitions

use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::{
    get_funded_loan, list_funded_loans, list_loan_investments, list_paid_off_loans, my_investments,
    my_loans, pay_installment, payoff_loan,
};
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", get(list_funded_loans))
        .route("/api/loans/paidoff", get(list_paid_off_loans))
        .route("/api/loans/mine", get(my_loans))
        .route("/api/loans/investments", get(my_investments))
        .route("/api/loans/:id", get(get_funded_loan))
        .route("/api/loans/:id/investments", get(list_loan_investments))
        .route("/api/loans/:id/payinstallment", patch(pay_installment))
        .route("/api/loans/:id/payoff", patch(payoff_loan))
}
