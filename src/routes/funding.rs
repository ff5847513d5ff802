//! Approved-request route definitions

use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::{
    cancel_request, enable_funding, fund_request, get_approved_request, list_approved_requests,
    list_available_requests, list_pledges, my_positions,
};
use crate::state::AppState;

pub fn funding_routes() -> Router<AppState> {
    Router::new()
        .route("/api/approved", get(list_approved_requests))
        .route("/api/approved/available", get(list_available_requests))
        .route("/api/approved/positions", get(my_positions))
        .route("/api/approved/:id", get(get_approved_request))
        .route("/api/approved/:id/pledges", get(list_pledges))
        .route("/api/approved/:id/enablefunding", patch(enable_funding))
        .route("/api/approved/:id/fund", patch(fund_request))
        .route("/api/approved/:id/cancel", patch(cancel_request))
}
