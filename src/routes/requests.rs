//! Active-request route definitions

use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::{
    approve_request, create_request, delete_request, get_request, list_active_requests,
    list_cancelled_requests, my_requests, reject_request, update_request,
};
use crate::state::AppState;

pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/requests",
            get(list_active_requests).post(create_request),
        )
        .route("/api/requests/mine", get(my_requests))
        .route(
            "/api/requests/:id",
            get(get_request).patch(update_request).delete(delete_request),
        )
        .route("/api/requests/:id/approve", patch(approve_request))
        .route("/api/requests/:id/reject", patch(reject_request))
        .route("/api/cancelled", get(list_cancelled_requests))
}
