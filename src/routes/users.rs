//! User route definitions

use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::{deposit, get_user, list_users, withdraw};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/:id", get(get_user))
        .route("/api/users/:id/deposit", patch(deposit))
        .route("/api/users/:id/withdraw", patch(withdraw))
}
