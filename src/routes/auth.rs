//! Auth route definitions

use axum::{routing::post, Router};

use crate::handlers::{issue_token, register};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(issue_token))
}
