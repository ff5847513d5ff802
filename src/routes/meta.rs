//! Reference-data route definitions

use axum::{routing::get, Router};

use crate::handlers::{list_purposes, list_terms};
use crate::state::AppState;

pub fn meta_routes() -> Router<AppState> {
    Router::new()
        .route("/api/purposes", get(list_purposes))
        .route("/api/terms", get(list_terms))
}
