//! Reference-data handlers

use axum::{extract::State, Json};

use crate::config::ALLOWED_TERMS;
use crate::error::ApiResult;
use crate::models::Purpose;
use crate::state::AppState;

/// Loan purpose categories
pub async fn list_purposes(State(state): State<AppState>) -> ApiResult<Json<Vec<Purpose>>> {
    let purposes = state.request_service.list_purposes().await?;
    Ok(Json(purposes))
}

/// Term lengths the marketplace offers, in months
pub async fn list_terms() -> Json<Vec<i32>> {
    Json(ALLOWED_TERMS.to_vec())
}
