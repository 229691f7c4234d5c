//! Module listing handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{models::ModulesResponse, AppState};

/// GET /modules - Feature modules with their load status
pub async fn list_modules(State(state): State<Arc<AppState>>) -> Json<ModulesResponse> {
    Json(ModulesResponse {
        success: true,
        modules: state.bridge.modules(),
    })
}
