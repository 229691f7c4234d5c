//! Preset endpoint handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    models::{
        api_error, ApiError, PresetListResponse, PresetLoadRequest, PresetLoadResponse,
        PresetQuery, PresetRequest, PresetResponse,
    },
    AppState,
};

/// GET /presets?comp_path= - List presets, optionally for one component
pub async fn list_presets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PresetQuery>,
) -> Result<Json<PresetListResponse>, ApiError> {
    let presets = state
        .bridge
        .presets
        .list(query.comp_path.as_deref())
        .map_err(api_error)?;
    Ok(Json(PresetListResponse {
        success: true,
        presets,
    }))
}

/// POST /presets/save - Capture a component's values under a name
pub async fn save_preset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<PresetResponse>, ApiError> {
    let preset = state
        .bridge
        .presets
        .save(&req.name, &req.comp_path)
        .await
        .map_err(api_error)?;
    Ok(Json(PresetResponse {
        success: true,
        preset,
    }))
}

/// POST /presets/load - Write a preset back, optionally onto another component
pub async fn load_preset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PresetLoadRequest>,
) -> Result<Json<PresetLoadResponse>, ApiError> {
    let load = state
        .bridge
        .presets
        .load(&req.name, &req.comp_path, req.target.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(PresetLoadResponse {
        success: true,
        load,
    }))
}

/// POST /presets/delete - Delete a preset
pub async fn delete_preset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<PresetResponse>, ApiError> {
    let preset = state
        .bridge
        .presets
        .delete(&req.name, &req.comp_path)
        .await
        .map_err(api_error)?;
    Ok(Json(PresetResponse {
        success: true,
        preset,
    }))
}
