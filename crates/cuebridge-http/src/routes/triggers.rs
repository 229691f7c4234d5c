//! Trigger binding, page and device endpoint handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use cuebridge_core::{PageDraft, TriggerBinding, TriggerFired};
use std::sync::Arc;

use crate::{
    models::{
        api_error, ActivateRequest, ActivateResponse, ApiError, BindingResponse, BindingsResponse,
        DeleteBindingRequest, DeletedResponse, DeviceQuery, DeviceReportRequest,
        DeviceReportResponse, DevicesResponse, FireRequest, PageNameRequest, PageResponse,
        PagesResponse, SuccessResponse,
    },
    AppState,
};

/// GET /triggers/config?device= - Live bindings
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> Json<BindingsResponse> {
    Json(BindingsResponse {
        success: true,
        bindings: state.bridge.triggers.config(query.device.as_deref()),
    })
}

/// POST /triggers/config/set - Insert or replace one binding
pub async fn set_binding(
    State(state): State<Arc<AppState>>,
    Json(binding): Json<TriggerBinding>,
) -> Result<Json<BindingResponse>, ApiError> {
    let binding = state
        .bridge
        .triggers
        .set_binding(binding)
        .map_err(api_error)?;
    Ok(Json(BindingResponse {
        success: true,
        binding,
    }))
}

/// POST /triggers/config/delete - Remove one binding
pub async fn delete_binding(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteBindingRequest>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state
        .bridge
        .triggers
        .delete_binding(&req.device, req.control_id, req.kind)
        .map_err(api_error)?;
    Ok(Json(DeletedResponse {
        success: true,
        deleted,
    }))
}

/// GET /triggers/pages - Page templates and per-device activations
pub async fn list_pages(State(state): State<Arc<AppState>>) -> Json<PagesResponse> {
    let triggers = &state.bridge.triggers;
    Json(PagesResponse {
        success: true,
        pages: triggers.list_pages(),
        active: triggers.active_pages(),
    })
}

/// POST /triggers/pages/get - One page template
pub async fn get_page(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PageNameRequest>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state.bridge.triggers.get_page(&req.name).map_err(api_error)?;
    Ok(Json(PageResponse {
        success: true,
        page,
    }))
}

/// POST /triggers/pages/save - Create or replace a page template
pub async fn save_page(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<PageDraft>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state.bridge.triggers.save_page(draft).map_err(api_error)?;
    Ok(Json(PageResponse {
        success: true,
        page,
    }))
}

/// POST /triggers/pages/delete - Delete a page template
pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PageNameRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .bridge
        .triggers
        .delete_page(&req.name)
        .map_err(api_error)?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /triggers/pages/activate - Copy a page onto a device
pub async fn activate_page(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let active = state
        .bridge
        .triggers
        .activate_page(&req.device, &req.page)
        .map_err(api_error)?;
    Ok(Json(ActivateResponse {
        success: true,
        device: req.device,
        active,
    }))
}

/// GET /triggers/devices - Devices last reported by the peripheral service
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<DevicesResponse> {
    Json(DevicesResponse {
        success: true,
        devices: state.bridge.triggers.devices(),
    })
}

/// POST /triggers/devices/report - Replace the connected device list
pub async fn report_devices(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceReportRequest>,
) -> Json<DeviceReportResponse> {
    let count = state.bridge.triggers.report_devices(req.devices);
    log::debug!("Peripheral service reported {} devices", count);
    Json(DeviceReportResponse {
        success: true,
        count,
    })
}

/// POST /triggers/fire - Resolve and run the action bound to a control
pub async fn fire(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FireRequest>,
) -> Result<Json<TriggerFired>, ApiError> {
    let fired = state
        .bridge
        .fire_trigger(&req.device, req.control_id, req.kind, req.delta)
        .await
        .map_err(api_error)?;
    Ok(Json(fired))
}
