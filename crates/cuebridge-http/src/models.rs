//! Request and response bodies of the REST API.

use axum::{http::StatusCode, Json};
use cuebridge_core::schema::{ComponentNode, ComponentSchema, ComponentSummary};
use cuebridge_core::triggers::{ActivePage, DeviceInfo, PageSummary};
use cuebridge_core::{
    Action, ActionOutcome, Advance, ApplyReport, ChangeStatus, ControlKind, Cue, CueRun,
    CueSummary, CurrentCue, DeviceReport, HostInfo, ModuleInfo, Page, ParameterChange,
    Preset, PresetLoad, Snapshot, TimelineStatus, TriggerBinding,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Errors
// ============================================================================

/// Error body. `error` is a machine-readable kind, `message` is for humans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    fn new(error: &str, message: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("validation_error", message)
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a core error to its HTTP status and body.
pub fn api_error(err: cuebridge_core::Error) -> ApiError {
    use cuebridge_core::Error;
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::HostUnreachable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::warn!("Request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse::new(err.kind(), &err.to_string())),
    )
}

// ============================================================================
// General
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub success: bool,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: HostInfo,
    pub bridge_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModulesResponse {
    pub success: bool,
    pub modules: Vec<ModuleInfo>,
}

// ============================================================================
// Parameter surface
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// Root and depth for discovery; both default from the snapshot settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeQuery {
    pub root: Option<String>,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaResponse {
    pub success: bool,
    #[serde(flatten)]
    pub schema: ComponentSchema,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub changes: Vec<ParameterChange>,
}

/// `success` is true only when every change was applied.
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub success: bool,
    pub results: Vec<ChangeStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PulseRequest {
    pub path: String,
    pub parameter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverResponse {
    pub success: bool,
    pub root: String,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeResponse {
    pub success: bool,
    pub tree: ComponentNode,
}

// ============================================================================
// Snapshots
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    pub parent_path: String,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureResponse {
    pub success: bool,
    pub snapshot: Snapshot,
    pub component_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ApplyReport,
}

// ============================================================================
// Cues
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CueListResponse {
    pub success: bool,
    pub cues: Vec<CueSummary>,
    pub current: CurrentCue,
}

#[derive(Debug, Clone, Serialize)]
pub struct CueResponse {
    pub success: bool,
    pub cue: Cue,
}

/// Go by id or by 1-based index; `id` wins when both are given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoRequest {
    pub id: Option<String>,
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CueRunResponse {
    pub success: bool,
    #[serde(flatten)]
    pub run: CueRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub advance: Advance,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentResponse {
    pub success: bool,
    #[serde(flatten)]
    pub current: CurrentCue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRequest {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderRequest {
    pub id: String,
    pub new_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReorderResponse {
    pub success: bool,
    pub cues: Vec<CueSummary>,
}

// ============================================================================
// Presets
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetQuery {
    pub comp_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetRequest {
    pub name: String,
    pub comp_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetLoadRequest {
    pub name: String,
    pub comp_path: String,
    /// Load onto another component instead of the one it was saved from.
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresetListResponse {
    pub success: bool,
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresetResponse {
    pub success: bool,
    pub preset: Preset,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresetLoadResponse {
    pub success: bool,
    #[serde(flatten)]
    pub load: PresetLoad,
}

// ============================================================================
// Triggers
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceQuery {
    pub device: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingsResponse {
    pub success: bool,
    pub bindings: Vec<TriggerBinding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingResponse {
    pub success: bool,
    pub binding: TriggerBinding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteBindingRequest {
    pub device: String,
    pub control_id: u32,
    #[serde(default = "default_kind")]
    pub kind: ControlKind,
}

fn default_kind() -> ControlKind {
    ControlKind::Key
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagesResponse {
    pub success: bool,
    pub pages: Vec<PageSummary>,
    pub active: BTreeMap<String, ActivePage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResponse {
    pub success: bool,
    pub page: Page,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    pub device: String,
    pub page: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateResponse {
    pub success: bool,
    pub device: String,
    #[serde(flatten)]
    pub active: ActivePage,
}

#[derive(Debug, Clone, Serialize)]
pub struct DevicesResponse {
    pub success: bool,
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceReportRequest {
    pub devices: Vec<DeviceReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceReportResponse {
    pub success: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FireRequest {
    pub device: String,
    pub control_id: u32,
    #[serde(default = "default_kind")]
    pub kind: ControlKind,
    /// Dial detents; scales nudge steps.
    pub delta: Option<f64>,
}

// ============================================================================
// Timeline and actions
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TimelineResponse {
    pub success: bool,
    #[serde(flatten)]
    pub status: TimelineStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub actions: Vec<Action>,
}

/// `success` is true only when every action succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub results: Vec<ActionOutcome>,
}

