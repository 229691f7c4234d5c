//! Snapshot endpoint handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    models::{api_error, ApiError, ApplyRequest, ApplyResponse, CaptureRequest, CaptureResponse},
    AppState,
};

/// POST /snapshot/capture - Capture every component under a parent path
pub async fn capture(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, ApiError> {
    let depth = req
        .max_depth
        .unwrap_or(state.bridge.config().snapshot.max_depth);
    let snapshot = state
        .bridge
        .snapshot
        .capture(&req.parent_path, depth)
        .await
        .map_err(api_error)?;
    Ok(Json(CaptureResponse {
        success: true,
        component_count: snapshot.len(),
        snapshot,
    }))
}

/// POST /snapshot/apply - Apply a snapshot; unresolved paths are reported, not fatal
pub async fn apply(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let report = state
        .bridge
        .snapshot
        .apply(&req.snapshot)
        .await
        .map_err(api_error)?;
    Ok(Json(ApplyResponse {
        success: true,
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;
    use cuebridge_core::{ComponentStore, ParamValue, SnapshotEntry};

    #[tokio::test]
    async fn test_capture_then_apply_with_stale_entry() {
        let store = test_support::store();
        let state = test_support::state_with(store.clone()).await;

        let Json(captured) = capture(
            State(state.clone()),
            Json(CaptureRequest {
                parent_path: "/project1".into(),
                max_depth: Some(2),
            }),
        )
        .await
        .unwrap();
        assert_eq!(captured.component_count, 1);
        assert!(captured.snapshot.get("/project1/lights").is_some());

        let mut snapshot = captured.snapshot;
        snapshot.insert(
            "/project1/removed",
            SnapshotEntry::new("removed", Default::default()),
        );
        store
            .set("/project1/lights", "level", ParamValue::Float(0.9))
            .await
            .unwrap();

        let Json(applied) = apply(State(state), Json(ApplyRequest { snapshot }))
            .await
            .unwrap();
        assert!(applied.success);
        assert_eq!(applied.report.applied_paths, vec!["/project1/lights"]);
        assert!(applied.report.failed_paths.contains_key("/project1/removed"));
        assert_eq!(
            store.get("/project1/lights", "level").await.unwrap(),
            ParamValue::Float(0.5)
        );
    }

    #[tokio::test]
    async fn test_capture_unknown_root_is_not_found() {
        let state = test_support::state().await;
        let err = capture(
            State(state),
            Json(CaptureRequest {
                parent_path: "/nowhere".into(),
                max_depth: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, axum::http::StatusCode::NOT_FOUND);
    }
}
