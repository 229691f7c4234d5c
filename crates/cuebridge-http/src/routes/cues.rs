//! Cue endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use cuebridge_core::CueDraft;
use std::sync::Arc;

use crate::{
    models::{
        api_error, AdvanceResponse, ApiError, CueListResponse, CueResponse, CueRunResponse,
        CurrentResponse, ErrorResponse, GoRequest, IdRequest, ReorderRequest, ReorderResponse,
    },
    AppState,
};

/// GET /cues - List all cues with the current pointer
pub async fn list_cues(State(state): State<Arc<AppState>>) -> Json<CueListResponse> {
    let cues = state.bridge.cues.list().await;
    let current = state.bridge.cues.current().await;
    Json(CueListResponse {
        success: true,
        cues,
        current,
    })
}

/// GET /cues/:id - Get a cue including its snapshot and actions
pub async fn get_cue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CueResponse>, ApiError> {
    let cue = state.bridge.cues.get(&id).await.map_err(api_error)?;
    Ok(Json(CueResponse { success: true, cue }))
}

/// GET /cues/current - Current cue and sequencer state
pub async fn current_cue(State(state): State<Arc<AppState>>) -> Json<CurrentResponse> {
    Json(CurrentResponse {
        success: true,
        current: state.bridge.cues.current().await,
    })
}

/// POST /cues/go - Run a cue by id or 1-based index
pub async fn go_cue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GoRequest>,
) -> Result<Json<CueRunResponse>, ApiError> {
    let cues = &state.bridge.cues;
    let run = match (req.id, req.index) {
        (Some(id), _) => cues.go(&id).await,
        (None, Some(index)) => cues.go_index(index).await,
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Either 'id' or 'index' is required")),
            ))
        }
    }
    .map_err(api_error)?;
    Ok(Json(CueRunResponse { success: true, run }))
}

/// POST /cues/next - Run the following cue
pub async fn next_cue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let advance = state.bridge.cues.next().await.map_err(api_error)?;
    Ok(Json(AdvanceResponse {
        success: true,
        advance,
    }))
}

/// POST /cues/back - Run the preceding cue
pub async fn back_cue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let advance = state.bridge.cues.back().await.map_err(api_error)?;
    Ok(Json(AdvanceResponse {
        success: true,
        advance,
    }))
}

/// POST /cues/stop - Cancel autofollow and go idle
pub async fn stop_cues(State(state): State<Arc<AppState>>) -> Json<CurrentResponse> {
    Json(CurrentResponse {
        success: true,
        current: state.bridge.cues.stop().await,
    })
}

/// POST /cues/save - Create or update a cue
pub async fn save_cue(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<CueDraft>,
) -> Result<Json<CueResponse>, ApiError> {
    let cue = state.bridge.cues.save(draft).await.map_err(api_error)?;
    Ok(Json(CueResponse { success: true, cue }))
}

/// POST /cues/delete - Delete a cue and renumber the rest
pub async fn delete_cue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<CueResponse>, ApiError> {
    let cue = state.bridge.cues.delete(&req.id).await.map_err(api_error)?;
    Ok(Json(CueResponse { success: true, cue }))
}

/// POST /cues/reorder - Move a cue to a new position
pub async fn reorder_cue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ReorderResponse>, ApiError> {
    let cues = state
        .bridge
        .cues
        .reorder(&req.id, req.new_index)
        .await
        .map_err(api_error)?;
    Ok(Json(ReorderResponse {
        success: true,
        cues,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;
    use cuebridge_core::{Advance, ComponentStore, ParamValue};

    fn draft(id: &str) -> CueDraft {
        CueDraft {
            id: Some(id.to_string()),
            name: id.to_uppercase(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_go_and_list() {
        let store = test_support::store();
        let state = test_support::state_with(store.clone()).await;

        let Json(saved) = save_cue(State(state.clone()), Json(draft("intro")))
            .await
            .unwrap();
        assert_eq!(saved.cue.index, 1);
        assert!(saved.cue.snapshot.get("/project1/lights").is_some());

        store
            .set("/project1/lights", "level", ParamValue::Float(1.0))
            .await
            .unwrap();
        let Json(run) = go_cue(
            State(state.clone()),
            Json(GoRequest {
                id: Some("intro".into()),
                index: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(run.run.cue.id, "intro");
        assert_eq!(
            store.get("/project1/lights", "level").await.unwrap(),
            ParamValue::Float(0.5)
        );

        let Json(list) = list_cues(State(state)).await;
        assert_eq!(list.cues.len(), 1);
        assert_eq!(list.current.cue.map(|c| c.id), Some("intro".to_string()));
    }

    #[tokio::test]
    async fn test_go_requires_target() {
        let state = test_support::state().await;
        let err = go_cue(State(state.clone()), Json(GoRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = go_cue(
            State(state),
            Json(GoRequest {
                id: None,
                index: Some(3),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_next_without_cues() {
        let state = test_support::state().await;
        let Json(resp) = next_cue(State(state)).await.unwrap();
        assert_eq!(resp.advance, Advance::NoCues);
    }

    #[tokio::test]
    async fn test_reorder_and_delete() {
        let state = test_support::state().await;
        for id in ["a", "b", "c"] {
            save_cue(State(state.clone()), Json(draft(id))).await.unwrap();
        }

        let Json(resp) = reorder_cue(
            State(state.clone()),
            Json(ReorderRequest {
                id: "c".into(),
                new_index: 1,
            }),
        )
        .await
        .unwrap();
        let order: Vec<_> = resp.cues.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        let err = reorder_cue(
            State(state.clone()),
            Json(ReorderRequest {
                id: "c".into(),
                new_index: 0,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        delete_cue(State(state.clone()), Json(IdRequest { id: "a".into() }))
            .await
            .unwrap();
        let Json(list) = list_cues(State(state)).await;
        let indices: Vec<_> = list.cues.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
