//! Timeline transport and raw action handlers.

use axum::{extract::State, Json};
use cuebridge_core::TimelineCommand;
use std::sync::Arc;

use crate::{
    models::{api_error, ApiError, ExecuteRequest, ExecuteResponse, TimelineResponse},
    AppState,
};

/// POST /timeline - Run a transport command
pub async fn command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<TimelineCommand>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let status = state
        .bridge
        .dispatcher
        .timeline(command)
        .await
        .map_err(api_error)?;
    Ok(Json(TimelineResponse {
        success: true,
        status,
    }))
}

/// GET /timeline/status - Current transport state
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<TimelineResponse>, ApiError> {
    let status = state
        .bridge
        .dispatcher
        .timeline_status()
        .await
        .map_err(api_error)?;
    Ok(Json(TimelineResponse {
        success: true,
        status,
    }))
}

/// POST /actions/execute - Run actions in order, each independently
pub async fn execute_actions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Json<ExecuteResponse> {
    let results = state.bridge.dispatcher.execute_all(&req.actions).await;
    Json(ExecuteResponse {
        success: results.iter().all(|r| r.success),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;
    use cuebridge_core::{Action, ParamValue};

    #[tokio::test]
    async fn test_transport_commands() {
        let state = test_support::state().await;
        let Json(resp) = command(State(state.clone()), Json(TimelineCommand::Play))
            .await
            .unwrap();
        assert!(resp.status.playing);

        command(
            State(state.clone()),
            Json(TimelineCommand::JumpFrame { frame: 120 }),
        )
        .await
        .unwrap();
        let Json(resp) = status(State(state)).await.unwrap();
        assert_eq!(resp.status.frame, 120);
    }

    #[tokio::test]
    async fn test_execute_reports_each_action() {
        let state = test_support::state().await;
        let Json(resp) = execute_actions(
            State(state),
            Json(ExecuteRequest {
                actions: vec![
                    Action::Parameter {
                        path: "/project1/lights".into(),
                        parameter: "level".into(),
                        value: ParamValue::Float(0.2),
                    },
                    Action::Toggle {
                        path: "/project1/ghost".into(),
                        parameter: "on".into(),
                    },
                ],
            }),
        )
        .await;
        assert!(!resp.success);
        assert_eq!(resp.results.len(), 2);
        assert!(resp.results[0].success);
        assert!(!resp.results[1].success);
    }
}
