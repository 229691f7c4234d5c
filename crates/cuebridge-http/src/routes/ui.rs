//! Parameter surface endpoint handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    models::{
        api_error, ApiError, DiscoverResponse, InfoResponse, PathQuery, PingResponse,
        PulseRequest, SchemaResponse, SetRequest, SetResponse, SuccessResponse, TreeQuery,
        TreeResponse,
    },
    AppState,
};

/// GET /ping - Liveness check
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        success: true,
        service: "cuebridge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /ui/info - Host project and version
pub async fn info(State(state): State<Arc<AppState>>) -> Result<Json<InfoResponse>, ApiError> {
    let info = state.bridge.info().await.map_err(api_error)?;
    Ok(Json(InfoResponse {
        success: true,
        info,
        bridge_version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// GET /ui/schema?path= - Custom parameter schema of one component
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<SchemaResponse>, ApiError> {
    let schema = state.bridge.sync.poll(&query.path).await.map_err(api_error)?;
    Ok(Json(SchemaResponse {
        success: true,
        schema,
    }))
}

/// POST /ui/set - Apply a batch of parameter writes
pub async fn set_parameters(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetRequest>,
) -> Json<SetResponse> {
    let results = state.bridge.sync.set_batch(&req.changes).await;
    Json(SetResponse {
        success: results.iter().all(|r| r.success),
        results,
    })
}

/// POST /ui/pulse - Fire a pulse parameter once
pub async fn pulse_parameter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PulseRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .bridge
        .sync
        .pulse(&req.path, &req.parameter)
        .await
        .map_err(api_error)?;
    Ok(Json(SuccessResponse::ok()))
}

fn tree_bounds(state: &AppState, query: TreeQuery) -> (String, usize) {
    let settings = &state.bridge.config().snapshot;
    (
        query.root.unwrap_or_else(|| settings.root.clone()),
        query.max_depth.unwrap_or(settings.max_depth),
    )
}

/// GET /ui/discover - Components with custom parameters under a root
pub async fn discover(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<DiscoverResponse>, ApiError> {
    let (root, depth) = tree_bounds(&state, query);
    let components = state
        .bridge
        .schema
        .discover(&root, depth)
        .await
        .map_err(api_error)?;
    Ok(Json(DiscoverResponse {
        success: true,
        root,
        components,
    }))
}

/// GET /ui/tree - Nested component tree under a root
pub async fn tree(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>, ApiError> {
    let (root, depth) = tree_bounds(&state, query);
    let tree = state
        .bridge
        .schema
        .tree(&root, depth)
        .await
        .map_err(api_error)?;
    Ok(Json(TreeResponse {
        success: true,
        tree,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;
    use axum::http::StatusCode;
    use cuebridge_core::{ParamValue, ParameterChange};

    #[tokio::test]
    async fn test_schema_and_missing_path() {
        let state = test_support::state().await;
        let Json(resp) = get_schema(
            State(state.clone()),
            Query(PathQuery {
                path: "/project1/lights".into(),
            }),
        )
        .await
        .unwrap();
        assert!(resp.success);
        assert_eq!(resp.schema.name, "lights");
        assert_eq!(resp.schema.parameter_count(), 2);

        let err = get_schema(
            State(state),
            Query(PathQuery {
                path: "/project1/ghost".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert!(!err.1.success);
        assert_eq!(err.1.error, "not_found");
    }

    #[tokio::test]
    async fn test_batch_set_reports_each_change() {
        let state = test_support::state().await;
        let Json(resp) = set_parameters(
            State(state.clone()),
            Json(SetRequest {
                changes: vec![
                    ParameterChange {
                        path: "/project1/lights".into(),
                        parameter: "level".into(),
                        value: ParamValue::Float(0.8),
                    },
                    ParameterChange {
                        path: "/project1/ghost".into(),
                        parameter: "level".into(),
                        value: ParamValue::Float(0.8),
                    },
                ],
            }),
        )
        .await;
        assert!(!resp.success);
        assert!(resp.results[0].success);
        assert!(!resp.results[1].success);

        let schema = state.bridge.sync.poll("/project1/lights").await.unwrap();
        assert_eq!(
            schema.parameter("level").unwrap().value,
            ParamValue::Float(0.8)
        );
    }

    #[tokio::test]
    async fn test_discover_defaults_to_snapshot_root() {
        let state = test_support::state().await;
        let Json(resp) = discover(State(state), Query(TreeQuery::default()))
            .await
            .unwrap();
        assert_eq!(resp.root, "/project1");
        let paths: Vec<_> = resp.components.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/project1/lights"]);
    }

    #[tokio::test]
    async fn test_ping() {
        let Json(resp) = ping().await;
        assert!(resp.success);
        assert_eq!(resp.service, "cuebridge");
    }
}
