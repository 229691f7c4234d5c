//! HTTP REST API server for cuebridge.
//!
//! Exposes the bridge core over HTTP and a WebSocket change channel.
//!
//! # Features
//!
//! - Schema queries, batch parameter writes and pulses
//! - Snapshot capture and apply
//! - Cue list editing and playback (go, next, back, stop)
//! - Presets per component
//! - Trigger bindings, pages, device directory and trigger firing
//! - Timeline transport
//! - Real-time parameter changes over WebSocket
//!
//! # Usage
//!
//! ```ignore
//! use cuebridge_core::{Bridge, MemoryStore};
//!
//! let bridge = Arc::new(Bridge::in_memory(MemoryStore::new("demo"))?);
//! bridge.start().await?;
//! tokio::spawn(async move {
//!     start_server(bridge).await
//! });
//! ```

mod models;
mod routes;
mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use cuebridge_core::Bridge;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub use models::*;
pub use websocket::{ClientMessage, ServerMessage};

/// Shared application state for HTTP handlers.
pub struct AppState {
    pub bridge: Arc<Bridge>,
    /// Change-detection tick of each WebSocket connection.
    pub push_interval: Duration,
}

impl AppState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        let push_interval = bridge.config().sync.push_interval();
        Self {
            bridge,
            push_interval,
        }
    }
}

/// Build the router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(routes::ui::ping))
        .route("/modules", get(routes::modules::list_modules))
        // Parameter surface
        .route("/ui/info", get(routes::ui::info))
        .route("/ui/schema", get(routes::ui::get_schema))
        .route("/ui/set", post(routes::ui::set_parameters))
        .route("/ui/pulse", post(routes::ui::pulse_parameter))
        .route("/ui/discover", get(routes::ui::discover))
        .route("/ui/tree", get(routes::ui::tree))
        .route("/ws", get(websocket::ws_handler))
        // Snapshots
        .route("/snapshot/capture", post(routes::snapshot::capture))
        .route("/snapshot/apply", post(routes::snapshot::apply))
        // Cues
        .route("/cues", get(routes::cues::list_cues))
        .route("/cues/current", get(routes::cues::current_cue))
        .route("/cues/go", post(routes::cues::go_cue))
        .route("/cues/next", post(routes::cues::next_cue))
        .route("/cues/back", post(routes::cues::back_cue))
        .route("/cues/stop", post(routes::cues::stop_cues))
        .route("/cues/save", post(routes::cues::save_cue))
        .route("/cues/delete", post(routes::cues::delete_cue))
        .route("/cues/reorder", post(routes::cues::reorder_cue))
        .route("/cues/:id", get(routes::cues::get_cue))
        // Presets
        .route("/presets", get(routes::presets::list_presets))
        .route("/presets/save", post(routes::presets::save_preset))
        .route("/presets/load", post(routes::presets::load_preset))
        .route("/presets/delete", post(routes::presets::delete_preset))
        // Triggers
        .route("/triggers/config", get(routes::triggers::get_config))
        .route("/triggers/config/set", post(routes::triggers::set_binding))
        .route("/triggers/config/delete", post(routes::triggers::delete_binding))
        .route("/triggers/pages", get(routes::triggers::list_pages))
        .route("/triggers/pages/get", post(routes::triggers::get_page))
        .route("/triggers/pages/save", post(routes::triggers::save_page))
        .route("/triggers/pages/delete", post(routes::triggers::delete_page))
        .route("/triggers/pages/activate", post(routes::triggers::activate_page))
        .route("/triggers/devices", get(routes::triggers::list_devices))
        .route("/triggers/devices/report", post(routes::triggers::report_devices))
        .route("/triggers/fire", post(routes::triggers::fire))
        // Timeline and raw actions
        .route("/timeline", post(routes::timeline::command))
        .route("/timeline/status", get(routes::timeline::status))
        .route("/actions/execute", post(routes::timeline::execute_actions))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Start the HTTP server on the configured bind address and port.
///
/// Returns when the listener fails; the error is logged and returned.
pub async fn start_server(bridge: Arc<Bridge>) -> std::io::Result<()> {
    let server = bridge.config().server.clone();
    let state = Arc::new(AppState::new(bridge));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", server.bind, server.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("HTTP API server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        log::error!("Failed to bind HTTP server to {}: {}", addr, e);
        e
    })?;

    axum::serve(listener, app).await.map_err(|e| {
        log::error!("HTTP server error: {}", e);
        e
    })
}
