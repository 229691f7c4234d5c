//! The seam to the host application's live component graph.
//!
//! The bridge never owns components. Everything it knows about them comes
//! from a [`ComponentStore`], addressed by hierarchical `/`-separated paths,
//! and any path may stop resolving between two calls.

mod bounded;
mod memory;

pub use bounded::BoundedStore;
pub use memory::{MemoryStore, Scene, SceneComponent};

#[cfg(test)]
pub(crate) use memory::fixtures;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::ParamValue;

/// A custom parameter exactly as the host describes it.
///
/// `style` is the host's own style name (`"Float"`, `"StrMenu"`, `"RGBA"`, ...);
/// the schema adapter normalizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostParameter {
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub style: String,
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu_labels: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
}

/// A named page of custom parameters on one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostPage {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<HostParameter>,
}

/// Timeline transport commands understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TimelineCommand {
    Play,
    Pause,
    /// Pause and rewind to frame 1.
    Stop,
    JumpFrame { frame: i64 },
    SetRate { rate: f64 },
    ToggleLoop,
}

/// Timeline transport state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineStatus {
    pub playing: bool,
    pub frame: i64,
    pub rate: f64,
    pub looping: bool,
}

impl Default for TimelineStatus {
    fn default() -> Self {
        Self {
            playing: false,
            frame: 1,
            rate: 60.0,
            looping: true,
        }
    }
}

/// Identification of the running host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub project_name: String,
    pub host_version: String,
}

/// Opaque, path-addressed access to the host's live components.
///
/// Implementations must be cheap to call concurrently; the host serializes
/// its own mutations, so callers hold no lock around writes.
#[async_trait]
pub trait ComponentStore: Send + Sync {
    async fn info(&self) -> Result<HostInfo>;

    /// Custom (user-added) parameter pages of a component, in host order.
    /// Returns [`Error::NotFound`] if the path does not resolve.
    async fn custom_pages(&self, path: &str) -> Result<Vec<HostPage>>;

    /// Descendant component paths of `root` down to `max_depth` levels,
    /// breadth first. The root itself is not included.
    async fn find_components(&self, root: &str, max_depth: usize) -> Result<Vec<String>>;

    async fn get(&self, path: &str, parameter: &str) -> Result<ParamValue>;

    async fn set(&self, path: &str, parameter: &str, value: ParamValue) -> Result<()>;

    /// Fire a momentary parameter once.
    async fn pulse(&self, path: &str, parameter: &str) -> Result<()>;

    /// Execute an opaque script body in host context.
    async fn run_script(&self, code: &str) -> Result<()>;

    async fn timeline(&self, command: TimelineCommand) -> Result<TimelineStatus>;

    async fn timeline_status(&self) -> Result<TimelineStatus>;

    /// Whether a path currently resolves.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.custom_pages(path).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Normalize a component path: leading `/`, no trailing or doubled slashes.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Number of levels `path` sits below `root`, if it is a strict descendant.
pub fn depth_below(root: &str, path: &str) -> Option<usize> {
    let root = normalize_path(root);
    let path = normalize_path(path);
    let rest = if root == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(&root)?.strip_prefix('/')?
    };
    if rest.is_empty() {
        return None;
    }
    Some(rest.split('/').count())
}

/// Split `/a/b/param` style addresses into (`/a/b`, `param`).
pub fn split_parameter_address(address: &str) -> Option<(String, String)> {
    let normalized = normalize_path(address);
    let (path, param) = normalized.rsplit_once('/')?;
    if path.is_empty() || param.is_empty() {
        return None;
    }
    Some((path.to_string(), param.to_string()))
}
