//! In-process host graph.
//!
//! Stands in for the host application when the bridge runs standalone and
//! serves as the store behind every test. Components live in an
//! `Arc<RwLock<..>>` so clones share one graph.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use super::{
    depth_below, normalize_path, ComponentStore, HostInfo, HostPage, HostParameter,
    TimelineCommand, TimelineStatus,
};
use crate::error::{Error, Result};
use crate::value::ParamValue;

/// Scene file describing a host graph to seed a [`MemoryStore`] with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub project: String,
    pub components: Vec<SceneComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneComponent {
    pub path: String,
    #[serde(default)]
    pub pages: Vec<HostPage>,
}

#[derive(Debug, Default)]
struct Graph {
    project: String,
    components: BTreeMap<String, Vec<HostPage>>,
    timeline: TimelineStatus,
    scripts: Vec<String>,
    pulses: HashMap<(String, String), u64>,
}

impl Graph {
    fn parameter_mut(&mut self, path: &str, parameter: &str) -> Result<&mut HostParameter> {
        let pages = self
            .components
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("Component not found: {}", path)))?;
        pages
            .iter_mut()
            .flat_map(|page| page.parameters.iter_mut())
            .find(|p| p.name == parameter)
            .ok_or_else(|| Error::not_found(format!("Parameter not found: {}.{}", path, parameter)))
    }
}

/// Host graph held in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    graph: Arc<RwLock<Graph>>,
}

impl MemoryStore {
    pub fn new(project: impl Into<String>) -> Self {
        let store = Self::default();
        store.with_graph_write(|g| g.project = project.into());
        store
    }

    pub fn from_scene(scene: Scene) -> Result<Self> {
        let store = Self::new(scene.project);
        for component in scene.components {
            store.add_component(&component.path, component.pages)?;
        }
        Ok(store)
    }

    /// Load a JSON scene file.
    pub fn from_scene_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let scene: Scene = serde_json::from_str(&content)?;
        log::info!(
            "Loaded scene '{}' with {} components from {}",
            scene.project,
            scene.components.len(),
            path.as_ref().display()
        );
        Self::from_scene(scene)
    }

    fn with_graph_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Graph) -> R,
    {
        let graph = self.graph.read().expect("Host graph lock poisoned");
        f(&graph)
    }

    fn with_graph_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Graph) -> R,
    {
        let mut graph = self.graph.write().expect("Host graph lock poisoned");
        f(&mut graph)
    }

    /// Add (or replace) a component. Missing ancestors are created empty.
    ///
    /// Seeded values are coerced to their parameter style exactly as a `set`
    /// would, so a value written back from a capture compares equal.
    pub fn add_component(&self, path: &str, mut pages: Vec<HostPage>) -> Result<()> {
        let path = normalize_path(path);
        for param in pages.iter_mut().flat_map(|page| page.parameters.iter_mut()) {
            if is_pulse_style(&param.style) {
                continue;
            }
            param.value = coerce(param, param.value.clone()).map_err(|e| match e {
                Error::Validation(msg) => Error::validation(format!("{}: {}", path, msg)),
                other => other,
            })?;
        }
        self.with_graph_write(|g| {
            let mut ancestor = String::new();
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            for segment in &segments[..segments.len().saturating_sub(1)] {
                ancestor.push('/');
                ancestor.push_str(segment);
                g.components.entry(ancestor.clone()).or_default();
            }
            g.components.insert(path.clone(), pages);
        });
        Ok(())
    }

    /// Remove a component and its whole subtree.
    pub fn remove_component(&self, path: &str) {
        let path = normalize_path(path);
        let prefix = format!("{}/", path);
        self.with_graph_write(|g| {
            g.components.retain(|p, _| p != &path && !p.starts_with(&prefix));
        });
    }

    /// Scripts executed so far, oldest first.
    pub fn executed_scripts(&self) -> Vec<String> {
        self.with_graph_read(|g| g.scripts.clone())
    }

    /// How many times a pulse parameter has fired.
    pub fn pulse_count(&self, path: &str, parameter: &str) -> u64 {
        let key = (normalize_path(path), parameter.to_string());
        self.with_graph_read(|g| g.pulses.get(&key).copied().unwrap_or(0))
    }
}

/// Convert an incoming value to the representation the parameter's style holds.
fn is_pulse_style(style: &str) -> bool {
    matches!(style, "Pulse" | "Momentary")
}

fn coerce(param: &HostParameter, value: ParamValue) -> Result<ParamValue> {
    let mismatch = |value: &ParamValue| {
        Error::validation(format!(
            "Value {} does not fit {} parameter '{}'",
            value, param.style, param.name
        ))
    };
    match param.style.as_str() {
        "Float" => value.as_f64().map(ParamValue::Float).ok_or_else(|| mismatch(&value)),
        "Int" => match value {
            ParamValue::Int(i) => Ok(ParamValue::Int(i)),
            ref other => match other.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(ParamValue::Int(f as i64)),
                _ => Err(mismatch(other)),
            },
        },
        "Toggle" => Ok(ParamValue::Bool(value.is_truthy())),
        "Menu" | "StrMenu" => match value {
            ParamValue::Text(name) if param.style == "StrMenu" || param.menu_names.contains(&name) => {
                Ok(ParamValue::Text(name))
            }
            ParamValue::Int(index) => param
                .menu_names
                .get(index.max(0) as usize)
                .filter(|_| index >= 0)
                .map(|name| ParamValue::Text(name.clone()))
                .ok_or_else(|| mismatch(&ParamValue::Int(index))),
            other => Err(mismatch(&other)),
        },
        "Pulse" | "Momentary" => Err(Error::validation(format!(
            "Parameter '{}' is a pulse; pulse it instead of setting it",
            param.name
        ))),
        "RGB" | "RGBA" | "XY" | "XYZ" | "UV" | "UVW" | "WH" => match value {
            ParamValue::List(items) => Ok(ParamValue::List(items)),
            other => Err(mismatch(&other)),
        },
        _ => match value {
            ParamValue::Text(s) => Ok(ParamValue::Text(s)),
            ParamValue::List(_) => Err(mismatch(&value)),
            other => Ok(ParamValue::Text(other.to_string())),
        },
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn info(&self) -> Result<HostInfo> {
        Ok(self.with_graph_read(|g| HostInfo {
            project_name: g.project.clone(),
            host_version: format!("memory-{}", env!("CARGO_PKG_VERSION")),
        }))
    }

    async fn custom_pages(&self, path: &str) -> Result<Vec<HostPage>> {
        let path = normalize_path(path);
        self.with_graph_read(|g| {
            g.components
                .get(&path)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("Component not found: {}", path)))
        })
    }

    async fn find_components(&self, root: &str, max_depth: usize) -> Result<Vec<String>> {
        let root = normalize_path(root);
        self.with_graph_read(|g| {
            if root != "/" && !g.components.contains_key(&root) {
                return Err(Error::not_found(format!("Component not found: {}", root)));
            }
            let mut found: Vec<(usize, String)> = g
                .components
                .keys()
                .filter_map(|p| depth_below(&root, p).map(|d| (d, p.clone())))
                .filter(|(d, _)| *d <= max_depth)
                .collect();
            found.sort();
            Ok(found.into_iter().map(|(_, p)| p).collect())
        })
    }

    async fn get(&self, path: &str, parameter: &str) -> Result<ParamValue> {
        let path = normalize_path(path);
        self.with_graph_write(|g| Ok(g.parameter_mut(&path, parameter)?.value.clone()))
    }

    async fn set(&self, path: &str, parameter: &str, value: ParamValue) -> Result<()> {
        let path = normalize_path(path);
        self.with_graph_write(|g| {
            let param = g.parameter_mut(&path, parameter)?;
            if param.read_only {
                return Err(Error::validation(format!(
                    "Parameter is read-only: {}.{}",
                    path, parameter
                )));
            }
            param.value = coerce(param, value)?;
            Ok(())
        })
    }

    async fn pulse(&self, path: &str, parameter: &str) -> Result<()> {
        let path = normalize_path(path);
        self.with_graph_write(|g| {
            let param = g.parameter_mut(&path, parameter)?;
            if !is_pulse_style(&param.style) {
                return Err(Error::validation(format!(
                    "Parameter is not a pulse: {}.{}",
                    path, parameter
                )));
            }
            *g.pulses.entry((path, parameter.to_string())).or_insert(0) += 1;
            Ok(())
        })
    }

    async fn run_script(&self, code: &str) -> Result<()> {
        if code.trim().is_empty() {
            return Err(Error::validation("Script body is empty"));
        }
        self.with_graph_write(|g| g.scripts.push(code.to_string()));
        Ok(())
    }

    async fn timeline(&self, command: TimelineCommand) -> Result<TimelineStatus> {
        self.with_graph_write(|g| {
            let t = &mut g.timeline;
            match command {
                TimelineCommand::Play => t.playing = true,
                TimelineCommand::Pause => t.playing = false,
                TimelineCommand::Stop => {
                    t.playing = false;
                    t.frame = 1;
                }
                TimelineCommand::JumpFrame { frame } => t.frame = frame.max(1),
                TimelineCommand::SetRate { rate } => {
                    if !(rate.is_finite() && rate > 0.0) {
                        return Err(Error::validation(format!("Invalid timeline rate: {}", rate)));
                    }
                    t.rate = rate;
                }
                TimelineCommand::ToggleLoop => t.looping = !t.looping,
            }
            Ok(*t)
        })
    }

    async fn timeline_status(&self) -> Result<TimelineStatus> {
        Ok(self.with_graph_read(|g| g.timeline))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.with_graph_read(|g| g.components.len());
        f.debug_struct("MemoryStore")
            .field("components", &count)
            .finish_non_exhaustive()
    }
}

/// Builders shared by tests across the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn float(name: &str, value: f64) -> HostParameter {
        HostParameter {
            name: name.to_string(),
            label: name.to_string(),
            style: "Float".to_string(),
            value: ParamValue::Float(value),
            min: Some(0.0),
            max: Some(1.0),
            menu_names: Vec::new(),
            menu_labels: Vec::new(),
            read_only: false,
        }
    }

    pub fn param(name: &str, style: &str, value: ParamValue) -> HostParameter {
        HostParameter {
            name: name.to_string(),
            label: name.to_string(),
            style: style.to_string(),
            value,
            min: None,
            max: None,
            menu_names: Vec::new(),
            menu_labels: Vec::new(),
            read_only: false,
        }
    }

    pub fn page(name: &str, parameters: Vec<HostParameter>) -> HostPage {
        HostPage {
            name: name.to_string(),
            parameters,
        }
    }

    /// `/root/a` with two floats, `/root/b` with nothing, `/root/c` with a toggle and a pulse.
    pub fn sample_store() -> MemoryStore {
        let store = MemoryStore::new("test");
        store
            .add_component(
                "/root/a",
                vec![page("Controls", vec![float("speed", 0.5), float("gain", 0.25)])],
            )
            .unwrap();
        store.add_component("/root/b", Vec::new()).unwrap();
        store
            .add_component(
                "/root/c",
                vec![page(
                    "Switches",
                    vec![
                        param("active", "Toggle", ParamValue::Bool(false)),
                        param("reset", "Pulse", ParamValue::Bool(false)),
                    ],
                )],
            )
            .unwrap();
        store
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_ancestors_are_created() {
        let store = sample_store();
        assert!(store.exists("/root").await.unwrap());
        assert!(!store.exists("/nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_components_respects_depth() {
        let store = sample_store();
        store.add_component("/root/a/deep", vec![page("P", vec![float("x", 0.0)])]).unwrap();
        let shallow = store.find_components("/root", 1).await.unwrap();
        assert_eq!(shallow, vec!["/root/a", "/root/b", "/root/c"]);
        let deep = store.find_components("/root", 2).await.unwrap();
        assert!(deep.contains(&"/root/a/deep".to_string()));
    }

    #[tokio::test]
    async fn test_set_coerces_by_style() {
        let store = sample_store();
        store.set("/root/a", "speed", ParamValue::Int(1)).await.unwrap();
        assert_eq!(store.get("/root/a", "speed").await.unwrap(), ParamValue::Float(1.0));
        store.set("/root/c", "active", ParamValue::Int(1)).await.unwrap();
        assert_eq!(store.get("/root/c", "active").await.unwrap(), ParamValue::Bool(true));
        let err = store.set("/root/a", "speed", ParamValue::Text("fast".into())).await;
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_read_only_rejected() {
        let store = MemoryStore::new("test");
        let mut locked = float("locked", 0.0);
        locked.read_only = true;
        store.add_component("/x", vec![page("P", vec![locked])]).unwrap();
        let err = store.set("/x", "locked", ParamValue::Float(1.0)).await;
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_pulse_counts() {
        let store = sample_store();
        store.pulse("/root/c", "reset").await.unwrap();
        store.pulse("/root/c", "reset").await.unwrap();
        assert_eq!(store.pulse_count("/root/c", "reset"), 2);
        assert!(store.pulse("/root/c", "active").await.is_err());
    }

    #[tokio::test]
    async fn test_timeline_stop_rewinds() {
        let store = MemoryStore::new("test");
        store.timeline(TimelineCommand::Play).await.unwrap();
        store.timeline(TimelineCommand::JumpFrame { frame: 120 }).await.unwrap();
        let status = store.timeline(TimelineCommand::Stop).await.unwrap();
        assert!(!status.playing);
        assert_eq!(status.frame, 1);
    }

    #[tokio::test]
    async fn test_remove_component_drops_subtree() {
        let store = sample_store();
        store.add_component("/root/a/child", Vec::new()).unwrap();
        store.remove_component("/root/a");
        assert!(!store.exists("/root/a/child").await.unwrap());
        assert!(store.exists("/root/b").await.unwrap());
    }

    #[test]
    fn test_scene_parsing() {
        let json = r#"{
            "project": "show",
            "components": [
                {"path": "/project1/lights", "pages": [
                    {"name": "Look", "parameters": [
                        {"name": "dimmer", "style": "Float", "value": 0.8, "min": 0, "max": 1}
                    ]}
                ]}
            ]
        }"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        let store = MemoryStore::from_scene(scene).unwrap();
        let count = store.with_graph_read(|g| g.components.len());
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_scene_values_are_coerced_to_style() {
        let json = r#"{
            "project": "show",
            "components": [
                {"path": "/project1/lights", "pages": [
                    {"name": "Look", "parameters": [
                        {"name": "dimmer", "style": "Float", "value": 1},
                        {"name": "layer", "style": "Int", "value": 2.0},
                        {"name": "on", "style": "Toggle", "value": 1},
                        {"name": "flash", "style": "Pulse", "value": false}
                    ]}
                ]}
            ]
        }"#;
        let store = MemoryStore::from_scene(serde_json::from_str(json).unwrap()).unwrap();
        let lights = "/project1/lights";
        assert_eq!(store.get(lights, "dimmer").await.unwrap(), ParamValue::Float(1.0));
        assert_eq!(store.get(lights, "layer").await.unwrap(), ParamValue::Int(2));
        assert_eq!(store.get(lights, "on").await.unwrap(), ParamValue::Bool(true));
        assert_eq!(store.get(lights, "flash").await.unwrap(), ParamValue::Bool(false));
    }

    #[test]
    fn test_scene_value_that_does_not_fit_is_rejected() {
        let json = r#"{"components": [{"path": "/x", "pages": [{"name": "P", "parameters": [
            {"name": "speed", "style": "Float", "value": "fast"}
        ]}]}]}"#;
        let result = MemoryStore::from_scene(serde_json::from_str(json).unwrap());
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
