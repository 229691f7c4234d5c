//! Named parameter presets, one component each.
//!
//! A preset is identified by `(name, comp_path)`; the same name may exist on
//! any number of components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::host::normalize_path;
use crate::persist::{now_timestamp, DocumentStore};
use crate::snapshot::{ComponentApply, SnapshotEngine};
use crate::value::ParamValue;

const NAMESPACE: &str = "presets";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub comp_path: String,
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
}

impl Preset {
    fn is(&self, name: &str, comp_path: &str) -> bool {
        self.name == name && self.comp_path == comp_path
    }
}

/// Outcome of loading a preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetLoad {
    pub name: String,
    pub comp_path: String,
    /// Component the values were written to.
    pub target: String,
    #[serde(flatten)]
    pub result: ComponentApply,
}

pub struct PresetLibrary {
    docs: DocumentStore,
    snapshot: SnapshotEngine,
    write_lock: Mutex<()>,
}

impl PresetLibrary {
    pub fn new(docs: DocumentStore, snapshot: SnapshotEngine) -> Self {
        Self {
            docs,
            snapshot,
            write_lock: Mutex::new(()),
        }
    }

    fn all(&self) -> Result<Vec<Preset>> {
        self.docs.load(NAMESPACE)
    }

    /// Number of stored presets; also validates the stored document.
    pub fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    /// All presets, or those of one component.
    pub fn list(&self, comp_path: Option<&str>) -> Result<Vec<Preset>> {
        let filter = comp_path.map(normalize_path);
        let mut presets = self.all()?;
        if let Some(path) = filter {
            presets.retain(|p| p.comp_path == path);
        }
        presets.sort_by(|a, b| (&a.comp_path, &a.name).cmp(&(&b.comp_path, &b.name)));
        Ok(presets)
    }

    pub fn get(&self, name: &str, comp_path: &str) -> Result<Preset> {
        let comp_path = normalize_path(comp_path);
        self.all()?
            .into_iter()
            .find(|p| p.is(name, &comp_path))
            .ok_or_else(|| {
                Error::not_found(format!("Preset '{}' not found on {}", name, comp_path))
            })
    }

    /// Capture the component's current values under `name`, replacing any
    /// preset of the same name on that component.
    pub async fn save(&self, name: &str, comp_path: &str) -> Result<Preset> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Preset name must not be empty"));
        }
        let comp_path = normalize_path(comp_path);
        let params = self.snapshot.capture_component(&comp_path).await?;

        let _guard = self.write_lock.lock().await;
        let mut presets = self.all()?;
        let now = now_timestamp();
        let preset = match presets.iter_mut().find(|p| p.is(name, &comp_path)) {
            Some(existing) => {
                existing.params = params;
                existing.modified = now;
                existing.clone()
            }
            None => {
                let preset = Preset {
                    name: name.to_string(),
                    comp_path: comp_path.clone(),
                    params,
                    created: now.clone(),
                    modified: now,
                };
                presets.push(preset.clone());
                preset
            }
        };
        self.docs.save(NAMESPACE, &presets)?;
        log::info!("Saved preset '{}' for {}", name, comp_path);
        Ok(preset)
    }

    /// Write a preset's values back. With a `target`, the values go to that
    /// component instead; parameters it lacks are reported, not fatal.
    pub async fn load(&self, name: &str, comp_path: &str, target: Option<&str>) -> Result<PresetLoad> {
        let preset = self.get(name, comp_path)?;
        let target = target
            .map(normalize_path)
            .unwrap_or_else(|| preset.comp_path.clone());
        let result = self.snapshot.apply_params(&target, &preset.params).await?;
        if !result.failed.is_empty() {
            log::warn!(
                "Preset '{}' loaded onto {} with {} failed parameters",
                name,
                target,
                result.failed.len()
            );
        }
        Ok(PresetLoad {
            name: preset.name,
            comp_path: preset.comp_path,
            target,
            result,
        })
    }

    pub async fn delete(&self, name: &str, comp_path: &str) -> Result<Preset> {
        let comp_path = normalize_path(comp_path);
        let _guard = self.write_lock.lock().await;
        let mut presets = self.all()?;
        let pos = presets
            .iter()
            .position(|p| p.is(name, &comp_path))
            .ok_or_else(|| {
                Error::not_found(format!("Preset '{}' not found on {}", name, comp_path))
            })?;
        let removed = presets.remove(pos);
        self.docs.save(NAMESPACE, &presets)?;
        log::info!("Deleted preset '{}' for {}", name, comp_path);
        Ok(removed)
    }
}
