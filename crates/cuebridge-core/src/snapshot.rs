//! Snapshot capture and best-effort apply.
//!
//! Snapshots outlive the graph they were taken from: components get renamed
//! or deleted while cues and presets still reference them. Apply therefore
//! never fails as a whole because of one bad path; it reports per path and
//! per parameter and keeps going.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::host::normalize_path;
use crate::schema::{ComponentSchema, SchemaAdapter};
use crate::value::ParamValue;

fn default_enabled() -> bool {
    true
}

/// Captured parameters of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Disabled entries are kept but skipped on apply.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl SnapshotEntry {
    pub fn new(name: impl Into<String>, params: BTreeMap<String, ParamValue>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
            params,
        }
    }
}

/// Point-in-time copy of component path → captured parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub entries: BTreeMap<String, SnapshotEntry>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.entries.values().filter(|e| e.enabled).count()
    }

    pub fn get(&self, path: &str) -> Option<&SnapshotEntry> {
        self.entries.get(&normalize_path(path))
    }

    pub fn insert(&mut self, path: &str, entry: SnapshotEntry) {
        self.entries.insert(normalize_path(path), entry);
    }

    /// Soft-disable or re-enable an entry without dropping its data.
    pub fn set_enabled(&mut self, path: &str, enabled: bool) -> bool {
        match self.entries.get_mut(&normalize_path(path)) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

/// Outcome of applying parameters to a single component.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentApply {
    pub applied: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

/// Outcome of applying a whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub applied_paths: Vec<String>,
    pub failed_paths: BTreeMap<String, String>,
    /// Per-parameter failures on components that did resolve.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_failures: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_paths: Vec<String>,
}

impl ApplyReport {
    /// True when nothing failed at either level.
    pub fn is_complete(&self) -> bool {
        self.failed_paths.is_empty() && self.parameter_failures.is_empty()
    }
}

/// Builds snapshots from the live graph and writes them back.
#[derive(Clone)]
pub struct SnapshotEngine {
    schema: SchemaAdapter,
}

impl SnapshotEngine {
    pub fn new(schema: SchemaAdapter) -> Self {
        Self { schema }
    }

    fn entry_from_schema(schema: &ComponentSchema) -> Option<SnapshotEntry> {
        let params: BTreeMap<String, ParamValue> = schema
            .parameters()
            .filter(|p| p.is_capturable())
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        (!params.is_empty()).then(|| SnapshotEntry::new(schema.name.clone(), params))
    }

    /// Capture every component below `root` (down to `max_depth`) that has
    /// at least one capturable custom parameter. Components without any are
    /// left out entirely.
    pub async fn capture(&self, root: &str, max_depth: usize) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();
        for schema in self.schema.describe_subtree(root, max_depth).await? {
            if let Some(entry) = Self::entry_from_schema(&schema) {
                snapshot.entries.insert(schema.path.clone(), entry);
            }
        }
        log::debug!(
            "Captured {} components under {} (depth {})",
            snapshot.len(),
            root,
            max_depth
        );
        Ok(snapshot)
    }

    /// Capture the parameters of a single component.
    pub async fn capture_component(&self, path: &str) -> Result<BTreeMap<String, ParamValue>> {
        let schema = self.schema.describe(path).await?;
        Ok(Self::entry_from_schema(&schema)
            .map(|entry| entry.params)
            .unwrap_or_default())
    }

    /// Set each parameter on one component, collecting per-parameter failures.
    ///
    /// Returns [`Error::NotFound`] if the component does not resolve and
    /// [`Error::HostUnreachable`] if the host stops answering.
    pub async fn apply_params(
        &self,
        path: &str,
        params: &BTreeMap<String, ParamValue>,
    ) -> Result<ComponentApply> {
        let path = normalize_path(path);
        let store = self.schema.store();
        if !store.exists(&path).await? {
            return Err(Error::not_found(format!("Component not found: {}", path)));
        }
        let mut outcome = ComponentApply::default();
        for (name, value) in params {
            match store.set(&path, name, value.clone()).await {
                Ok(()) => outcome.applied.push(name.clone()),
                Err(e @ Error::HostUnreachable(_)) => return Err(e),
                Err(e) => {
                    outcome.failed.insert(name.clone(), e.to_string());
                }
            }
        }
        Ok(outcome)
    }

    /// Apply every enabled entry. Missing components are recorded and skipped.
    pub async fn apply(&self, snapshot: &Snapshot) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for (path, entry) in &snapshot.entries {
            if !entry.enabled {
                report.skipped_paths.push(path.clone());
                continue;
            }
            match self.apply_params(path, &entry.params).await {
                Ok(outcome) => {
                    report.applied_paths.push(path.clone());
                    if !outcome.failed.is_empty() {
                        report.parameter_failures.insert(path.clone(), outcome.failed);
                    }
                }
                Err(Error::NotFound(reason)) => {
                    report.failed_paths.insert(path.clone(), reason);
                }
                Err(e @ Error::HostUnreachable(_)) => return Err(e),
                Err(e) => {
                    report.failed_paths.insert(path.clone(), e.to_string());
                }
            }
        }
        if !report.is_complete() {
            log::warn!(
                "Snapshot applied partially: {} ok, {} missing, {} with parameter errors",
                report.applied_paths.len(),
                report.failed_paths.len(),
                report.parameter_failures.len()
            );
        }
        Ok(report)
    }
}
