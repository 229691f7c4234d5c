//! Feature module registry.
//!
//! Modules are registered explicitly during start-up, ordered by their
//! declared dependencies, then set up in that order. After start-up the
//! registry is read-only: other parts look modules up with
//! [`ModuleRegistry::resolve`].

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Static description of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleManifest {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    /// Route prefix the transport mounts the module under.
    pub prefix: &'static str,
    pub dependencies: &'static [&'static str],
}

#[async_trait]
pub trait BridgeModule: Send + Sync {
    fn manifest(&self) -> ModuleManifest;

    /// Load persisted state and get ready. Returns a short status detail.
    async fn setup(&self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModuleStatus {
    Registered,
    Loaded { detail: String },
    Failed { error: String },
    /// A dependency failed, so setup never ran.
    Skipped { missing: String },
}

impl ModuleStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModuleStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    #[serde(flatten)]
    pub manifest: ModuleManifest,
    pub status: ModuleStatus,
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn BridgeModule>>,
    status: RwLock<BTreeMap<&'static str, ModuleStatus>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn BridgeModule>) -> Result<()> {
        let name = module.manifest().name;
        if self.modules.iter().any(|m| m.manifest().name == name) {
            return Err(Error::Module(format!("Module '{}' registered twice", name)));
        }
        self.status
            .write()
            .expect("Module status lock poisoned")
            .insert(name, ModuleStatus::Registered);
        self.modules.push(module);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn BridgeModule>> {
        self.modules
            .iter()
            .find(|m| m.manifest().name == name)
            .cloned()
    }

    /// Dependency order: every module comes after the modules it depends on.
    /// Ties keep registration order.
    pub fn load_order(&self) -> Result<Vec<Arc<dyn BridgeModule>>> {
        let names: HashSet<&str> = self.modules.iter().map(|m| m.manifest().name).collect();
        for module in &self.modules {
            let manifest = module.manifest();
            if let Some(dep) = manifest.dependencies.iter().find(|d| !names.contains(*d)) {
                return Err(Error::Module(format!(
                    "Module '{}' depends on '{}' which is not registered",
                    manifest.name, dep
                )));
            }
        }

        let mut ordered: Vec<Arc<dyn BridgeModule>> = Vec::with_capacity(self.modules.len());
        let mut placed: HashSet<&str> = HashSet::new();
        while ordered.len() < self.modules.len() {
            let ready = self.modules.iter().find(|m| {
                let manifest = m.manifest();
                !placed.contains(manifest.name)
                    && manifest.dependencies.iter().all(|d| placed.contains(d))
            });
            match ready {
                Some(module) => {
                    placed.insert(module.manifest().name);
                    ordered.push(module.clone());
                }
                None => {
                    let stuck: Vec<&str> = self
                        .modules
                        .iter()
                        .map(|m| m.manifest().name)
                        .filter(|n| !placed.contains(n))
                        .collect();
                    return Err(Error::Module(format!(
                        "Circular module dependency among: {}",
                        stuck.join(", ")
                    )));
                }
            }
        }
        Ok(ordered)
    }

    /// Run every module's setup in dependency order. A failing module does
    /// not stop the others, but modules depending on it are skipped.
    pub async fn setup_all(&self) -> Result<Vec<ModuleInfo>> {
        let order = self.load_order()?;
        for module in &order {
            let manifest = module.manifest();
            let failed_dep = {
                let status = self.status.read().expect("Module status lock poisoned");
                manifest
                    .dependencies
                    .iter()
                    .find(|d| !status.get(*d).map(ModuleStatus::is_loaded).unwrap_or(false))
                    .copied()
            };
            let outcome = match failed_dep {
                Some(dep) => {
                    log::warn!("Skipping module {}: dependency {} not loaded", manifest.name, dep);
                    ModuleStatus::Skipped {
                        missing: dep.to_string(),
                    }
                }
                None => match module.setup().await {
                    Ok(detail) => {
                        log::info!(
                            "Loaded module {} v{} -> {} ({})",
                            manifest.name,
                            manifest.version,
                            manifest.prefix,
                            detail
                        );
                        ModuleStatus::Loaded { detail }
                    }
                    Err(e) => {
                        log::error!("Module {} failed to load: {}", manifest.name, e);
                        ModuleStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                },
            };
            self.status
                .write()
                .expect("Module status lock poisoned")
                .insert(manifest.name, outcome);
        }
        Ok(self.modules())
    }

    /// Manifests and status, in registration order.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        let status = self.status.read().expect("Module status lock poisoned");
        self.modules
            .iter()
            .map(|m| {
                let manifest = m.manifest();
                ModuleInfo {
                    status: status
                        .get(manifest.name)
                        .cloned()
                        .unwrap_or(ModuleStatus::Registered),
                    manifest,
                }
            })
            .collect()
    }
}
