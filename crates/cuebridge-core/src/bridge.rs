//! Composition root tying the host store to every feature module.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::actions::{Action, ActionDispatcher, ActionOutcome, BridgeAction, TriggerAction};
use crate::config::Config;
use crate::cues::CueSequencer;
use crate::error::{Error, Result};
use crate::host::{ComponentStore, HostInfo, MemoryStore};
use crate::osc::{OscListener, OscOutput};
use crate::persist::DocumentStore;
use crate::presets::PresetLibrary;
use crate::registry::{BridgeModule, ModuleInfo, ModuleManifest, ModuleRegistry};
use crate::schema::SchemaAdapter;
use crate::snapshot::SnapshotEngine;
use crate::sync::StateSynchronizer;
use crate::triggers::{BindingSource, ControlKind, TriggerRegistry};

/// Result of firing a physical control.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerFired {
    pub device: String,
    pub control_id: u32,
    pub kind: ControlKind,
    pub source: BindingSource,
    pub label: String,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Every core component, built once and shared by the transports.
pub struct Bridge {
    config: Config,
    store: Arc<dyn ComponentStore>,
    pub schema: SchemaAdapter,
    pub sync: Arc<StateSynchronizer>,
    pub snapshot: SnapshotEngine,
    pub dispatcher: ActionDispatcher,
    pub cues: Arc<CueSequencer>,
    pub presets: Arc<PresetLibrary>,
    pub triggers: TriggerRegistry,
    modules: ModuleRegistry,
}

impl Bridge {
    pub fn new(
        config: Config,
        store: Arc<dyn ComponentStore>,
        docs: DocumentStore,
        osc: OscOutput,
    ) -> Result<Self> {
        let schema =
            SchemaAdapter::new(store.clone()).with_exclusions(config.snapshot.exclude.clone());
        let snapshot = SnapshotEngine::new(schema.clone());
        let dispatcher = ActionDispatcher::new(store.clone(), osc)
            .with_osc_defaults(config.osc.default_host.clone(), config.osc.default_port);
        let sync = Arc::new(StateSynchronizer::new(schema.clone()));
        let presets = Arc::new(PresetLibrary::new(docs.clone(), snapshot.clone()));
        let cues = CueSequencer::new(
            snapshot.clone(),
            dispatcher.clone(),
            docs.clone(),
            config.snapshot.root.clone(),
            config.snapshot.max_depth,
        );
        let triggers = TriggerRegistry::new(docs);

        let mut modules = ModuleRegistry::new();
        modules.register(Arc::new(SyncModule { sync: sync.clone() }))?;
        modules.register(Arc::new(SnapshotModule {
            schema: schema.clone(),
            root: config.snapshot.root.clone(),
        }))?;
        modules.register(Arc::new(PresetsModule {
            presets: presets.clone(),
        }))?;
        modules.register(Arc::new(CuesModule { cues: cues.clone() }))?;
        modules.register(Arc::new(TriggersModule {
            triggers: triggers.clone(),
        }))?;

        Ok(Self {
            config,
            store,
            schema,
            sync,
            snapshot,
            dispatcher,
            cues,
            presets,
            triggers,
            modules,
        })
    }

    /// In-memory bridge over a [`MemoryStore`]; nothing is persisted and
    /// OSC output is discarded.
    pub fn in_memory(store: MemoryStore) -> Result<Self> {
        Self::new(
            Config::default(),
            Arc::new(store),
            DocumentStore::in_memory(),
            OscOutput::noop(),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ComponentStore> {
        &self.store
    }

    /// Set up every module in dependency order.
    pub async fn start(&self) -> Result<Vec<ModuleInfo>> {
        self.modules.setup_all().await
    }

    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.modules.modules()
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn BridgeModule>> {
        self.modules.resolve(name)
    }

    pub async fn info(&self) -> Result<HostInfo> {
        self.store.info().await
    }

    /// Run any trigger-reachable action. `delta` scales nudges (dial detents).
    pub async fn run_trigger_action(
        &self,
        action: &TriggerAction,
        delta: f64,
    ) -> Result<Option<serde_json::Value>> {
        match action {
            TriggerAction::Host(action) => {
                self.dispatcher.run(action).await?;
                Ok(None)
            }
            TriggerAction::Bridge(action) => self.run_bridge_action(action, delta).await.map(Some),
        }
    }

    async fn run_bridge_action(&self, action: &BridgeAction, delta: f64) -> Result<serde_json::Value> {
        let detail = match action {
            BridgeAction::Preset {
                preset_name,
                comp_path,
            } => serde_json::to_value(self.presets.load(preset_name, comp_path, None).await?)?,
            BridgeAction::CueNext => serde_json::to_value(self.cues.next().await?)?,
            BridgeAction::CueBack => serde_json::to_value(self.cues.back().await?)?,
            BridgeAction::CueGo { cue_id } => serde_json::to_value(self.cues.go(cue_id).await?)?,
            BridgeAction::Nudge {
                path,
                parameter,
                step,
            } => {
                let value = self.dispatcher.nudge(path, parameter, step * delta).await?;
                serde_json::json!({ "path": path, "parameter": parameter, "value": value })
            }
        };
        Ok(detail)
    }

    /// Resolve a control through the trigger registry and run its action.
    pub async fn fire_trigger(
        &self,
        device: &str,
        control_id: u32,
        kind: ControlKind,
        delta: Option<f64>,
    ) -> Result<TriggerFired> {
        let resolved = self
            .triggers
            .resolve(device, control_id, kind)
            .ok_or_else(|| {
                Error::not_found(format!("No binding for {} {} {}", device, kind, control_id))
            })?;
        let delta = delta.unwrap_or(1.0);
        log::info!(
            "Trigger {} {} {} -> {} ({:?})",
            device,
            kind,
            control_id,
            resolved.action.kind(),
            resolved.source
        );
        let result = self.run_trigger_action(&resolved.action, delta).await;
        if let Err(e) = &result {
            log::warn!("Trigger action {} failed: {}", resolved.action.kind(), e);
        }
        Ok(TriggerFired {
            device: device.to_string(),
            control_id,
            kind,
            source: resolved.source,
            label: resolved.label,
            outcome: ActionOutcome::from_result(resolved.action.kind(), &result),
            detail: result.ok().flatten(),
        })
    }

    /// Execute inbound OSC commands until the socket fails.
    pub async fn serve_osc(self: Arc<Self>, listener: OscListener) -> Result<()> {
        loop {
            for command in listener.next_command().await? {
                log::debug!("OSC command {}", command.kind());
                if let Err(e) = self.run_trigger_action(&command, 1.0).await {
                    log::warn!("OSC {} command failed: {}", command.kind(), e);
                }
            }
        }
    }

    /// Convenience for scripts and tests: run a plain host action.
    pub async fn execute(&self, action: &Action) -> ActionOutcome {
        self.dispatcher.execute(action).await
    }
}

struct SyncModule {
    sync: Arc<StateSynchronizer>,
}

#[async_trait]
impl BridgeModule for SyncModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name: "sync",
            version: env!("CARGO_PKG_VERSION"),
            description: "Parameter schema, polling and change push",
            prefix: "/ui",
            dependencies: &[],
        }
    }

    async fn setup(&self) -> Result<String> {
        Ok(format!("{} observers", self.sync.observer_count()))
    }
}

struct SnapshotModule {
    schema: SchemaAdapter,
    root: String,
}

#[async_trait]
impl BridgeModule for SnapshotModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name: "snapshot",
            version: env!("CARGO_PKG_VERSION"),
            description: "Subtree capture and best-effort apply",
            prefix: "/snapshot",
            dependencies: &[],
        }
    }

    async fn setup(&self) -> Result<String> {
        // The capture root may legitimately appear later, once the host
        // project is loaded.
        let present = self.schema.store().exists(&self.root).await?;
        Ok(if present {
            format!("capture root {}", self.root)
        } else {
            format!("capture root {} not present yet", self.root)
        })
    }
}

struct PresetsModule {
    presets: Arc<PresetLibrary>,
}

#[async_trait]
impl BridgeModule for PresetsModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name: "presets",
            version: env!("CARGO_PKG_VERSION"),
            description: "Per-component named presets",
            prefix: "/presets",
            dependencies: &["snapshot"],
        }
    }

    async fn setup(&self) -> Result<String> {
        Ok(format!("{} presets", self.presets.count()?))
    }
}

struct CuesModule {
    cues: Arc<CueSequencer>,
}

#[async_trait]
impl BridgeModule for CuesModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name: "cues",
            version: env!("CARGO_PKG_VERSION"),
            description: "Cue list with snapshots, actions and autofollow",
            prefix: "/cues",
            dependencies: &["snapshot", "presets"],
        }
    }

    async fn setup(&self) -> Result<String> {
        Ok(format!("{} cues", self.cues.load().await?))
    }
}

struct TriggersModule {
    triggers: TriggerRegistry,
}

#[async_trait]
impl BridgeModule for TriggersModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name: "triggers",
            version: env!("CARGO_PKG_VERSION"),
            description: "Button panel bindings and pages",
            prefix: "/triggers",
            dependencies: &["cues", "presets"],
        }
    }

    async fn setup(&self) -> Result<String> {
        let bindings = self.triggers.load()?;
        Ok(format!(
            "{} bindings, {} pages",
            bindings,
            self.triggers.list_pages().len()
        ))
    }
}
