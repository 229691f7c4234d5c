//! cuebridge-core - live parameter sync and cue orchestration
//!
//! The control-plane logic sitting between a host application's component
//! graph and its operators:
//!
//! - Parameter schema adapter: custom parameters normalized into one schema
//! - State synchronizer: polling reads, batched writes and per-observer change push
//! - Snapshot engine: capture a subtree, apply it back with partial-failure tolerance
//! - Cue sequencer: ordered cues with snapshots, actions and autofollow
//! - Action dispatcher: one action vocabulary for cues, triggers and OSC
//! - Trigger registry: button panel bindings, pages and device directory
//!
//! # Usage as a Library
//!
//! ```no_run
//! use cuebridge_core::{Bridge, MemoryStore};
//!
//! # async fn run() -> cuebridge_core::Result<()> {
//! let bridge = Bridge::in_memory(MemoryStore::new("demo"))?;
//! bridge.start().await?;
//!
//! let snapshot = bridge.snapshot.capture("/project1", 3).await?;
//! let report = bridge.snapshot.apply(&snapshot).await?;
//! println!("applied {} components", report.applied_paths.len());
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod bridge;
pub mod config;
pub mod cues;
pub mod error;
pub mod host;
pub mod osc;
pub mod persist;
pub mod presets;
pub mod registry;
pub mod schema;
pub mod snapshot;
pub mod sync;
pub mod triggers;
pub mod value;

// Re-export main types
pub use actions::{Action, ActionDispatcher, ActionOutcome, BridgeAction, TimelineVerb, TriggerAction};
pub use bridge::{Bridge, TriggerFired};
pub use config::Config;
pub use cues::{Advance, Cue, CueDraft, CueRun, CueSequencer, CueSummary, CurrentCue, SequencerState};
pub use error::{Error, Result};
pub use host::{
    BoundedStore, ComponentStore, HostInfo, MemoryStore, Scene, TimelineCommand, TimelineStatus,
};
pub use osc::{OscArg, OscListener, OscOutput};
pub use persist::DocumentStore;
pub use presets::{Preset, PresetLibrary, PresetLoad};
pub use registry::{BridgeModule, ModuleInfo, ModuleManifest, ModuleRegistry, ModuleStatus};
pub use schema::{ComponentSchema, ParamStyle, ParameterDescriptor, SchemaAdapter};
pub use snapshot::{ApplyReport, Snapshot, SnapshotEngine, SnapshotEntry};
pub use sync::{ChangeStatus, ObserverId, ParameterChange, StateSynchronizer};
pub use triggers::{
    ControlKind, DeviceClass, DeviceReport, Page, PageBinding, PageDraft, TriggerBinding,
    TriggerRegistry,
};
pub use value::ParamValue;
