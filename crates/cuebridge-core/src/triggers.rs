//! Trigger bindings for button panels and other control surfaces.
//!
//! Three kinds of data are kept apart and never aliased:
//! - live bindings, keyed by device identity (a serial, or `*` for the
//!   template every device falls back to),
//! - pages, named binding sets scoped to a device class,
//! - the record of which page was last activated on which device.
//!
//! Activating a page copies its bindings down onto the device's live
//! bindings. Editing the live bindings afterwards leaves the page untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::actions::TriggerAction;
use crate::error::{Error, Result};
use crate::persist::{now_timestamp, DocumentStore};

/// Device identity of the template binding set.
pub const WILDCARD_DEVICE: &str = "*";

const BINDINGS: &str = "bindings";
const PAGES: &str = "pages";
const ACTIVE_PAGES: &str = "active_pages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Key,
    DialTurn,
    DialPush,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Key => "key",
            ControlKind::DialTurn => "dial_turn",
            ControlKind::DialPush => "dial_push",
        };
        f.write_str(name)
    }
}

/// Hardware family, derived from the reported model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mini,
    Xl,
    Plus,
    Neo,
    Pedal,
    #[default]
    Standard,
}

impl DeviceClass {
    pub fn from_model(model: &str) -> Self {
        let model = model.to_lowercase();
        if model.contains("mini") {
            DeviceClass::Mini
        } else if model.contains("xl") {
            DeviceClass::Xl
        } else if model.contains("plus") || model.contains('+') {
            DeviceClass::Plus
        } else if model.contains("neo") {
            DeviceClass::Neo
        } else if model.contains("pedal") {
            DeviceClass::Pedal
        } else {
            DeviceClass::Standard
        }
    }
}

/// A control on a page, not yet tied to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBinding {
    pub control_id: u32,
    pub kind: ControlKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub display_style: String,
    pub action: TriggerAction,
}

/// A live binding on one device identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerBinding {
    pub device: String,
    #[serde(flatten)]
    pub binding: PageBinding,
}

impl TriggerBinding {
    fn matches(&self, device: &str, control_id: u32, kind: ControlKind) -> bool {
        self.device == device && self.binding.control_id == control_id && self.binding.kind == kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub name: String,
    #[serde(default)]
    pub device_type: DeviceClass,
    #[serde(default)]
    pub bindings: Vec<PageBinding>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageDraft {
    pub name: String,
    #[serde(default)]
    pub device_type: DeviceClass,
    #[serde(default)]
    pub bindings: Vec<PageBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub name: String,
    pub device_type: DeviceClass,
    pub binding_count: usize,
    pub created: String,
    pub modified: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePage {
    pub page: String,
    pub activated: String,
}

/// What the peripheral service reports for one connected device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub serial: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub key_count: u32,
    #[serde(default)]
    pub has_dials: bool,
    #[serde(default)]
    pub has_touchscreen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    #[serde(flatten)]
    pub report: DeviceReport,
    pub class: DeviceClass,
    pub last_seen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_page: Option<String>,
}

/// Where a resolved action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    Device,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTrigger {
    pub source: BindingSource,
    pub label: String,
    pub action: TriggerAction,
}

#[derive(Debug, Default)]
struct RegistryState {
    bindings: Vec<TriggerBinding>,
    pages: Vec<Page>,
    active: BTreeMap<String, ActivePage>,
    devices: BTreeMap<String, DeviceInfo>,
}

/// Binding store and resolver. Devices are live data and are not persisted.
///
/// Mutations persist while still holding the write lock, so the documents on
/// disk are written in the same order the in-memory state changed.
#[derive(Clone)]
pub struct TriggerRegistry {
    docs: DocumentStore,
    state: Arc<RwLock<RegistryState>>,
}

impl TriggerRegistry {
    pub fn new(docs: DocumentStore) -> Self {
        Self {
            docs,
            state: Arc::default(),
        }
    }

    fn with_state_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RegistryState) -> R,
    {
        let state = self.state.read().expect("Trigger registry lock poisoned");
        f(&state)
    }

    fn with_state_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut RegistryState) -> R,
    {
        let mut state = self.state.write().expect("Trigger registry lock poisoned");
        f(&mut state)
    }

    /// Load persisted bindings, pages and activations.
    pub fn load(&self) -> Result<usize> {
        let bindings: Vec<TriggerBinding> = self.docs.load(BINDINGS)?;
        let pages: Vec<Page> = self.docs.load(PAGES)?;
        let active: BTreeMap<String, ActivePage> = self.docs.load(ACTIVE_PAGES)?;
        let count = bindings.len();
        self.with_state_write(|s| {
            s.bindings = bindings;
            s.pages = pages;
            s.active = active;
        });
        Ok(count)
    }

    // === Live bindings ===

    /// Live bindings, optionally for a single device identity.
    pub fn config(&self, device: Option<&str>) -> Vec<TriggerBinding> {
        self.with_state_read(|s| {
            s.bindings
                .iter()
                .filter(|b| device.map_or(true, |d| b.device == d))
                .cloned()
                .collect()
        })
    }

    /// Insert or replace the binding for `(device, control_id, kind)`.
    pub fn set_binding(&self, binding: TriggerBinding) -> Result<TriggerBinding> {
        if binding.device.trim().is_empty() {
            return Err(Error::validation("device must not be empty"));
        }
        self.with_state_write(|s| {
            let b = &binding.binding;
            match s
                .bindings
                .iter_mut()
                .find(|existing| existing.matches(&binding.device, b.control_id, b.kind))
            {
                Some(existing) => *existing = binding.clone(),
                None => s.bindings.push(binding.clone()),
            }
            self.docs.save(BINDINGS, &s.bindings)
        })?;
        Ok(binding)
    }

    /// Remove a live binding. Returns whether one existed.
    pub fn delete_binding(&self, device: &str, control_id: u32, kind: ControlKind) -> Result<bool> {
        self.with_state_write(|s| {
            let before = s.bindings.len();
            s.bindings.retain(|b| !b.matches(device, control_id, kind));
            let deleted = s.bindings.len() != before;
            if deleted {
                self.docs.save(BINDINGS, &s.bindings)?;
            }
            Ok(deleted)
        })
    }

    // === Pages ===

    pub fn list_pages(&self) -> Vec<PageSummary> {
        self.with_state_read(|s| {
            s.pages
                .iter()
                .map(|p| PageSummary {
                    name: p.name.clone(),
                    device_type: p.device_type,
                    binding_count: p.bindings.len(),
                    created: p.created.clone(),
                    modified: p.modified.clone(),
                })
                .collect()
        })
    }

    pub fn get_page(&self, name: &str) -> Result<Page> {
        self.with_state_read(|s| s.pages.iter().find(|p| p.name == name).cloned())
            .ok_or_else(|| Error::not_found(format!("Page not found: {}", name)))
    }

    pub fn save_page(&self, draft: PageDraft) -> Result<Page> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Page name must not be empty"));
        }
        let now = now_timestamp();
        self.with_state_write(|s| {
            let page = match s.pages.iter_mut().find(|p| p.name == name) {
                Some(existing) => {
                    existing.device_type = draft.device_type;
                    existing.bindings = draft.bindings;
                    existing.modified = now;
                    existing.clone()
                }
                None => {
                    let page = Page {
                        name,
                        device_type: draft.device_type,
                        bindings: draft.bindings,
                        created: now.clone(),
                        modified: now,
                    };
                    s.pages.push(page.clone());
                    page
                }
            };
            self.docs.save(PAGES, &s.pages)?;
            Ok(page)
        })
    }

    /// Delete a page template. Bindings already copied onto devices stay.
    pub fn delete_page(&self, name: &str) -> Result<()> {
        self.with_state_write(|s| {
            let pos = s
                .pages
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| Error::not_found(format!("Page not found: {}", name)))?;
            s.pages.remove(pos);
            s.active.retain(|_, a| a.page != name);
            self.docs.save(PAGES, &s.pages)?;
            self.docs.save(ACTIVE_PAGES, &s.active)
        })
    }

    /// Copy a page's bindings onto a device identity, replacing that device's
    /// live bindings.
    pub fn activate_page(&self, device: &str, page_name: &str) -> Result<ActivePage> {
        if device.trim().is_empty() {
            return Err(Error::validation("device must not be empty"));
        }
        let page = self.get_page(page_name)?;
        let known_class = self.with_state_read(|s| s.devices.get(device).map(|d| d.class));
        if let Some(class) = known_class {
            if class != page.device_type {
                return Err(Error::validation(format!(
                    "Page '{}' is for {:?} devices, {} is {:?}",
                    page.name, page.device_type, device, class
                )));
            }
        }

        let activation = ActivePage {
            page: page.name.clone(),
            activated: now_timestamp(),
        };
        self.with_state_write(|s| {
            s.bindings.retain(|b| b.device != device);
            s.bindings.extend(page.bindings.iter().map(|binding| TriggerBinding {
                device: device.to_string(),
                binding: binding.clone(),
            }));
            s.active.insert(device.to_string(), activation.clone());
            if let Some(info) = s.devices.get_mut(device) {
                info.active_page = Some(page.name.clone());
            }
            self.docs.save(BINDINGS, &s.bindings)?;
            self.docs.save(ACTIVE_PAGES, &s.active)
        })?;
        log::info!("Activated page '{}' on {}", page.name, device);
        Ok(activation)
    }

    pub fn active_page(&self, device: &str) -> Option<ActivePage> {
        self.with_state_read(|s| s.active.get(device).cloned())
    }

    pub fn active_pages(&self) -> BTreeMap<String, ActivePage> {
        self.with_state_read(|s| s.active.clone())
    }

    // === Resolution ===

    /// Action bound to a control: the device's own binding first, then the
    /// template binding.
    pub fn resolve(&self, device: &str, control_id: u32, kind: ControlKind) -> Option<ResolvedTrigger> {
        self.with_state_read(|s| {
            let find = |identity: &str| {
                s.bindings
                    .iter()
                    .find(|b| b.matches(identity, control_id, kind))
            };
            let (source, binding) = match find(device) {
                Some(b) => (BindingSource::Device, b),
                None => (BindingSource::Template, find(WILDCARD_DEVICE)?),
            };
            Some(ResolvedTrigger {
                source,
                label: binding.binding.label.clone(),
                action: binding.binding.action.clone(),
            })
        })
    }

    // === Device directory ===

    /// Replace the set of connected devices.
    pub fn report_devices(&self, devices: Vec<DeviceReport>) -> usize {
        let now = now_timestamp();
        self.with_state_write(|s| {
            s.devices = devices
                .into_iter()
                .map(|report| {
                    let info = DeviceInfo {
                        class: DeviceClass::from_model(&report.model),
                        last_seen: now.clone(),
                        active_page: s.active.get(&report.serial).map(|a| a.page.clone()),
                        report,
                    };
                    (info.report.serial.clone(), info)
                })
                .collect();
            s.devices.len()
        })
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.with_state_read(|s| s.devices.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, BridgeAction};

    fn key(control_id: u32, action: TriggerAction) -> PageBinding {
        PageBinding {
            control_id,
            kind: ControlKind::Key,
            label: format!("K{}", control_id),
            display_style: String::new(),
            action,
        }
    }

    fn pulse(parameter: &str) -> TriggerAction {
        Action::Pulse {
            path: "/root/c".into(),
            parameter: parameter.into(),
        }
        .into()
    }

    fn registry() -> TriggerRegistry {
        TriggerRegistry::new(DocumentStore::in_memory())
    }

    #[test]
    fn test_device_class_from_model() {
        assert_eq!(DeviceClass::from_model("Stream Deck Mini"), DeviceClass::Mini);
        assert_eq!(DeviceClass::from_model("Stream Deck XL"), DeviceClass::Xl);
        assert_eq!(DeviceClass::from_model("Stream Deck +"), DeviceClass::Plus);
        assert_eq!(DeviceClass::from_model("Stream Deck Neo"), DeviceClass::Neo);
        assert_eq!(DeviceClass::from_model("Stream Deck Pedal"), DeviceClass::Pedal);
        assert_eq!(DeviceClass::from_model("Stream Deck MK.2"), DeviceClass::Standard);
    }

    #[test]
    fn test_template_fallback() {
        let reg = registry();
        reg.save_page(PageDraft {
            name: "template".into(),
            device_type: DeviceClass::Standard,
            bindings: vec![key(0, BridgeAction::CueNext.into()), key(1, pulse("reset"))],
        })
        .unwrap();
        reg.save_page(PageDraft {
            name: "operator".into(),
            device_type: DeviceClass::Standard,
            bindings: vec![key(0, BridgeAction::CueBack.into())],
        })
        .unwrap();
        reg.activate_page(WILDCARD_DEVICE, "template").unwrap();
        reg.activate_page("SER1", "operator").unwrap();

        let own = reg.resolve("SER1", 0, ControlKind::Key).unwrap();
        assert_eq!(own.source, BindingSource::Device);
        assert_eq!(own.action, TriggerAction::Bridge(BridgeAction::CueBack));

        let fallback = reg.resolve("SER1", 1, ControlKind::Key).unwrap();
        assert_eq!(fallback.source, BindingSource::Template);
        assert_eq!(fallback.action, pulse("reset"));

        assert!(reg.resolve("SER1", 1, ControlKind::DialPush).is_none());
        assert_eq!(
            reg.resolve("OTHER", 0, ControlKind::Key).unwrap().action,
            TriggerAction::Bridge(BridgeAction::CueNext)
        );
    }

    #[test]
    fn test_activation_copies_instead_of_aliasing() {
        let reg = registry();
        reg.save_page(PageDraft {
            name: "p".into(),
            device_type: DeviceClass::Standard,
            bindings: vec![key(3, pulse("reset"))],
        })
        .unwrap();
        reg.activate_page("SER1", "p").unwrap();

        reg.set_binding(TriggerBinding {
            device: "SER1".into(),
            binding: key(3, BridgeAction::CueNext.into()),
        })
        .unwrap();

        assert_eq!(reg.get_page("p").unwrap().bindings[0].action, pulse("reset"));
        assert_eq!(
            reg.resolve("SER1", 3, ControlKind::Key).unwrap().action,
            TriggerAction::Bridge(BridgeAction::CueNext)
        );

        reg.delete_page("p").unwrap();
        assert!(reg.resolve("SER1", 3, ControlKind::Key).is_some());
        assert!(reg.active_page("SER1").is_none());
    }

    #[test]
    fn test_activation_replaces_device_bindings() {
        let reg = registry();
        reg.set_binding(TriggerBinding {
            device: "SER1".into(),
            binding: key(7, pulse("reset")),
        })
        .unwrap();
        reg.save_page(PageDraft {
            name: "p".into(),
            device_type: DeviceClass::Standard,
            bindings: vec![key(0, pulse("reset"))],
        })
        .unwrap();
        reg.activate_page("SER1", "p").unwrap();
        assert!(reg.resolve("SER1", 7, ControlKind::Key).is_none());
        assert_eq!(reg.config(Some("SER1")).len(), 1);
        assert_eq!(reg.active_page("SER1").unwrap().page, "p");
    }

    #[test]
    fn test_activation_checks_device_class() {
        let reg = registry();
        reg.report_devices(vec![DeviceReport {
            serial: "MINI1".into(),
            model: "Stream Deck Mini".into(),
            key_count: 6,
            has_dials: false,
            has_touchscreen: false,
        }]);
        reg.save_page(PageDraft {
            name: "xl".into(),
            device_type: DeviceClass::Xl,
            bindings: Vec::new(),
        })
        .unwrap();
        assert!(matches!(
            reg.activate_page("MINI1", "xl"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            reg.activate_page("MINI1", "missing"),
            Err(Error::NotFound(_))
        ));
        // unknown devices are not checked
        assert!(reg.activate_page("UNSEEN", "xl").is_ok());
    }

    #[test]
    fn test_device_directory() {
        let reg = registry();
        let count = reg.report_devices(vec![
            DeviceReport {
                serial: "A".into(),
                model: "Stream Deck XL".into(),
                key_count: 32,
                has_dials: false,
                has_touchscreen: false,
            },
            DeviceReport {
                serial: "B".into(),
                model: "Stream Deck +".into(),
                key_count: 8,
                has_dials: true,
                has_touchscreen: true,
            },
        ]);
        assert_eq!(count, 2);
        let devices = reg.devices();
        assert_eq!(devices[0].class, DeviceClass::Xl);
        assert_eq!(devices[1].class, DeviceClass::Plus);
        assert!(!devices[0].last_seen.is_empty());

        reg.report_devices(Vec::new());
        assert!(reg.devices().is_empty());
    }

    #[test]
    fn test_delete_binding() {
        let reg = registry();
        reg.set_binding(TriggerBinding {
            device: "*".into(),
            binding: key(1, pulse("reset")),
        })
        .unwrap();
        assert!(reg.delete_binding("*", 1, ControlKind::Key).unwrap());
        assert!(!reg.delete_binding("*", 1, ControlKind::Key).unwrap());
        assert!(reg.config(None).is_empty());
    }

    #[test]
    fn test_state_survives_reload() {
        let docs = DocumentStore::in_memory();
        let reg = TriggerRegistry::new(docs.clone());
        reg.save_page(PageDraft {
            name: "p".into(),
            device_type: DeviceClass::Neo,
            bindings: vec![key(0, pulse("reset"))],
        })
        .unwrap();
        reg.activate_page("SER1", "p").unwrap();

        let reloaded = TriggerRegistry::new(docs);
        assert_eq!(reloaded.load().unwrap(), 1);
        assert_eq!(reloaded.list_pages()[0].device_type, DeviceClass::Neo);
        assert!(reloaded.resolve("SER1", 0, ControlKind::Key).is_some());
        assert_eq!(reloaded.active_page("SER1").unwrap().page, "p");
    }

    #[test]
    fn test_concurrent_binding_writes_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let reg = TriggerRegistry::new(DocumentStore::open(dir.path()).unwrap());

        let writers: Vec<_> = (0..16)
            .map(|control_id| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    reg.set_binding(TriggerBinding {
                        device: "SER1".into(),
                        binding: key(control_id, pulse("reset")),
                    })
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap().unwrap();
        }
        assert_eq!(reg.config(None).len(), 16);

        let reloaded = TriggerRegistry::new(DocumentStore::open(dir.path()).unwrap());
        assert_eq!(reloaded.load().unwrap(), reg.config(None).len());
    }

    #[test]
    fn test_binding_wire_shape() {
        let binding: TriggerBinding = serde_json::from_str(
            r#"{"device": "*", "control_id": 4, "kind": "dial_turn", "label": "Speed",
                "action": {"type": "nudge", "path": "/root/a", "parameter": "speed", "step": 0.01}}"#,
        )
        .unwrap();
        assert_eq!(binding.binding.kind, ControlKind::DialTurn);
        assert_eq!(binding.binding.action.kind(), "nudge");
    }
}
