//! REST endpoint handlers, one module per feature.

pub mod cues;
pub mod modules;
pub mod presets;
pub mod snapshot;
pub mod timeline;
pub mod triggers;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support {
    use cuebridge_core::host::{HostPage, HostParameter};
    use cuebridge_core::{Bridge, MemoryStore, ParamValue};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::AppState;

    fn float(name: &str, value: f64) -> HostParameter {
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

    /// `/project1/lights` with `level` 0.5 and `hue` 0.1; `/project1/empty` with nothing.
    pub fn store() -> MemoryStore {
        let store = MemoryStore::new("test");
        store
            .add_component(
                "/project1/lights",
                vec![HostPage {
                    name: "Look".to_string(),
                    parameters: vec![float("level", 0.5), float("hue", 0.1)],
                }],
            )
            .unwrap();
        store.add_component("/project1/empty", Vec::new()).unwrap();
        store
    }

    pub async fn state_with(store: MemoryStore) -> Arc<AppState> {
        let bridge = Arc::new(Bridge::in_memory(store).unwrap());
        bridge.start().await.unwrap();
        Arc::new(AppState {
            bridge,
            push_interval: Duration::from_millis(10),
        })
    }

    pub async fn state() -> Arc<AppState> {
        state_with(store()).await
    }
}
