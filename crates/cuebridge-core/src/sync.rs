//! Live parameter state synchronization.
//!
//! Keeps any number of observers (polling browsers, WebSocket clients, the
//! button-panel service) eventually consistent with the host without the
//! host knowing about them. Push observers get per-parameter diffs against
//! the last value they were sent; writes go straight to the host and the
//! last writer wins.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::host::{normalize_path, ComponentStore};
use crate::schema::{ComponentSchema, ParamStyle, SchemaAdapter};
use crate::value::ParamValue;

/// Identifies one observer (one WebSocket connection, one poller).
pub type ObserverId = u64;

/// A parameter value transition reported to an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub path: String,
    pub parameter: String,
    pub value: ParamValue,
}

/// Result of one entry of a batch set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeStatus {
    pub path: String,
    pub parameter: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct ObserverState {
    paths: BTreeSet<String>,
    last_known: HashMap<(String, String), ParamValue>,
}

/// Poll/push reconciliation between the host and its observers.
pub struct StateSynchronizer {
    schema: SchemaAdapter,
    observers: DashMap<ObserverId, Arc<Mutex<ObserverState>>>,
    next_id: AtomicU64,
}

impl StateSynchronizer {
    pub fn new(schema: SchemaAdapter) -> Self {
        Self {
            schema,
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn store(&self) -> &Arc<dyn ComponentStore> {
        self.schema.store()
    }

    fn observer(&self, id: ObserverId) -> Result<Arc<Mutex<ObserverState>>> {
        self.observers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(format!("Observer not registered: {}", id)))
    }

    /// Allocate a new observer with an empty subscription.
    pub fn register(&self) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.insert(id, Arc::default());
        log::debug!("Observer {} registered", id);
        id
    }

    pub fn unregister(&self, id: ObserverId) {
        if self.observers.remove(&id).is_some() {
            log::debug!("Observer {} unregistered", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Replace the observer's path set. Registers the observer if needed.
    ///
    /// Last-known values of paths that are no longer subscribed are
    /// forgotten, so re-subscribing later reports their current values again.
    pub async fn subscribe(&self, id: ObserverId, paths: &[String]) -> Vec<String> {
        let observer = self.observers.entry(id).or_default().value().clone();
        let mut state = observer.lock().await;
        state.paths = paths.iter().map(|p| normalize_path(p)).collect();
        let ObserverState { paths, last_known } = &mut *state;
        last_known.retain(|(path, _), _| paths.contains(path));
        state.paths.iter().cloned().collect()
    }

    pub async fn unsubscribe(&self, id: ObserverId) {
        self.subscribe(id, &[]).await;
    }

    pub async fn subscriptions(&self, id: ObserverId) -> Result<Vec<String>> {
        let observer = self.observer(id)?;
        let state = observer.lock().await;
        Ok(state.paths.iter().cloned().collect())
    }

    /// Fresh read of one component, safe to call at any rate.
    pub async fn poll(&self, path: &str) -> Result<ComponentSchema> {
        self.schema.describe(path).await
    }

    /// Parameters of the observer's subscribed components whose value differs
    /// from the last value reported to it.
    ///
    /// Calls for the same observer are serialized, so its stream reports
    /// transitions in the order they were read from the host. Subscribed
    /// components that no longer resolve are skipped and their last-known
    /// values dropped, so they are reported in full if they come back. If the
    /// host cannot be read, nothing is recorded and the error is returned.
    pub async fn push_changes_since(&self, id: ObserverId) -> Result<Vec<ParameterChange>> {
        let observer = self.observer(id)?;
        let mut state = observer.lock().await;

        let mut reads = Vec::with_capacity(state.paths.len());
        let mut vanished = Vec::new();
        for path in &state.paths {
            match self.schema.describe(path).await {
                Ok(schema) => reads.push(schema),
                Err(Error::NotFound(_)) => vanished.push(path.clone()),
                Err(e) => return Err(e),
            }
        }
        if !vanished.is_empty() {
            state
                .last_known
                .retain(|(path, _), _| !vanished.contains(path));
        }

        let mut changes = Vec::new();
        for schema in reads {
            for param in schema.parameters().filter(|p| p.style != ParamStyle::Pulse) {
                let key = (schema.path.clone(), param.name.clone());
                if state.last_known.get(&key) != Some(&param.value) {
                    state.last_known.insert(key, param.value.clone());
                    changes.push(ParameterChange {
                        path: schema.path.clone(),
                        parameter: param.name.clone(),
                        value: param.value.clone(),
                    });
                }
            }
        }
        Ok(changes)
    }

    /// Write on behalf of an observer without echoing the value back to it.
    ///
    /// The observer's pushes wait until the write has landed and the stored
    /// value has been recorded as already known, so the writer sees neither
    /// the value it replaced nor its own write.
    pub async fn set_as(&self, id: ObserverId, change: &ParameterChange) -> Result<()> {
        let observer = match self.observer(id) {
            Ok(observer) => observer,
            Err(_) => return self.set(&change.path, &change.parameter, change.value.clone()).await,
        };
        let mut state = observer.lock().await;
        let path = normalize_path(&change.path);
        self.store()
            .set(&path, &change.parameter, change.value.clone())
            .await?;
        if state.paths.contains(&path) {
            // The host may coerce, so record what it actually stored
            let stored = match self.store().get(&path, &change.parameter).await {
                Ok(value) => value,
                Err(_) => change.value.clone(),
            };
            state.last_known.insert((path, change.parameter.clone()), stored);
        }
        Ok(())
    }

    /// Forward a write to the host. No buffering, no coalescing.
    pub async fn set(&self, path: &str, parameter: &str, value: ParamValue) -> Result<()> {
        self.store().set(&normalize_path(path), parameter, value).await
    }

    /// Apply each change independently; one failure does not stop the rest.
    pub async fn set_batch(&self, changes: &[ParameterChange]) -> Vec<ChangeStatus> {
        let mut results = Vec::with_capacity(changes.len());
        for change in changes {
            let outcome = self
                .set(&change.path, &change.parameter, change.value.clone())
                .await;
            if let Err(e) = &outcome {
                log::debug!("Set {}.{} failed: {}", change.path, change.parameter, e);
            }
            results.push(ChangeStatus {
                path: change.path.clone(),
                parameter: change.parameter.clone(),
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            });
        }
        results
    }

    pub async fn pulse(&self, path: &str, parameter: &str) -> Result<()> {
        self.store().pulse(&normalize_path(path), parameter).await
    }
}
