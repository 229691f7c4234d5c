//! Cue list and sequencer.
//!
//! Cues are ordered by a dense 1-based `index` and referenced externally by
//! their immutable `id`. The current-cue pointer tracks an id, so reordering
//! never moves it to a different cue. At most one autofollow timer is armed
//! at a time; every go/next/back/stop, and deleting the current cue,
//! supersedes it.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::actions::{ActionDispatcher, ActionOutcome, Action};
use crate::error::{Error, Result};
use crate::persist::{now_timestamp, DocumentStore};
use crate::snapshot::{ApplyReport, Snapshot, SnapshotEngine};

const NAMESPACE: &str = "cues";

/// One show step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: String,
    pub index: usize,
    pub name: String,
    /// Seconds before autofollow advances.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub autofollow: bool,
    #[serde(default)]
    pub snapshot: Snapshot,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
}

impl Cue {
    fn arms_timer(&self) -> bool {
        self.autofollow && self.duration > 0.0
    }
}

/// Listing view of a cue without its snapshot body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueSummary {
    pub id: String,
    pub index: usize,
    pub name: String,
    pub duration: f64,
    pub autofollow: bool,
    pub action_count: usize,
    pub component_count: usize,
    pub enabled_count: usize,
    pub created: String,
    pub modified: String,
}

impl From<&Cue> for CueSummary {
    fn from(cue: &Cue) -> Self {
        Self {
            id: cue.id.clone(),
            index: cue.index,
            name: cue.name.clone(),
            duration: cue.duration,
            autofollow: cue.autofollow,
            action_count: cue.actions.len(),
            component_count: cue.snapshot.len(),
            enabled_count: cue.snapshot.enabled_count(),
            created: cue.created.clone(),
            modified: cue.modified.clone(),
        }
    }
}

/// Input of [`CueSequencer::save`]. Without an `id` a new cue is appended.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CueDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub autofollow: bool,
    /// Omitted: keep the existing snapshot, or capture one for a new cue.
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Idle,
    /// An autofollow timer is armed.
    Following,
}

/// What running a cue did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueRun {
    pub cue: CueSummary,
    pub snapshot: ApplyReport,
    pub actions: Vec<ActionOutcome>,
    pub autofollow_armed: bool,
}

/// Result of a relative move.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Advance {
    Ran(CueRun),
    NoCues,
    /// Already at the first/last cue; nothing ran.
    AtBoundary { current_index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentCue {
    pub cue: Option<CueSummary>,
    pub state: SequencerState,
    pub total: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CueDocument {
    cues: Vec<Cue>,
}

struct ArmedTimer {
    cue_id: String,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SequencerInner {
    cues: Vec<Cue>,
    current: Option<String>,
    timer: Option<ArmedTimer>,
    generation: u64,
}

impl SequencerInner {
    fn position(&self, id: &str) -> Option<usize> {
        self.cues.iter().position(|c| c.id == id)
    }

    fn current_position(&self) -> Option<usize> {
        self.current.as_deref().and_then(|id| self.position(id))
    }

    fn renumber(&mut self) {
        for (i, cue) in self.cues.iter_mut().enumerate() {
            cue.index = i + 1;
        }
    }

    fn state(&self) -> SequencerState {
        if self.timer.is_some() {
            SequencerState::Following
        } else {
            SequencerState::Idle
        }
    }

    fn cancel_timer(&mut self, reason: &str) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
            log::debug!("Autofollow of cue {} cancelled ({})", timer.cue_id, reason);
        }
    }
}

/// Ordered cue list with a current pointer and autofollow.
pub struct CueSequencer {
    inner: Mutex<SequencerInner>,
    snapshot: SnapshotEngine,
    dispatcher: ActionDispatcher,
    docs: DocumentStore,
    capture_root: String,
    capture_depth: usize,
    me: Weak<CueSequencer>,
}

impl CueSequencer {
    pub fn new(
        snapshot: SnapshotEngine,
        dispatcher: ActionDispatcher,
        docs: DocumentStore,
        capture_root: impl Into<String>,
        capture_depth: usize,
    ) -> Arc<Self> {
        let capture_root = capture_root.into();
        Arc::new_cyclic(|me| Self {
            inner: Mutex::default(),
            snapshot,
            dispatcher,
            docs,
            capture_root,
            capture_depth,
            me: me.clone(),
        })
    }

    /// Replace the in-memory list with the persisted one.
    pub async fn load(&self) -> Result<usize> {
        let doc: CueDocument = self.docs.load(NAMESPACE)?;
        let mut inner = self.inner.lock().await;
        inner.cancel_timer("reload");
        inner.cues = doc.cues;
        inner.renumber();
        if inner.current_position().is_none() {
            inner.current = None;
        }
        Ok(inner.cues.len())
    }

    fn persist(&self, inner: &SequencerInner) -> Result<()> {
        self.docs.save(
            NAMESPACE,
            &CueDocument {
                cues: inner.cues.clone(),
            },
        )
    }

    pub async fn list(&self) -> Vec<CueSummary> {
        let inner = self.inner.lock().await;
        inner.cues.iter().map(CueSummary::from).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Cue> {
        let inner = self.inner.lock().await;
        inner
            .position(id)
            .map(|pos| inner.cues[pos].clone())
            .ok_or_else(|| Error::not_found(format!("Cue not found: {}", id)))
    }

    pub async fn current(&self) -> CurrentCue {
        let inner = self.inner.lock().await;
        CurrentCue {
            cue: inner.current_position().map(|pos| CueSummary::from(&inner.cues[pos])),
            state: inner.state(),
            total: inner.cues.len(),
        }
    }

    /// Run the cue with this id.
    pub async fn go(&self, id: &str) -> Result<CueRun> {
        let mut inner = self.inner.lock().await;
        let pos = inner
            .position(id)
            .ok_or_else(|| Error::not_found(format!("Cue not found: {}", id)))?;
        self.run_at(&mut inner, pos).await
    }

    /// Run the cue at a 1-based index.
    pub async fn go_index(&self, index: usize) -> Result<CueRun> {
        let mut inner = self.inner.lock().await;
        if index == 0 || index > inner.cues.len() {
            return Err(Error::not_found(format!("No cue at index {}", index)));
        }
        self.run_at(&mut inner, index - 1).await
    }

    /// Advance to the following cue. Past the last cue this is a no-op.
    pub async fn next(&self) -> Result<Advance> {
        let mut inner = self.inner.lock().await;
        self.step(&mut inner, 1).await
    }

    pub async fn back(&self) -> Result<Advance> {
        let mut inner = self.inner.lock().await;
        self.step(&mut inner, -1).await
    }

    /// Cancel any armed autofollow and go idle. The pointer stays put.
    pub async fn stop(&self) -> CurrentCue {
        let mut inner = self.inner.lock().await;
        inner.cancel_timer("stop");
        CurrentCue {
            cue: inner.current_position().map(|pos| CueSummary::from(&inner.cues[pos])),
            state: inner.state(),
            total: inner.cues.len(),
        }
    }

    async fn step(&self, inner: &mut SequencerInner, delta: isize) -> Result<Advance> {
        if inner.cues.is_empty() {
            inner.cancel_timer("no cues");
            return Ok(Advance::NoCues);
        }
        let target = match (inner.current_position(), delta) {
            (None, d) if d > 0 => Some(0),
            (None, _) => None,
            (Some(pos), d) if d > 0 => (pos + 1 < inner.cues.len()).then_some(pos + 1),
            (Some(pos), _) => pos.checked_sub(1),
        };
        match target {
            Some(pos) => Ok(Advance::Ran(self.run_at(inner, pos).await?)),
            None => {
                inner.cancel_timer("boundary");
                let current_index = inner
                    .current_position()
                    .map(|pos| inner.cues[pos].index)
                    .unwrap_or(0);
                log::debug!("Cue list at boundary (current index {})", current_index);
                Ok(Advance::AtBoundary { current_index })
            }
        }
    }

    async fn run_at(&self, inner: &mut SequencerInner, pos: usize) -> Result<CueRun> {
        inner.cancel_timer("superseded");
        let cue = inner.cues[pos].clone();
        log::info!("GO cue {} '{}' ({})", cue.index, cue.name, cue.id);

        let report = self.snapshot.apply(&cue.snapshot).await?;
        let actions = self.dispatcher.execute_all(&cue.actions).await;
        inner.current = Some(cue.id.clone());

        let armed = cue.arms_timer();
        if armed {
            self.arm_timer(inner, &cue);
        }
        Ok(CueRun {
            cue: CueSummary::from(&cue),
            snapshot: report,
            actions,
            autofollow_armed: armed,
        })
    }

    fn arm_timer(&self, inner: &mut SequencerInner, cue: &Cue) {
        inner.generation += 1;
        let generation = inner.generation;
        let delay = Duration::from_secs_f64(cue.duration);
        let me = self.me.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(sequencer) = me.upgrade() {
                sequencer.autofollow_fire(generation).await;
            }
        });
        log::debug!("Autofollow armed for cue {} ({:?})", cue.id, delay);
        inner.timer = Some(ArmedTimer {
            cue_id: cue.id.clone(),
            generation,
            handle,
        });
    }

    async fn autofollow_fire(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        match &inner.timer {
            Some(timer) if timer.generation == generation => {}
            _ => return,
        }
        if let Some(timer) = inner.timer.take() {
            log::info!("Autofollow from cue {}", timer.cue_id);
        }
        match self.step(&mut inner, 1).await {
            Ok(Advance::Ran(_)) => {}
            Ok(_) => log::info!("Autofollow reached the end of the cue list"),
            Err(e) => log::warn!("Autofollow advance failed: {}", e),
        }
    }

    /// Create or update a cue.
    pub async fn save(&self, draft: CueDraft) -> Result<Cue> {
        if !draft.duration.is_finite() || draft.duration < 0.0 {
            return Err(Error::validation("duration must be a non-negative number"));
        }
        if let Some(id) = &draft.id {
            if id.trim().is_empty() || id.contains('/') {
                return Err(Error::validation(format!("Invalid cue id: {:?}", id)));
            }
        }

        let existing = {
            let inner = self.inner.lock().await;
            draft.id.as_deref().and_then(|id| inner.position(id)).is_some()
        };
        let captured = match (&draft.snapshot, existing) {
            (None, false) => Some(
                self.snapshot
                    .capture(&self.capture_root, self.capture_depth)
                    .await?,
            ),
            _ => None,
        };

        let mut inner = self.inner.lock().await;
        let now = now_timestamp();
        let saved = match draft.id.as_deref().and_then(|id| inner.position(id)) {
            Some(pos) => {
                let cue = &mut inner.cues[pos];
                if !draft.name.is_empty() {
                    cue.name = draft.name;
                }
                cue.duration = draft.duration;
                cue.autofollow = draft.autofollow;
                cue.actions = draft.actions;
                if let Some(snapshot) = draft.snapshot {
                    cue.snapshot = snapshot;
                }
                cue.modified = now;
                cue.clone()
            }
            None => {
                let index = inner.cues.len() + 1;
                let cue = Cue {
                    id: draft
                        .id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    index,
                    name: if draft.name.is_empty() {
                        format!("Cue {}", index)
                    } else {
                        draft.name
                    },
                    duration: draft.duration,
                    autofollow: draft.autofollow,
                    snapshot: draft.snapshot.or(captured).unwrap_or_default(),
                    actions: draft.actions,
                    created: now.clone(),
                    modified: now,
                };
                inner.cues.push(cue.clone());
                cue
            }
        };
        self.persist(&inner)?;
        log::info!("Saved cue {} '{}' ({})", saved.index, saved.name, saved.id);
        Ok(saved)
    }

    /// Remove a cue and close the gap. Deleting the current cue cancels its
    /// autofollow and moves the pointer to the cue now at that position.
    pub async fn delete(&self, id: &str) -> Result<Cue> {
        let mut inner = self.inner.lock().await;
        let pos = inner
            .position(id)
            .ok_or_else(|| Error::not_found(format!("Cue not found: {}", id)))?;
        let was_current = inner.current.as_deref() == Some(id);
        let armed_for_it = inner.timer.as_ref().map(|t| t.cue_id == id).unwrap_or(false);
        if was_current || armed_for_it {
            inner.cancel_timer("cue deleted");
        }
        let removed = inner.cues.remove(pos);
        inner.renumber();
        if was_current {
            inner.current = if inner.cues.is_empty() {
                None
            } else {
                let clamped = pos.min(inner.cues.len() - 1);
                Some(inner.cues[clamped].id.clone())
            };
        }
        self.persist(&inner)?;
        log::info!("Deleted cue '{}' ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// Move a cue to a new 1-based position. Positions past the end clamp.
    pub async fn reorder(&self, id: &str, new_index: usize) -> Result<Vec<CueSummary>> {
        if new_index < 1 {
            return Err(Error::validation("new_index must be at least 1"));
        }
        let mut inner = self.inner.lock().await;
        let pos = inner
            .position(id)
            .ok_or_else(|| Error::not_found(format!("Cue not found: {}", id)))?;
        let target = new_index.min(inner.cues.len()) - 1;
        let cue = inner.cues.remove(pos);
        inner.cues.insert(target, cue);
        inner.renumber();
        self.persist(&inner)?;
        Ok(inner.cues.iter().map(CueSummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures::*;
    use crate::host::{ComponentStore, MemoryStore};
    use crate::osc::OscOutput;
    use crate::schema::SchemaAdapter;
    use crate::value::ParamValue;
    use std::collections::BTreeMap;

    fn sequencer(store: &MemoryStore, docs: DocumentStore) -> Arc<CueSequencer> {
        let store: Arc<dyn ComponentStore> = Arc::new(store.clone());
        CueSequencer::new(
            SnapshotEngine::new(SchemaAdapter::new(store.clone())),
            ActionDispatcher::new(store, OscOutput::noop()),
            docs,
            "/root",
            2,
        )
    }

    fn speed_snapshot(speed: f64) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut params = BTreeMap::new();
        params.insert("speed".to_string(), ParamValue::Float(speed));
        snapshot.insert("/root/a", crate::snapshot::SnapshotEntry::new("a", params));
        snapshot
    }

    fn draft(id: &str, duration: f64, autofollow: bool, speed: f64) -> CueDraft {
        CueDraft {
            id: Some(id.to_string()),
            name: id.to_uppercase(),
            duration,
            autofollow,
            snapshot: Some(speed_snapshot(speed)),
            actions: Vec::new(),
        }
    }

    async fn current_id(seq: &CueSequencer) -> Option<String> {
        seq.current().await.cue.map(|c| c.id)
    }

    fn indices(list: &[CueSummary]) -> Vec<usize> {
        list.iter().map(|c| c.index).collect()
    }

    #[tokio::test]
    async fn test_go_applies_snapshot_and_actions() {
        let store = sample_store();
        let seq = sequencer(&store, DocumentStore::in_memory());
        let mut cue = draft("c1", 0.0, false, 0.9);
        cue.actions.push(Action::Pulse {
            path: "/root/c".into(),
            parameter: "reset".into(),
        });
        cue.actions.push(Action::Pulse {
            path: "/root/gone".into(),
            parameter: "reset".into(),
        });
        seq.save(cue).await.unwrap();

        let run = seq.go("c1").await.unwrap();
        assert_eq!(run.snapshot.applied_paths, vec!["/root/a"]);
        assert_eq!(run.actions.len(), 2);
        assert!(run.actions[0].success);
        assert!(!run.actions[1].success);
        assert_eq!(store.get("/root/a", "speed").await.unwrap(), ParamValue::Float(0.9));
        assert_eq!(current_id(&seq).await.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_go_unknown_cue() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        assert!(matches!(seq.go("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(seq.go_index(1).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_next_and_back_clamp() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        assert_eq!(seq.next().await.unwrap(), Advance::NoCues);
        for id in ["c1", "c2"] {
            seq.save(draft(id, 0.0, false, 0.1)).await.unwrap();
        }
        assert!(matches!(seq.back().await.unwrap(), Advance::AtBoundary { current_index: 0 }));
        assert!(matches!(seq.next().await.unwrap(), Advance::Ran(run) if run.cue.id == "c1"));
        assert!(matches!(seq.next().await.unwrap(), Advance::Ran(run) if run.cue.id == "c2"));
        assert_eq!(
            seq.next().await.unwrap(),
            Advance::AtBoundary { current_index: 2 }
        );
        assert!(matches!(seq.back().await.unwrap(), Advance::Ran(run) if run.cue.id == "c1"));
        assert_eq!(
            seq.back().await.unwrap(),
            Advance::AtBoundary { current_index: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_autofollow_advances() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        seq.save(draft("c1", 5.0, true, 0.1)).await.unwrap();
        seq.save(draft("c2", 0.0, false, 0.2)).await.unwrap();

        let run = seq.go("c1").await.unwrap();
        assert!(run.autofollow_armed);
        assert_eq!(seq.current().await.state, SequencerState::Following);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(current_id(&seq).await.as_deref(), Some("c2"));
        assert_eq!(seq.current().await.state, SequencerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autofollow_from_last_cue_goes_idle() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        seq.save(draft("c1", 1.0, true, 0.1)).await.unwrap();
        seq.go("c1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let current = seq.current().await;
        assert_eq!(current.cue.map(|c| c.id).as_deref(), Some("c1"));
        assert_eq!(current.state, SequencerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_supersedes_armed_timer() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        seq.save(draft("c1", 5.0, true, 0.1)).await.unwrap();
        seq.save(draft("c2", 0.0, false, 0.2)).await.unwrap();
        seq.save(draft("c3", 0.0, false, 0.3)).await.unwrap();

        seq.go("c1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        seq.go("c2").await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(current_id(&seq).await.as_deref(), Some("c2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_autofollow() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        seq.save(draft("c1", 5.0, true, 0.1)).await.unwrap();
        seq.save(draft("c2", 0.0, false, 0.2)).await.unwrap();
        seq.go("c1").await.unwrap();
        assert_eq!(seq.stop().await.state, SequencerState::Idle);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(current_id(&seq).await.as_deref(), Some("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_keeps_pointer_on_same_cue() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        seq.save(draft("c1", 0.0, false, 0.1)).await.unwrap();
        seq.save(draft("c2", 5.0, true, 0.2)).await.unwrap();
        seq.go("c2").await.unwrap();

        let list = seq.reorder("c1", 2).await.unwrap();
        assert_eq!(list[0].id, "c2");
        assert_eq!(list[0].index, 1);
        assert_eq!(list[1].id, "c1");
        assert_eq!(list[1].index, 2);

        let current = seq.current().await;
        let cue = current.cue.unwrap();
        assert_eq!(cue.id, "c2");
        assert_eq!(cue.index, 1);
        assert_eq!(current.state, SequencerState::Following);
    }

    #[tokio::test]
    async fn test_reorder_bounds() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        for id in ["c1", "c2", "c3"] {
            seq.save(draft(id, 0.0, false, 0.1)).await.unwrap();
        }
        assert!(matches!(seq.reorder("c1", 0).await, Err(Error::Validation(_))));
        let list = seq.reorder("c1", 99).await.unwrap();
        assert_eq!(list.last().unwrap().id, "c1");
        assert_eq!(indices(&list), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_indices_stay_dense() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        for id in ["a", "b", "c", "d", "e"] {
            seq.save(draft(id, 0.0, false, 0.1)).await.unwrap();
        }
        seq.delete("b").await.unwrap();
        seq.reorder("e", 1).await.unwrap();
        seq.save(draft("f", 0.0, false, 0.1)).await.unwrap();
        seq.delete("a").await.unwrap();
        seq.reorder("c", 4).await.unwrap();

        let list = seq.list().await;
        assert_eq!(indices(&list), vec![1, 2, 3, 4]);
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["e", "d", "f", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_current_cue() {
        let seq = sequencer(&sample_store(), DocumentStore::in_memory());
        seq.save(draft("c1", 0.0, false, 0.1)).await.unwrap();
        seq.save(draft("c2", 5.0, true, 0.2)).await.unwrap();
        seq.save(draft("c3", 0.0, false, 0.3)).await.unwrap();
        seq.go("c2").await.unwrap();

        seq.delete("c2").await.unwrap();
        let current = seq.current().await;
        assert_eq!(current.state, SequencerState::Idle);
        assert_eq!(current.cue.unwrap().id, "c3");

        seq.delete("c3").await.unwrap();
        assert_eq!(current_id(&seq).await.as_deref(), Some("c1"));
        seq.delete("c1").await.unwrap();
        assert_eq!(current_id(&seq).await, None);
    }

    #[tokio::test]
    async fn test_save_updates_and_creates() {
        let store = sample_store();
        let seq = sequencer(&store, DocumentStore::in_memory());

        let captured = seq
            .save(CueDraft {
                name: "Opening".into(),
                ..CueDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(captured.index, 1);
        assert_eq!(captured.snapshot.len(), 2);
        assert!(!captured.id.is_empty());

        let updated = seq
            .save(CueDraft {
                id: Some(captured.id.clone()),
                duration: 3.0,
                autofollow: true,
                ..CueDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Opening");
        assert_eq!(updated.snapshot, captured.snapshot);
        assert_eq!(updated.created, captured.created);

        let explicit = seq.save(draft("intro", 0.0, false, 0.1)).await.unwrap();
        assert_eq!(explicit.id, "intro");
        assert_eq!(explicit.index, 2);

        assert!(matches!(
            seq.save(CueDraft {
                duration: -1.0,
                ..CueDraft::default()
            })
            .await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_cues_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store();
        let seq = sequencer(&store, DocumentStore::open(dir.path()).unwrap());
        seq.save(draft("c1", 0.0, false, 0.1)).await.unwrap();
        seq.save(draft("c2", 2.0, true, 0.2)).await.unwrap();

        let reloaded = sequencer(&store, DocumentStore::open(dir.path()).unwrap());
        assert_eq!(reloaded.load().await.unwrap(), 2);
        let list = reloaded.list().await;
        assert_eq!(list[1].id, "c2");
        assert!(list[1].autofollow);
        assert_eq!(list[1].component_count, 1);
    }
}
