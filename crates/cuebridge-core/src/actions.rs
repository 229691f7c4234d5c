//! Action vocabulary shared by cues, trigger bindings and inbound OSC.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::host::{normalize_path, ComponentStore, TimelineCommand, TimelineStatus};
use crate::osc::{OscArg, OscOutput};
use crate::value::ParamValue;

/// Timeline verbs accepted in `timeline` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineVerb {
    Play,
    Pause,
    Stop,
    JumpFrame,
    SetRate,
    ToggleLoop,
}

/// A side effect executed against the host or the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Opaque script body run in host context.
    Python { code: String },
    /// Fire-and-forget outbound OSC message. Host and port fall back to the
    /// configured defaults.
    Osc {
        address: String,
        #[serde(default)]
        args: Vec<OscArg>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },
    Timeline {
        action: TimelineVerb,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rate: Option<f64>,
    },
    Parameter {
        path: String,
        parameter: String,
        value: ParamValue,
    },
    Pulse { path: String, parameter: String },
    /// Flip a boolean parameter based on its current value.
    Toggle { path: String, parameter: String },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Python { .. } => "python",
            Action::Osc { .. } => "osc",
            Action::Timeline { .. } => "timeline",
            Action::Parameter { .. } => "parameter",
            Action::Pulse { .. } => "pulse",
            Action::Toggle { .. } => "toggle",
        }
    }
}

/// Actions that act on the bridge's own state rather than the host.
/// Only reachable from trigger bindings and inbound OSC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeAction {
    Preset { preset_name: String, comp_path: String },
    CueNext,
    CueBack,
    CueGo { cue_id: String },
    /// Add `step` (scaled by the dial delta) to a numeric parameter,
    /// clamped to its range.
    Nudge {
        path: String,
        parameter: String,
        step: f64,
    },
}

impl BridgeAction {
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeAction::Preset { .. } => "preset",
            BridgeAction::CueNext => "cue_next",
            BridgeAction::CueBack => "cue_back",
            BridgeAction::CueGo { .. } => "cue_go",
            BridgeAction::Nudge { .. } => "nudge",
        }
    }
}

/// Everything a trigger binding can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerAction {
    Bridge(BridgeAction),
    Host(Action),
}

impl TriggerAction {
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerAction::Bridge(action) => action.kind(),
            TriggerAction::Host(action) => action.kind(),
        }
    }
}

impl From<Action> for TriggerAction {
    fn from(action: Action) -> Self {
        TriggerAction::Host(action)
    }
}

impl From<BridgeAction> for TriggerAction {
    fn from(action: BridgeAction) -> Self {
        TriggerAction::Bridge(action)
    }
}

/// Result of executing one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn from_result<T>(kind: &str, result: &Result<T>) -> Self {
        Self {
            kind: kind.to_string(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

fn timeline_command(verb: TimelineVerb, frame: Option<i64>, rate: Option<f64>) -> Result<TimelineCommand> {
    Ok(match verb {
        TimelineVerb::Play => TimelineCommand::Play,
        TimelineVerb::Pause => TimelineCommand::Pause,
        TimelineVerb::Stop => TimelineCommand::Stop,
        TimelineVerb::ToggleLoop => TimelineCommand::ToggleLoop,
        TimelineVerb::JumpFrame => TimelineCommand::JumpFrame {
            frame: frame.ok_or_else(|| Error::validation("jump_frame requires 'frame'"))?,
        },
        TimelineVerb::SetRate => TimelineCommand::SetRate {
            rate: rate.ok_or_else(|| Error::validation("set_rate requires 'rate'"))?,
        },
    })
}

/// Stateless executor for [`Action`]s.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn ComponentStore>,
    osc: OscOutput,
    default_osc_host: String,
    default_osc_port: u16,
}

impl ActionDispatcher {
    pub fn new(store: Arc<dyn ComponentStore>, osc: OscOutput) -> Self {
        Self {
            store,
            osc,
            default_osc_host: "127.0.0.1".to_string(),
            default_osc_port: 7000,
        }
    }

    pub fn with_osc_defaults(mut self, host: impl Into<String>, port: u16) -> Self {
        self.default_osc_host = host.into();
        self.default_osc_port = port;
        self
    }

    pub async fn run(&self, action: &Action) -> Result<()> {
        match action {
            Action::Python { code } => self.store.run_script(code).await,
            Action::Osc {
                address,
                args,
                host,
                port,
            } => {
                let host = host.as_deref().unwrap_or(&self.default_osc_host);
                let port = port.unwrap_or(self.default_osc_port);
                self.osc.send(host, port, address, args).await
            }
            Action::Timeline {
                action,
                frame,
                rate,
            } => {
                let command = timeline_command(*action, *frame, *rate)?;
                self.store.timeline(command).await.map(|_| ())
            }
            Action::Parameter {
                path,
                parameter,
                value,
            } => {
                self.store
                    .set(&normalize_path(path), parameter, value.clone())
                    .await
            }
            Action::Pulse { path, parameter } => {
                self.store.pulse(&normalize_path(path), parameter).await
            }
            Action::Toggle { path, parameter } => {
                // Read-then-write; a concurrent writer in between wins or loses
                // like any other write.
                let path = normalize_path(path);
                let current = self.store.get(&path, parameter).await?;
                self.store
                    .set(&path, parameter, ParamValue::Bool(!current.is_truthy()))
                    .await
            }
        }
    }

    /// Execute one action and report its outcome instead of failing.
    pub async fn execute(&self, action: &Action) -> ActionOutcome {
        let result = self.run(action).await;
        if let Err(e) = &result {
            log::warn!("{} action failed: {}", action.kind(), e);
        }
        ActionOutcome::from_result(action.kind(), &result)
    }

    /// Execute in order. One failure never stops the rest.
    pub async fn execute_all(&self, actions: &[Action]) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(actions.len());
        for action in actions {
            outcomes.push(self.execute(action).await);
        }
        outcomes
    }

    /// Move a numeric parameter by `step`, clamped to the host's min/max.
    /// Returns the value written.
    pub async fn nudge(&self, path: &str, parameter: &str, step: f64) -> Result<ParamValue> {
        let path = normalize_path(path);
        let pages = self.store.custom_pages(&path).await?;
        let param = pages
            .iter()
            .flat_map(|p| p.parameters.iter())
            .find(|p| p.name == parameter)
            .ok_or_else(|| Error::not_found(format!("Parameter not found: {}.{}", path, parameter)))?;
        let current = match param.value {
            ParamValue::Int(i) => i as f64,
            ParamValue::Float(f) => f,
            _ => {
                return Err(Error::validation(format!(
                    "Parameter '{}' is not numeric",
                    parameter
                )))
            }
        };
        let mut next = current + step;
        if let Some(min) = param.min {
            next = next.max(min);
        }
        if let Some(max) = param.max {
            next = next.min(max);
        }
        let value = match param.value {
            ParamValue::Int(_) => ParamValue::Int(next.round() as i64),
            _ => ParamValue::Float(next),
        };
        self.store.set(&path, parameter, value.clone()).await?;
        Ok(value)
    }

    pub async fn timeline(&self, command: TimelineCommand) -> Result<TimelineStatus> {
        self.store.timeline(command).await
    }

    pub async fn timeline_status(&self) -> Result<TimelineStatus> {
        self.store.timeline_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures::*;
    use crate::host::MemoryStore;

    fn dispatcher(store: &MemoryStore) -> ActionDispatcher {
        ActionDispatcher::new(Arc::new(store.clone()), OscOutput::noop())
    }

    #[test]
    fn test_action_wire_shape() {
        let action: Action = serde_json::from_str(
            r#"{"type": "parameter", "path": "/root/a", "parameter": "speed", "value": 0.3}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::Parameter {
                path: "/root/a".into(),
                parameter: "speed".into(),
                value: ParamValue::Float(0.3),
            }
        );
        let timeline: Action =
            serde_json::from_str(r#"{"type": "timeline", "action": "jump_frame", "frame": 120}"#)
                .unwrap();
        assert_eq!(timeline.kind(), "timeline");
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let parsed: std::result::Result<Action, _> =
            serde_json::from_str(r#"{"type": "dmx", "universe": 1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_trigger_action_accepts_both_vocabularies() {
        let host: TriggerAction =
            serde_json::from_str(r#"{"type": "pulse", "path": "/root/c", "parameter": "reset"}"#)
                .unwrap();
        assert_eq!(host.kind(), "pulse");
        let bridge: TriggerAction = serde_json::from_str(r#"{"type": "cue_next"}"#).unwrap();
        assert_eq!(bridge, TriggerAction::Bridge(BridgeAction::CueNext));
    }

    #[tokio::test]
    async fn test_toggle_flips_current_value() {
        let store = sample_store();
        let dispatcher = dispatcher(&store);
        let toggle = Action::Toggle {
            path: "/root/c".into(),
            parameter: "active".into(),
        };
        assert!(dispatcher.execute(&toggle).await.success);
        assert_eq!(store.get("/root/c", "active").await.unwrap(), ParamValue::Bool(true));
        assert!(dispatcher.execute(&toggle).await.success);
        assert_eq!(store.get("/root/c", "active").await.unwrap(), ParamValue::Bool(false));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_list() {
        let store = sample_store();
        let dispatcher = dispatcher(&store);
        let outcomes = dispatcher
            .execute_all(&[
                Action::Pulse {
                    path: "/root/missing".into(),
                    parameter: "reset".into(),
                },
                Action::Timeline {
                    action: TimelineVerb::JumpFrame,
                    frame: None,
                    rate: None,
                },
                Action::Pulse {
                    path: "/root/c".into(),
                    parameter: "reset".into(),
                },
                Action::Python {
                    code: "op('x').cook()".into(),
                },
            ])
            .await;
        let success: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(success, vec![false, false, true, true]);
        assert_eq!(store.pulse_count("/root/c", "reset"), 1);
        assert_eq!(store.executed_scripts(), vec!["op('x').cook()"]);
    }

    #[tokio::test]
    async fn test_timeline_actions() {
        let store = sample_store();
        let dispatcher = dispatcher(&store);
        dispatcher
            .run(&Action::Timeline {
                action: TimelineVerb::Play,
                frame: None,
                rate: None,
            })
            .await
            .unwrap();
        dispatcher
            .run(&Action::Timeline {
                action: TimelineVerb::JumpFrame,
                frame: Some(240),
                rate: None,
            })
            .await
            .unwrap();
        let status = dispatcher.timeline_status().await.unwrap();
        assert!(status.playing);
        assert_eq!(status.frame, 240);
    }

    #[tokio::test]
    async fn test_nudge_clamps_to_range() {
        let store = sample_store();
        let dispatcher = dispatcher(&store);
        let value = dispatcher.nudge("/root/a", "speed", 0.75).await.unwrap();
        assert_eq!(value, ParamValue::Float(1.0));
        let value = dispatcher.nudge("/root/a", "speed", -0.25).await.unwrap();
        assert_eq!(value, ParamValue::Float(0.75));
        assert!(matches!(
            dispatcher.nudge("/root/c", "active", 1.0).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_osc_action_uses_defaults() {
        let store = sample_store();
        let dispatcher = dispatcher(&store).with_osc_defaults("127.0.0.1", 9000);
        let outcome = dispatcher
            .execute(&Action::Osc {
                address: "/scene/go".into(),
                args: vec![OscArg::Int(1)],
                host: None,
                port: None,
            })
            .await;
        assert!(outcome.success);
    }
}
