//! OSC in both directions.
//!
//! Outbound: fire-and-forget messages from `osc` actions. Inbound: a thin
//! command surface (`/bridge/...`) that maps onto the same action vocabulary
//! cues and triggers use.

use rosc::{decoder, encoder, OscMessage, OscPacket, OscType};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::actions::{Action, BridgeAction, TriggerAction};
use crate::error::{Error, Result};
use crate::host::split_parameter_address;
use crate::value::ParamValue;

/// Address prefix of inbound commands.
pub const COMMAND_PREFIX: &str = "/bridge";

/// A single OSC argument as written in an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl From<&OscArg> for OscType {
    fn from(arg: &OscArg) -> Self {
        match arg {
            OscArg::Int(i) => OscType::Int(*i),
            OscArg::Float(f) => OscType::Float(*f),
            OscArg::Bool(b) => OscType::Bool(*b),
            OscArg::Str(s) => OscType::String(s.clone()),
        }
    }
}

/// UDP sender for outbound OSC, bound to an ephemeral port.
#[derive(Clone)]
pub struct OscOutput {
    /// `None` in noop mode.
    sock: Option<Arc<UdpSocket>>,
}

impl OscOutput {
    pub async fn bind() -> Result<Self> {
        let sock = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self {
            sock: Some(Arc::new(sock)),
        })
    }

    /// A sender that accepts every message and sends nothing.
    pub fn noop() -> Self {
        Self { sock: None }
    }

    pub fn is_noop(&self) -> bool {
        self.sock.is_none()
    }

    pub fn msg(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        })
    }

    /// Encode and send one message to `host:port`.
    pub async fn send(&self, host: &str, port: u16, addr: &str, args: &[OscArg]) -> Result<()> {
        if !addr.starts_with('/') {
            return Err(Error::validation(format!(
                "OSC address must start with '/': {}",
                addr
            )));
        }
        let Some(sock) = &self.sock else {
            return Ok(());
        };
        let packet = Self::msg(addr, args.iter().map(OscType::from).collect());
        let buf = encoder::encode(&packet)
            .map_err(|e| Error::validation(format!("OSC encode failed: {}", e)))?;
        sock.send_to(&buf, (host, port)).await?;
        log::debug!("OSC out {}:{} {}", host, port, addr);
        Ok(())
    }
}

fn param_value(arg: &OscType) -> Option<ParamValue> {
    match arg {
        OscType::Int(i) => Some(ParamValue::Int(*i as i64)),
        OscType::Long(l) => Some(ParamValue::Int(*l)),
        OscType::Float(f) => Some(ParamValue::Float(*f as f64)),
        OscType::Double(d) => Some(ParamValue::Float(*d)),
        OscType::Bool(b) => Some(ParamValue::Bool(*b)),
        OscType::String(s) => Some(ParamValue::Text(s.clone())),
        _ => None,
    }
}

/// Collapse message arguments into one value; several numbers become a list.
fn args_value(args: &[OscType]) -> Option<ParamValue> {
    match args {
        [] => None,
        [single] => param_value(single),
        many => many
            .iter()
            .map(|a| param_value(a).and_then(|v| v.as_f64()))
            .collect::<Option<Vec<f64>>>()
            .map(ParamValue::List),
    }
}

fn parameter_target(rest: &str) -> Option<(String, String)> {
    split_parameter_address(rest)
}

/// Translate an inbound `/bridge/...` message into an action.
///
/// Returns `None` for anything that is not a well-formed command.
pub fn parse_command(msg: &OscMessage) -> Option<TriggerAction> {
    let rest = msg.addr.strip_prefix(COMMAND_PREFIX)?.strip_prefix('/')?;
    let (verb, tail) = rest.split_once('/').unwrap_or((rest, ""));
    match verb {
        "set" => {
            let (path, parameter) = parameter_target(tail)?;
            let value = args_value(&msg.args)?;
            Some(Action::Parameter { path, parameter, value }.into())
        }
        "pulse" => {
            let (path, parameter) = parameter_target(tail)?;
            Some(Action::Pulse { path, parameter }.into())
        }
        "toggle" => {
            let (path, parameter) = parameter_target(tail)?;
            Some(Action::Toggle { path, parameter }.into())
        }
        "cue" => match tail.split_once('/').unwrap_or((tail, "")) {
            ("next", "") => Some(BridgeAction::CueNext.into()),
            ("back", "") => Some(BridgeAction::CueBack.into()),
            ("go", id) if !id.is_empty() && !id.contains('/') => Some(
                BridgeAction::CueGo {
                    cue_id: id.to_string(),
                }
                .into(),
            ),
            _ => None,
        },
        "preset" => {
            let (name, comp_path) = tail.strip_prefix("load/")?.split_once('/')?;
            if name.is_empty() || comp_path.is_empty() {
                return None;
            }
            Some(
                BridgeAction::Preset {
                    preset_name: name.to_string(),
                    comp_path: format!("/{}", comp_path),
                }
                .into(),
            )
        }
        _ => None,
    }
}

/// Inbound UDP endpoint for `/bridge/...` commands.
pub struct OscListener {
    sock: UdpSocket,
}

impl OscListener {
    pub async fn bind(port: u16) -> Result<Self> {
        let sock = UdpSocket::bind(("0.0.0.0", port)).await?;
        log::info!("OSC command listener on {}", sock.local_addr()?);
        Ok(Self { sock })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.sock.local_addr()?)
    }

    /// Wait for the next recognised command. Bundles are flattened; malformed
    /// packets and unknown addresses are logged and skipped.
    pub async fn next_command(&self) -> Result<Vec<TriggerAction>> {
        let mut buf = [0u8; rosc::decoder::MTU];
        loop {
            let (size, from) = self.sock.recv_from(&mut buf).await?;
            let packet = match decoder::decode_udp(&buf[..size]) {
                Ok((_, packet)) => packet,
                Err(e) => {
                    log::debug!("Dropping malformed OSC packet from {}: {}", from, e);
                    continue;
                }
            };
            let mut messages = Vec::new();
            flatten(packet, &mut messages);
            let commands: Vec<TriggerAction> = messages
                .iter()
                .filter_map(|msg| {
                    let command = parse_command(msg);
                    if command.is_none() {
                        log::warn!("Ignoring unknown OSC command {} from {}", msg.addr, from);
                    }
                    command
                })
                .collect();
            if !commands.is_empty() {
                return Ok(commands);
            }
        }
    }
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}
