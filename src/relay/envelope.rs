//! Tagged envelope encoding and decoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConsoleError;
use crate::Result;

/// Logical command channel multiplexed over the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Debugger (gdb/MI) commands.
    #[serde(rename = "gdb")]
    Debug,
    /// Shell commands.
    #[serde(rename = "sh")]
    Shell,
    /// Backend control commands carrying structured arguments.
    #[serde(rename = "cmd")]
    Generic,
}

impl Channel {
    /// Wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Debug => "gdb",
            Channel::Shell => "sh",
            Channel::Generic => "cmd",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gdb" => Ok(Channel::Debug),
            "sh" => Ok(Channel::Shell),
            "cmd" => Ok(Channel::Generic),
            _ => Err(ConsoleError::InvalidArgument {
                command: "channel".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Command body of an outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundData {
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

/// Envelope sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outbound {
    pub ctx: Channel,
    pub data: OutboundData,
}

impl Outbound {
    /// Frame a command for `channel`.
    ///
    /// Debug and shell commands are joined with their arguments into a
    /// single command line. Generic commands keep the arguments apart, and
    /// omit them entirely when there are none.
    pub fn new<S: AsRef<str>>(channel: Channel, name: &str, args: &[S]) -> Self {
        let data = match channel {
            Channel::Debug | Channel::Shell => {
                let mut cmd = name.to_string();
                for arg in args {
                    cmd.push(' ');
                    cmd.push_str(arg.as_ref());
                }
                OutboundData { cmd, args: None }
            }
            Channel::Generic => OutboundData {
                cmd: name.to_string(),
                args: (!args.is_empty())
                    .then(|| args.iter().map(|a| a.as_ref().to_string()).collect()),
            },
        };
        Self { ctx: channel, data }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Body of a debugger-channel reply.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugBody {
    /// Record list, traced one entry per line.
    Lines(Vec<Value>),
    /// Anything else, traced as one value.
    Structured(Value),
    /// Nothing besides the raw text.
    Empty,
}

/// Decoded inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Debugger output: optional raw text plus parsed records.
    Debug { raw: Option<String>, body: DebugBody },
    /// An error reported by the backend.
    Error(String),
    /// Any other payload.
    Structured(Value),
}

/// Envelope received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Channel tag; empty when the backend omitted it.
    pub ctx: String,
    pub payload: Payload,
}

fn error_text(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Inbound {
    /// Parse an inbound message.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ConsoleError::ProtocolParse(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(ConsoleError::ProtocolParse(format!(
                "envelope is not an object: {}",
                text
            )));
        };
        let data = fields
            .remove("Data")
            .ok_or_else(|| ConsoleError::ProtocolParse("envelope has no Data".into()))?;
        let ctx = fields
            .get("Ctx")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Debugger replies carry `err` as part of their record.
        if ctx == Channel::Debug.as_str() {
            return Ok(Self {
                payload: Self::decode_debug(data),
                ctx,
            });
        }
        let payload = match data.get("err").filter(|e| !e.is_null()) {
            Some(err) => Payload::Error(error_text(err)),
            None => Payload::Structured(data),
        };
        Ok(Self { ctx, payload })
    }

    fn decode_debug(data: Value) -> Payload {
        let raw = data.get("raw").map(|r| match r {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let body = match data.get("data") {
            Some(Value::Array(lines)) => DebugBody::Lines(lines.clone()),
            Some(Value::Null) | None if raw.is_some() => DebugBody::Empty,
            Some(Value::Object(nested)) if nested.contains_key("data") => {
                DebugBody::Structured(nested["data"].clone())
            }
            Some(Value::Null) | None => DebugBody::Structured(data.clone()),
            Some(other) => DebugBody::Structured(other.clone()),
        };
        Payload::Debug { raw, body }
    }

    /// Check for the backend's debugger-started acknowledgement.
    pub fn is_start_ack(&self) -> bool {
        self.ctx == Channel::Generic.as_str()
            && matches!(
                &self.payload,
                Payload::Structured(data)
                    if data.get("msg").and_then(Value::as_str) == Some(START_ACK)
            )
    }
}

/// Message the backend sends once the debugger process is running.
pub const START_ACK: &str = "gdb process started";
