//! Protocol relay to the process-control backend.
//!
//! [`ProtocolRelay`] owns the single connection and everything that crosses
//! it: outbound commands are framed as tagged [`Outbound`] envelopes, inbound
//! frames are logged, decoded into [`Inbound`] envelopes and routed to the
//! console output by channel.
//!
//! # Example
//!
//! ```
//! use nvlv_console::output::{MemoryView, Output};
//! use nvlv_console::relay::{Channel, ProtocolRelay, RecordingTransport, TransportEvent};
//!
//! let transport = RecordingTransport::new();
//! let mut relay = ProtocolRelay::new(transport.clone(), "ws://localhost:12345/nvlv");
//! let output = Output::new(MemoryView::new());
//!
//! relay.open().unwrap();
//! relay.handle_event(TransportEvent::Opened, &output);
//! relay.send(Channel::Shell, "ls", &["-la"]).unwrap();
//!
//! assert_eq!(transport.sent().last().unwrap(), r#"{"ctx":"sh","data":{"cmd":"ls -la"}}"#);
//! ```

mod bootstrap;
mod envelope;
mod transport;

pub use bootstrap::{BootstrapPhase, BootstrapPlan, Readiness, SessionBootstrap};
pub use envelope::{Channel, DebugBody, Inbound, Outbound, OutboundData, Payload, START_ACK};
pub use transport::{
    event_channel, EventReceiver, EventSender, RecordingTransport, Transport, TransportEvent,
    WsTransport,
};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::output::Output;
use crate::session::ConnectionState;
use crate::Result;

/// Backend endpoint used when none is configured.
pub const DEFAULT_URI: &str = "ws://localhost:12345/nvlv";

/// Shell command issued as soon as the connection opens.
pub const RECON_COMMAND: &str = "pwd";

/// Connection lifecycle, envelope framing and inbound routing.
pub struct ProtocolRelay {
    transport: Box<dyn Transport>,
    uri: String,
    state: ConnectionState,
    message_log: String,
    parse_failures: usize,
}

impl ProtocolRelay {
    /// Create a relay over `transport`, connecting to `uri` when opened.
    pub fn new(transport: impl Transport + 'static, uri: impl Into<String>) -> Self {
        Self::with_transport(Box::new(transport), uri)
    }

    /// Create a relay over a boxed transport.
    pub fn with_transport(transport: Box<dyn Transport>, uri: impl Into<String>) -> Self {
        Self {
            transport,
            uri: uri.into(),
            state: ConnectionState::Closed,
            message_log: String::new(),
            parse_failures: 0,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Change the endpoint used by the next `open`.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start connecting. Reopening while open replaces the connection.
    pub fn open(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connecting {
            debug!(uri = %self.uri, "open ignored, already connecting");
            return Ok(());
        }
        self.state.transition_to(ConnectionState::Connecting);
        info!(uri = %self.uri, "opening relay connection");
        if let Err(e) = self.transport.open(&self.uri) {
            self.state.transition_to(ConnectionState::Closed);
            return Err(e);
        }
        Ok(())
    }

    /// Close the connection. The transport reports the close as an event.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Frame and send a command.
    ///
    /// Fire-and-forget: no reply is awaited. Sending without a connection
    /// fails at the transport and the error is returned as is.
    pub fn send<S: AsRef<str>>(&mut self, channel: Channel, name: &str, args: &[S]) -> Result<()> {
        let text = Outbound::new(channel, name, args).to_json()?;
        self.transport.send(&text)?;
        debug!(%channel, cmd = name, "envelope sent");
        Ok(())
    }

    /// Everything received this session, concatenated.
    pub fn message_log(&self) -> &str {
        &self.message_log
    }

    /// Number of inbound messages dropped as unparseable.
    pub fn parse_failures(&self) -> usize {
        self.parse_failures
    }

    /// Apply a transport event.
    ///
    /// Returns the decoded envelope for inbound messages that parsed.
    pub fn handle_event(&mut self, event: TransportEvent, output: &Output) -> Option<Inbound> {
        match event {
            TransportEvent::Opened => {
                if !self.state.transition_to(ConnectionState::Open) {
                    warn!(state = ?self.state, "unexpected open event");
                    return None;
                }
                info!(uri = %self.uri, "relay connected");
                output.trace("CONNECTED");
                if let Err(e) = self.send::<&str>(Channel::Shell, RECON_COMMAND, &[]) {
                    warn!(error = %e, "reconnaissance command failed");
                    output.log_error(e.to_string());
                }
                None
            }
            TransportEvent::Closed => {
                if self.state.transition_to(ConnectionState::Closed) {
                    info!(uri = %self.uri, "relay disconnected");
                    output.trace("DISCONNECTED");
                }
                None
            }
            TransportEvent::Error(e) => {
                warn!(error = %e, "relay transport error");
                output.trace(format!("Connection error: {}", e));
                None
            }
            TransportEvent::Message(text) => self.receive(&text, output),
        }
    }

    fn receive(&mut self, text: &str, output: &Output) -> Option<Inbound> {
        self.message_log.push_str(text);
        match Inbound::decode(text) {
            Ok(inbound) => {
                debug!(ctx = %inbound.ctx, "envelope received");
                route(&inbound, output);
                Some(inbound)
            }
            Err(e) => {
                self.parse_failures += 1;
                warn!(error = %e, "dropping unparseable message");
                output.log_error(format!("{} (raw: {})", e, text));
                None
            }
        }
    }
}

fn trace_line(output: &Output, line: &Value) {
    match line {
        Value::String(s) => output.trace(s.as_str()),
        other => output.trace_value(other.clone()),
    }
}

/// Render an inbound envelope to the output.
fn route(inbound: &Inbound, output: &Output) {
    match &inbound.payload {
        Payload::Debug { raw, body } => {
            if let Some(raw) = raw {
                output.trace_raw(raw.as_str());
            }
            match body {
                DebugBody::Lines(lines) => lines.iter().for_each(|l| trace_line(output, l)),
                DebugBody::Structured(value) => output.trace_value(value.clone()),
                DebugBody::Empty => {}
            }
        }
        Payload::Error(err) => output.trace_error(err.as_str()),
        Payload::Structured(value) => output.trace_value(value.clone()),
    }
}

impl std::fmt::Debug for ProtocolRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRelay")
            .field("uri", &self.uri)
            .field("state", &self.state)
            .field("parse_failures", &self.parse_failures)
            .finish_non_exhaustive()
    }
}
