//! Connection transports.
//!
//! A [`Transport`] owns at most one connection. Opening is asynchronous: the
//! outcome, every inbound text frame and the eventual close all arrive as
//! [`TransportEvent`]s on a channel the host drains into the console.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::Result;

/// Event raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established.
    Opened,
    /// The connection ended, or could not be established.
    Closed,
    /// A transport error; a `Closed` event follows when the connection is lost.
    Error(String),
    /// An inbound text frame.
    Message(String),
}

/// Sender half handed to transports.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver half drained by the host.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create a transport event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A single persistent connection to the backend.
pub trait Transport: Send {
    /// Start connecting to `uri`, replacing any existing connection.
    fn open(&mut self, uri: &str) -> Result<()>;

    /// Send one text frame.
    ///
    /// Fails with [`ConsoleError::NotConnected`] when no connection is open.
    fn send(&mut self, text: &str) -> Result<()>;

    /// Drop the connection, if any.
    fn close(&mut self);

    /// Check if a connection is established.
    fn is_connected(&self) -> bool;
}

/// WebSocket client transport.
///
/// Each `open` spawns a connection task on the current tokio runtime. The
/// task forwards outbound frames from an internal queue and reports inbound
/// frames and lifecycle changes through the event sender.
pub struct WsTransport {
    events: EventSender,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    connected: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Create a transport reporting to `events`.
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            outgoing: None,
            connected: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Abort the connection task. Returns `true` if it was still running.
    fn stop(&mut self) -> bool {
        self.outgoing = None;
        self.connected.store(false, Ordering::Release);
        match self.task.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }
}

async fn run_connection(
    uri: String,
    events: EventSender,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
) {
    let ws = match tokio_tungstenite::connect_async(uri.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!(uri = %uri, error = %e, "connect failed");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed);
            return;
        }
    };
    info!(uri = %uri, "connected");
    connected.store(true, Ordering::Release);
    let _ = events.send(TransportEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.as_str().to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    let _ = sink.close().await;
    debug!(uri = %uri, "connection task finished");
    let _ = events.send(TransportEvent::Closed);
}

impl Transport for WsTransport {
    fn open(&mut self, uri: &str) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConsoleError::Transport(format!("no async runtime: {}", e)))?;
        // A replaced connection ends silently; the relay is already connecting again.
        self.stop();

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        self.connected = connected.clone();
        self.outgoing = Some(tx);
        self.task = Some(runtime.spawn(run_connection(
            uri.to_string(),
            self.events.clone(),
            rx,
            connected,
        )));
        debug!(uri, "connecting");
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(ConsoleError::NotConnected);
        }
        let outgoing = self.outgoing.as_ref().ok_or(ConsoleError::NotConnected)?;
        outgoing
            .send(text.to_string())
            .map_err(|_| ConsoleError::Transport("connection task has ended".into()))
    }

    fn close(&mut self) {
        // An aborted task never reports its own close.
        if self.stop() {
            debug!("connection closed");
            let _ = self.events.send(TransportEvent::Closed);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Recorded {
    opened: Vec<String>,
    sent: Vec<String>,
    connected: bool,
    refuse: bool,
    closes: usize,
}

/// In-process transport that records traffic.
///
/// Opening marks it connected immediately (unless built with
/// [`RecordingTransport::refusing`]); no events are raised, the host feeds
/// them to the console itself. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose connection attempts never succeed.
    pub fn refusing() -> Self {
        let transport = Self::default();
        transport.with(|r| r.refuse = true);
        transport
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut recorded = self.recorded.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut recorded)
    }

    /// URIs passed to `open`, in order.
    pub fn opened(&self) -> Vec<String> {
        self.with(|r| r.opened.clone())
    }

    /// Frames sent, in order.
    pub fn sent(&self) -> Vec<String> {
        self.with(|r| r.sent.clone())
    }

    /// Frames sent, parsed as JSON.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|s| serde_json::from_str(s).ok())
            .collect()
    }

    /// Forget recorded frames.
    pub fn clear_sent(&self) {
        self.with(|r| r.sent.clear());
    }

    /// Force the connected flag, e.g. to simulate a dropped connection.
    pub fn set_connected(&self, connected: bool) {
        self.with(|r| r.connected = connected);
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.with(|r| r.closes)
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, uri: &str) -> Result<()> {
        self.with(|r| {
            r.opened.push(uri.to_string());
            r.connected = !r.refuse;
        });
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<()> {
        self.with(|r| {
            if !r.connected {
                return Err(ConsoleError::NotConnected);
            }
            r.sent.push(text.to_string());
            Ok(())
        })
    }

    fn close(&mut self) {
        self.with(|r| {
            r.connected = false;
            r.closes += 1;
        });
    }

    fn is_connected(&self) -> bool {
        self.with(|r| r.connected)
    }
}
