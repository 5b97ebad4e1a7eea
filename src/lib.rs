//! # nvlv-console
//!
//! Embeddable diagnostic console with a relay to a remote debug backend.
//!
//! The console is a command-driven REPL: a registry of aliased commands, a
//! persisted history ring, keyboard-driven modal commands and an opt-in
//! call-stack shadow that reconstructs where a failing command was. A
//! protocol relay multiplexes debugger, shell and generic command channels
//! over one WebSocket connection and routes the backend's replies into the
//! console output.
//!
//! ## Features
//!
//! - **Command registry**: aliases, quick picks, and a small expression fallback
//! - **History**: bounded ring persisted slot by slot, with up/down browsing
//! - **Call-stack shadow**: synthetic stack around traced invocations
//! - **Relay**: tagged JSON envelopes over a single persistent connection
//!
//! ## Quick Start
//!
//! ```
//! use nvlv_console::{Console, ConsoleOptions, MemoryStorage, MemoryView, RecordingTransport};
//!
//! let view = MemoryView::new();
//! let transcript = view.transcript();
//! let transport = RecordingTransport::new();
//! let mut console = Console::new(
//!     ConsoleOptions::default(),
//!     view,
//!     MemoryStorage::new(),
//!     transport.clone(),
//! );
//!
//! console.submit("-open").unwrap();
//! console.submit("! ls -la").unwrap();
//! assert_eq!(
//!     transport.sent().last().unwrap(),
//!     r#"{"ctx":"sh","data":{"cmd":"ls -la"}}"#
//! );
//! assert!(!transcript.is_empty());
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod history;
pub mod logging;
pub mod modal;
pub mod output;
pub mod relay;
pub mod session;
pub mod shadow;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use command::{CommandRegistry, Evaluation};
pub use console::{Console, ConsoleCore, ConsoleOptions, Geometry, ScheduledTimer, Timer};
pub use error::{ConsoleError, ErrorKind, Result};
pub use history::{HistoryBrowser, HistoryPicker, HistoryStore};
pub use modal::{KeyCode, KeyInput, ModalAction, ModalInputController, Mode, Purpose};
pub use output::{MemoryView, Output, OutputView, Renderable, Transcript};
pub use relay::{
    BootstrapPlan, Channel, Inbound, Outbound, Payload, ProtocolRelay, Readiness,
    RecordingTransport, SessionBootstrap, Transport, TransportEvent, WsTransport,
};
pub use session::{ConnectionState, InstanceId, Settings};
pub use shadow::{CallFrame, CallStackShadow, ErrorReporter, FailureReport};
pub use storage::{FileStorage, MemoryStorage, Storage};
