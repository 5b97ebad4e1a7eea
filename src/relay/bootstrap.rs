//! Fixed startup sequence for a remote debug target.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Channel, Inbound, ProtocolRelay, TransportEvent};
use crate::error::ConsoleError;
use crate::Result;

/// Backend command starting the debugger against a target.
pub const START_COMMAND: &str = "-gdb-start";
/// Debugger command inserting a breakpoint.
pub const BREAK_COMMAND: &str = "-break-insert";
/// Backend command running the target.
pub const RUN_COMMAND: &str = "-gdb-run";

/// When the bootstrap considers the backend ready for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// Send everything after a fixed grace delay, assuming the backend is up by then.
    #[default]
    Delay,
    /// Wait for the first message after open, then for the start acknowledgement.
    Ack,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Readiness::Ack => "ack",
            Readiness::Delay => "delay",
        })
    }
}

impl FromStr for Readiness {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ack" => Ok(Readiness::Ack),
            "delay" => Ok(Readiness::Delay),
            _ => Err(ConsoleError::InvalidArgument {
                command: "readiness".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// What the bootstrap starts and how it waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// Target the debugger is started against.
    pub target: String,
    /// Symbol the breakpoint is set at.
    pub entry_symbol: String,
    pub readiness: Readiness,
    /// Delay used by [`Readiness::Delay`].
    pub grace_delay: Duration,
}

impl Default for BootstrapPlan {
    fn default() -> Self {
        Self {
            target: "dev_0".to_string(),
            entry_symbol: "main.main".to_string(),
            readiness: Readiness::Delay,
            grace_delay: Duration::from_millis(1000),
        }
    }
}

/// Progress through the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapPhase {
    #[default]
    Idle,
    AwaitingOpen,
    AwaitingFirstMessage,
    AwaitingStartAck,
    AwaitingGrace,
    Done,
}

impl BootstrapPhase {
    /// Check if a sequence is in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self, BootstrapPhase::Idle | BootstrapPhase::Done)
    }
}

/// Drives open → start → breakpoint → run.
///
/// Start and run are backend commands and travel on the `cmd` channel; only
/// the breakpoint goes to the debugger.
#[derive(Debug, Clone, Default)]
pub struct SessionBootstrap {
    plan: BootstrapPlan,
    phase: BootstrapPhase,
}

impl SessionBootstrap {
    pub fn new(plan: BootstrapPlan) -> Self {
        Self {
            plan,
            phase: BootstrapPhase::Idle,
        }
    }

    pub fn plan(&self) -> &BootstrapPlan {
        &self.plan
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// Open the connection and begin waiting.
    ///
    /// Returns the delay after which [`Self::on_grace_elapsed`] must be
    /// called when the plan uses [`Readiness::Delay`].
    pub fn start(&mut self, relay: &mut ProtocolRelay) -> Result<Option<Duration>> {
        if self.phase.is_active() {
            warn!(phase = ?self.phase, "restarting bootstrap");
        }
        relay.open()?;
        info!(
            debug_target = %self.plan.target,
            readiness = %self.plan.readiness,
            "bootstrap started"
        );
        match self.plan.readiness {
            Readiness::Ack => {
                self.phase = BootstrapPhase::AwaitingOpen;
                Ok(None)
            }
            Readiness::Delay => {
                self.phase = BootstrapPhase::AwaitingGrace;
                Ok(Some(self.plan.grace_delay))
            }
        }
    }

    /// Advance on a transport event; `inbound` is the decoded message, if any.
    pub fn on_event(
        &mut self,
        event: &TransportEvent,
        inbound: Option<&Inbound>,
        relay: &mut ProtocolRelay,
    ) -> Result<()> {
        match (self.phase, event) {
            (phase, TransportEvent::Closed) if phase.is_active() => {
                warn!(phase = ?phase, "bootstrap abandoned, connection closed");
                self.phase = BootstrapPhase::Idle;
            }
            (BootstrapPhase::AwaitingOpen, TransportEvent::Opened) => {
                self.phase = BootstrapPhase::AwaitingFirstMessage;
            }
            (BootstrapPhase::AwaitingFirstMessage, TransportEvent::Message(_))
                if inbound.is_some() =>
            {
                self.phase = BootstrapPhase::AwaitingStartAck;
                self.send_start(relay)?;
            }
            (BootstrapPhase::AwaitingStartAck, TransportEvent::Message(_))
                if inbound.is_some_and(Inbound::is_start_ack) =>
            {
                self.phase = BootstrapPhase::Done;
                self.send_breakpoint(relay)?;
                self.send_run(relay)?;
                info!("bootstrap complete");
            }
            _ => {}
        }
        Ok(())
    }

    /// Send the whole sequence once the grace delay has passed.
    pub fn on_grace_elapsed(&mut self, relay: &mut ProtocolRelay) -> Result<()> {
        if self.phase != BootstrapPhase::AwaitingGrace {
            return Ok(());
        }
        self.phase = BootstrapPhase::Done;
        self.send_start(relay)?;
        self.send_breakpoint(relay)?;
        self.send_run(relay)?;
        info!("bootstrap complete");
        Ok(())
    }

    fn send_start(&self, relay: &mut ProtocolRelay) -> Result<()> {
        relay.send(Channel::Generic, START_COMMAND, &[self.plan.target.as_str()])
    }

    fn send_breakpoint(&self, relay: &mut ProtocolRelay) -> Result<()> {
        relay.send(Channel::Debug, BREAK_COMMAND, &[self.plan.entry_symbol.as_str()])
    }

    fn send_run(&self, relay: &mut ProtocolRelay) -> Result<()> {
        relay.send::<&str>(Channel::Generic, RUN_COMMAND, &[])
    }
}
