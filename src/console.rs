//! The console engine.
//!
//! [`Console`] ties the pieces together: keys go through the
//! [`ModalInputController`], submitted lines are recorded in history and
//! dispatched through the [`CommandRegistry`], and transport events are fed
//! to the [`ProtocolRelay`] and the [`SessionBootstrap`]. The engine is
//! synchronous; the host drives it from its own event loop and runs the
//! timers it asks for (see [`Console::take_scheduled`]).
//!
//! # Example
//!
//! ```
//! use nvlv_console::console::{Console, ConsoleOptions};
//! use nvlv_console::output::{MemoryView, Renderable};
//! use nvlv_console::relay::RecordingTransport;
//! use nvlv_console::storage::MemoryStorage;
//!
//! let view = MemoryView::new();
//! let transcript = view.transcript();
//! let mut console = Console::new(
//!     ConsoleOptions::default(),
//!     view,
//!     MemoryStorage::new(),
//!     RecordingTransport::new(),
//! );
//!
//! console.submit("answer = 42").unwrap();
//! console.submit("answer").unwrap();
//! assert_eq!(
//!     transcript.entries().last(),
//!     Some(&Renderable::Value(serde_json::json!(42)))
//! );
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::command::{builtins, evaluate, remote, tokenize, CommandRegistry, Evaluation};
use crate::error::ConsoleError;
use crate::history::{HistoryPicker, HistoryStore};
use crate::modal::{KeyInput, ModalAction, ModalInputController, Mode, Purpose};
use crate::output::{Output, OutputView};
use crate::relay::{
    BootstrapPlan, Inbound, ProtocolRelay, SessionBootstrap, Transport, TransportEvent,
    DEFAULT_URI,
};
use crate::session::{EvalContext, InstanceId, Persistence, Settings, SETTINGS_KEY};
use crate::shadow::{panic_message, CallStackShadow, FailureOrigin, FailureReport};
use crate::storage::Storage;
use crate::Result;

/// Fixed move/resize step.
pub const GEOMETRY_UNIT: f64 = 5.0;

/// Scroll step as a fraction of the view height.
pub const SCROLL_UNIT_RATIO: f64 = 0.2;

/// Host-supplied construction options.
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    /// Namespace for persisted state.
    pub instance_id: InstanceId,
    /// Relay endpoint.
    pub uri: String,
    /// Overrides the persisted history capacity.
    pub hist_max: Option<usize>,
    /// Overrides the persisted error-catching flag.
    pub catch_errors: Option<bool>,
    pub bootstrap: BootstrapPlan,
    /// Quick-pick snippets added at startup.
    pub snippets: Vec<String>,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            instance_id: InstanceId::global(),
            uri: DEFAULT_URI.to_string(),
            hist_max: None,
            catch_errors: None,
            bootstrap: BootstrapPlan::default(),
            snippets: remote::DEFAULT_SNIPPETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Window position and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Timers the engine asks the host to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// The bootstrap grace delay.
    BootstrapGrace,
}

/// A timer request: call [`Console::fire_timer`] once `delay` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub timer: Timer,
    pub delay: Duration,
}

/// Console state visible to command handlers.
pub struct ConsoleCore {
    instance_id: InstanceId,
    output: Output,
    persistence: Persistence,
    settings: Settings,
    env: EvalContext,
    shadow: CallStackShadow,
    modal: ModalInputController,
    history: HistoryStore,
    picker: HistoryPicker,
    relay: ProtocolRelay,
    bootstrap: SessionBootstrap,
    scheduled: Vec<ScheduledTimer>,
}

impl ConsoleCore {
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Expression environment.
    pub fn env(&self) -> &EvalContext {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut EvalContext {
        &mut self.env
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Persist the current settings.
    pub fn save_settings(&mut self) -> bool {
        self.persistence.save_settings(&self.settings)
    }

    /// Update one setting by its persisted name and persist.
    pub fn set_setting(&mut self, key: &str, value: Value) -> Result<()> {
        self.settings.set_field(key, value)?;
        self.shadow.set_enabled(self.settings.catch_errors);
        self.picker.set_limit(self.settings.hist_max);
        self.save_settings();
        Ok(())
    }

    pub fn catch_errors(&self) -> bool {
        self.settings.catch_errors
    }

    /// Toggle error catching, which also toggles call-stack shadowing.
    pub fn set_catch_errors(&mut self, enabled: bool) {
        self.settings.catch_errors = enabled;
        self.shadow.set_enabled(enabled);
        self.save_settings();
    }

    pub fn is_visible(&self) -> bool {
        self.settings.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.settings.visible = visible;
        self.save_settings();
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            left: self.settings.win_left,
            top: self.settings.win_top,
            width: self.settings.win_w,
            height: self.settings.win_h,
        }
    }

    /// Move the window and persist.
    pub fn move_to(&mut self, left: f64, top: f64) {
        self.settings.win_left = left;
        self.settings.win_top = top;
        self.save_settings();
    }

    /// Resize the window and persist. Sizes never go negative.
    pub fn resize_to(&mut self, width: f64, height: f64) {
        self.settings.win_w = width.max(0.0);
        self.settings.win_h = height.max(0.0);
        self.save_settings();
    }

    /// Start an interactive directional session, replacing any running one.
    pub fn begin_directional(&mut self, purpose: Purpose) {
        let unit = match purpose {
            Purpose::Scroll => self.output.view_height() * SCROLL_UNIT_RATIO,
            Purpose::Move | Purpose::Resize => GEOMETRY_UNIT,
        };
        if let Some(previous) = self.modal.begin(purpose, unit) {
            debug!(?previous, ?purpose, "directional session replaced");
        }
        self.output.trace(purpose.usage());
    }

    fn shift(&mut self, purpose: Purpose, dx: f64, dy: f64) {
        match purpose {
            Purpose::Move => {
                self.settings.win_left += dx;
                self.settings.win_top += dy;
            }
            Purpose::Resize => {
                self.settings.win_w = (self.settings.win_w + dx).max(0.0);
                self.settings.win_h = (self.settings.win_h + dy).max(0.0);
            }
            Purpose::Scroll => self.output.scroll_to(dx, dy, true),
        }
    }

    fn finish_directional(&mut self, purpose: Purpose) {
        if purpose != Purpose::Scroll {
            self.save_settings();
        }
        self.output.trace(purpose.exit_message());
    }

    pub fn shadow(&self) -> &CallStackShadow {
        &self.shadow
    }

    pub fn relay(&self) -> &ProtocolRelay {
        &self.relay
    }

    pub fn relay_mut(&mut self) -> &mut ProtocolRelay {
        &mut self.relay
    }

    pub fn bootstrap(&self) -> &SessionBootstrap {
        &self.bootstrap
    }

    /// Open the relay and run the startup sequence.
    pub fn start_bootstrap(&mut self) -> Result<()> {
        if let Some(delay) = self.bootstrap.start(&mut self.relay)? {
            self.scheduled.push(ScheduledTimer {
                timer: Timer::BootstrapGrace,
                delay,
            });
        }
        Ok(())
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn picker(&self) -> &HistoryPicker {
        &self.picker
    }

    fn record(&mut self, line: &str) {
        let slot = self.history.push(&mut self.persistence, line);
        self.settings.hist_mem_idx = slot as i64;
        self.save_settings();
        self.picker.push(line);
        self.modal.reset_browsing();
    }
}

impl std::fmt::Debug for ConsoleCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleCore")
            .field("instance_id", &self.instance_id)
            .field("settings", &self.settings)
            .field("mode", &self.modal.mode())
            .field("relay_state", &self.relay.state())
            .finish_non_exhaustive()
    }
}

/// An embeddable diagnostic console.
#[derive(Debug)]
pub struct Console {
    core: ConsoleCore,
    registry: CommandRegistry,
}

impl Console {
    /// Build a console, loading persisted state from `storage`.
    pub fn new(
        options: ConsoleOptions,
        view: impl OutputView + 'static,
        storage: impl Storage + 'static,
        transport: impl Transport + 'static,
    ) -> Self {
        Self::with_parts(options, view, Box::new(storage), Box::new(transport))
    }

    /// Build a console from boxed collaborators.
    pub fn with_parts(
        options: ConsoleOptions,
        view: impl OutputView + 'static,
        storage: Box<dyn Storage>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let output = Output::new(view);
        let prefix = options.instance_id.storage_prefix();
        let persistence = Persistence::new(storage, prefix.as_str(), output.clone());

        let mut settings = persistence.load_settings();
        if let Some(hist_max) = options.hist_max.filter(|&m| m > 0) {
            settings.hist_max = hist_max;
        }
        if let Some(catch_errors) = options.catch_errors {
            settings.catch_errors = catch_errors;
        }

        let history = HistoryStore::load(&persistence, settings.hist_max, settings.hist_mem_idx);
        settings.hist_mem_idx = history.cursor().map_or(-1, |c| c as i64);
        let picker =
            HistoryPicker::from_oldest_first(history.entries_oldest_first(), settings.hist_max);

        let shadow = CallStackShadow::with_reporter(Arc::new(output.clone()));
        shadow.set_enabled(settings.catch_errors);

        let mut registry = CommandRegistry::new();
        builtins::register(&mut registry);
        remote::register(&mut registry);
        for snippet in &options.snippets {
            registry.add_snippet(snippet);
        }

        info!(
            instance = %options.instance_id,
            prefix = %prefix,
            history = history.len(),
            "console ready"
        );
        output.trace(format!(
            "nvlv console [{}] storage prefix: {}",
            options.instance_id, prefix
        ));
        output.trace_value(settings.to_value());

        Self {
            core: ConsoleCore {
                instance_id: options.instance_id,
                output,
                persistence,
                settings,
                env: EvalContext::new(),
                shadow,
                modal: ModalInputController::new(),
                history,
                picker,
                relay: ProtocolRelay::with_transport(transport, options.uri),
                bootstrap: SessionBootstrap::new(options.bootstrap),
                scheduled: Vec::new(),
            },
            registry,
        }
    }

    pub fn core(&self) -> &ConsoleCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ConsoleCore {
        &mut self.core
    }

    pub fn output(&self) -> &Output {
        &self.core.output
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Register a command. See [`CommandRegistry::register`].
    pub fn register<F>(&mut self, alias: &str, handler: F, quick_pick: bool)
    where
        F: Fn(&mut ConsoleCore, &[String]) -> Result<bool> + Send + Sync + 'static,
    {
        self.registry.register(alias, handler, quick_pick);
    }

    /// Add a quick-pick snippet.
    pub fn add_snippet(&mut self, value: &str) -> bool {
        self.registry.add_snippet(value)
    }

    /// Quick-pick values, most recent first.
    pub fn quick_picks(&self) -> &[String] {
        self.registry.quick_picks()
    }

    /// Current input line.
    pub fn input(&self) -> &str {
        self.core.modal.input()
    }

    /// Caret position in the input line, in characters.
    pub fn caret(&self) -> usize {
        self.core.modal.caret()
    }

    pub fn mode(&self) -> Mode {
        self.core.modal.mode()
    }

    /// Put a quick-pick value in the input line without submitting it.
    pub fn select_quick_pick(&mut self, index: usize) -> bool {
        let Some(value) = self.registry.quick_picks().get(index).cloned() else {
            return false;
        };
        self.core.modal.set_input(value);
        self.core.modal.reset_browsing();
        true
    }

    /// Put a history pick-list entry in the input line without submitting it.
    pub fn select_history(&mut self, index: usize) -> bool {
        let Some(value) = self.core.picker.get(index).map(str::to_string) else {
            return false;
        };
        self.core.modal.set_input(value);
        self.core.modal.reset_browsing();
        true
    }

    /// Feed one key press.
    pub fn handle_key(&mut self, key: KeyInput) -> Result<()> {
        let core = &mut self.core;
        match core.modal.handle_key(key, &core.history) {
            ModalAction::Submit(line) => self.submit(&line),
            ModalAction::Shift { purpose, dx, dy } => {
                core.shift(purpose, dx, dy);
                Ok(())
            }
            ModalAction::Exit(purpose) => {
                core.finish_directional(purpose);
                Ok(())
            }
            ModalAction::Edited | ModalAction::None => Ok(()),
        }
    }

    /// Submit a line as if typed and entered.
    ///
    /// Blank lines are ignored. With error catching disabled, a failing
    /// command is reported and its error returned.
    pub fn submit(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.core.output.trace_input(line);
        self.core.record(line);
        self.dispatch(line)
    }

    fn dispatch(&mut self, line: &str) -> Result<()> {
        let Some((alias, args)) = tokenize(line) else {
            return Ok(());
        };
        if let Some(handler) = self.registry.get(alias) {
            debug!(alias, args = args.len(), "dispatching command");
            let scroll = self.guarded(alias, &args, |core| handler(core, &args))?;
            if scroll == Some(true) {
                self.core.output.scroll_to_bottom();
            }
            return Ok(());
        }

        let source = [line.to_string()];
        match self.guarded("eval", &source, |core| evaluate(line, &mut core.env))? {
            Some(Evaluation::Value(value)) => self.core.output.trace_value(value),
            Some(Evaluation::Quiet) => {}
            None => return Ok(()),
        }
        self.core.output.scroll_to_bottom();
        Ok(())
    }

    /// Run `f` at the dispatch boundary.
    ///
    /// Returns `Ok(None)` when a failure was caught and reported.
    fn guarded<T>(
        &mut self,
        callee: &str,
        args: &[String],
        f: impl FnOnce(&mut ConsoleCore) -> Result<T>,
    ) -> Result<Option<T>> {
        let shadow = self.core.shadow.clone();
        let catching = shadow.is_enabled();
        // A failure some earlier handler recovered from is not this one's.
        shadow.clear_failure_snapshot();
        let core = &mut self.core;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            shadow.apply(callee, args, || f(core))
        }));
        let error = match outcome {
            Ok(Ok(value)) => return Ok(Some(value)),
            Ok(Err(e)) => e,
            Err(payload) => ConsoleError::Panicked(panic_message(payload.as_ref())),
        };

        shadow.report(FailureReport {
            origin: FailureOrigin::Dispatch,
            message: error.to_string(),
            frame: None,
            stack: shadow.take_failure_snapshot(),
        });
        if catching {
            warn!(callee, error = %error, kind = ?error.kind(), "command failed, caught");
            Ok(None)
        } else {
            Err(error)
        }
    }

    /// Feed a transport event to the relay and the bootstrap.
    ///
    /// Returns the decoded envelope for inbound messages that parsed.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Option<Inbound> {
        let core = &mut self.core;
        let inbound = core.relay.handle_event(event.clone(), &core.output);
        if let Err(e) = core.bootstrap.on_event(&event, inbound.as_ref(), &mut core.relay) {
            warn!(error = %e, "bootstrap step failed");
            core.output.log_error(format!("bootstrap: {}", e));
        }
        inbound
    }

    /// Drain timer requests made since the last call.
    pub fn take_scheduled(&mut self) -> Vec<ScheduledTimer> {
        std::mem::take(&mut self.core.scheduled)
    }

    /// Run an elapsed timer.
    pub fn fire_timer(&mut self, timer: Timer) {
        match timer {
            Timer::BootstrapGrace => {
                let core = &mut self.core;
                if let Err(e) = core.bootstrap.on_grace_elapsed(&mut core.relay) {
                    warn!(error = %e, "bootstrap step failed");
                    core.output.log_error(format!("bootstrap: {}", e));
                }
            }
        }
    }

    /// Open the relay and run the startup sequence.
    pub fn start_bootstrap(&mut self) -> Result<()> {
        self.core.start_bootstrap()
    }

    /// Copy of the current settings.
    pub fn settings(&self) -> Settings {
        self.core.settings.clone()
    }

    /// Update one setting by its persisted name.
    pub fn set_setting(&mut self, key: &str, value: Value) -> Result<()> {
        self.core.set_setting(key, value)
    }

    /// Reset settings to their defaults and drop the stored copy.
    ///
    /// Does nothing unless `confirm` is set. History slots are kept.
    pub fn clear_settings(&mut self, confirm: bool) -> bool {
        if !confirm {
            return false;
        }
        let core = &mut self.core;
        let hist_mem_idx = core.settings.hist_mem_idx;
        core.settings = Settings {
            hist_mem_idx,
            ..Settings::default()
        };
        core.shadow.set_enabled(core.settings.catch_errors);
        core.picker.set_limit(core.settings.hist_max);
        info!(prefix = %core.persistence.prefix(), "settings cleared");
        core.persistence.remove(SETTINGS_KEY)
    }

    /// Raw inbound traffic received this session.
    pub fn message_log(&self) -> &str {
        self.core.relay.message_log()
    }

    /// History pick list, newest first.
    pub fn history_entries(&self) -> Vec<String> {
        self.core.picker.entries().map(str::to_string).collect()
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        // Stops unhandled-panic reports to this console's output.
        self.core.shadow.set_enabled(false);
    }
}
