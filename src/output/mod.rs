//! Console output sink.
//!
//! [`Output`] is a cloneable handle over the host's [`OutputView`]. Command
//! handlers, the relay and the instrumentation reporter all trace through it.
//!
//! # Example
//!
//! ```
//! use nvlv_console::output::{MemoryView, Output, Renderable};
//!
//! let view = MemoryView::new();
//! let transcript = view.transcript();
//! let output = Output::new(view);
//!
//! output.trace("CONNECTED");
//! assert_eq!(transcript.entries(), vec![Renderable::Line("CONNECTED".into())]);
//! ```

mod sanitizer;
mod view;

pub use sanitizer::OutputSanitizer;
pub use view::{MemoryView, OutputView, Renderable, ScrollState, Transcript};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use crate::shadow::{ErrorReporter, FailureOrigin, FailureReport};

/// Banner used for error payloads arriving from the backend.
pub const ERROR_BANNER: &str = "error: --------------";

/// Banner used for failures reported by instrumentation or dispatch.
pub const LOG_ERROR_BANNER: &str = "Log Error:";

/// Banner used for failures caught by the unhandled-failure hook.
pub const UNHANDLED_BANNER: &str = "Unhandled ERROR:";

/// Shared handle to the console's output view.
#[derive(Clone)]
pub struct Output {
    view: Arc<Mutex<Box<dyn OutputView>>>,
}

impl Output {
    /// Wrap a view.
    pub fn new(view: impl OutputView + 'static) -> Self {
        Self {
            view: Arc::new(Mutex::new(Box::new(view))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn OutputView>> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the underlying view.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut dyn OutputView) -> R) -> R {
        let mut view = self.lock();
        f(view.as_mut())
    }

    fn push(view: &mut dyn OutputView, item: Renderable) {
        view.note_position();
        view.append(item);
        view.refresh_scroll(false, Some(Duration::ZERO));
    }

    /// Append an entry, keeping the view pinned to the bottom if it was.
    pub fn append(&self, item: Renderable) {
        Self::push(self.lock().as_mut(), item);
    }

    /// Trace a plain line.
    pub fn trace(&self, text: impl Into<String>) {
        self.append(Renderable::Line(text.into()));
    }

    /// Trace a structured value.
    pub fn trace_value(&self, value: Value) {
        self.append(Renderable::Value(value));
    }

    /// Append backend text verbatim.
    pub fn trace_raw(&self, text: impl Into<String>) {
        self.append(Renderable::Raw(text.into()));
    }

    /// Trace an error entry under the backend error banner.
    pub fn trace_error(&self, detail: impl Into<String>) {
        self.append(Renderable::Error {
            banner: ERROR_BANNER.to_string(),
            detail: detail.into(),
        });
    }

    /// Trace a locally detected failure under the log error banner.
    pub fn log_error(&self, detail: impl Into<String>) {
        self.append(Renderable::Error {
            banner: LOG_ERROR_BANNER.to_string(),
            detail: detail.into(),
        });
    }

    /// Echo a submitted command and force the view to the bottom.
    pub fn trace_input(&self, line: &str) {
        let mut view = self.lock();
        view.append(Renderable::Input(line.to_string()));
        view.refresh_scroll(true, Some(Duration::ZERO));
    }

    /// Remove all output.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Scroll to the bottom using the view's default animation.
    pub fn scroll_to_bottom(&self) {
        self.lock().refresh_scroll(true, None);
    }

    /// Current view height.
    pub fn view_height(&self) -> f64 {
        self.lock().view_height()
    }

    /// Pan the view.
    pub fn scroll_to(&self, left: f64, top: f64, relative: bool) {
        self.lock().scroll_to(left, top, relative);
    }

    /// Current `(left, top)` scroll offset.
    pub fn scroll_position(&self) -> (f64, f64) {
        self.lock().scroll_position()
    }

    fn render_report(view: &mut dyn OutputView, report: &FailureReport) {
        let banner = match report.origin {
            FailureOrigin::Unhandled => UNHANDLED_BANNER,
            FailureOrigin::Traced | FailureOrigin::Dispatch => LOG_ERROR_BANNER,
        };
        view.note_position();
        view.append(Renderable::Error {
            banner: banner.to_string(),
            detail: report.message.clone(),
        });
        if let Some(frame) = &report.frame {
            view.append(Renderable::Line("Callstack data:".to_string()));
            view.append(Renderable::Value(frame.to_value()));
        }
        if report.origin == FailureOrigin::Dispatch && !report.stack.is_empty() {
            view.append(Renderable::Line("Shadow stack:".to_string()));
            view.append(Renderable::Value(Value::Array(
                report.stack.iter().map(|f| f.to_value()).collect(),
            )));
        }
        view.refresh_scroll(false, None);
    }
}

impl ErrorReporter for Output {
    fn report(&self, report: &FailureReport) {
        // A panic raised while the view is locked must not deadlock the hook.
        match self.view.try_lock() {
            Ok(mut view) => Self::render_report(view.as_mut(), report),
            Err(std::sync::TryLockError::Poisoned(e)) => {
                Self::render_report(e.into_inner().as_mut(), report)
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                tracing::error!(message = %report.message, "failure report dropped: output busy");
            }
        }
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::CallFrame;
    use serde_json::json;

    fn output() -> (Output, Transcript) {
        let view = MemoryView::new();
        let transcript = view.transcript();
        (Output::new(view), transcript)
    }

    #[test]
    fn test_trace_kinds() {
        let (out, transcript) = output();
        out.trace("line");
        out.trace_raw("~\"raw\"\n");
        out.trace_value(json!([1, 2]));
        out.trace_error("boom");

        let entries = transcript.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], Renderable::Line("line".into()));
        assert_eq!(entries[1], Renderable::Raw("~\"raw\"\n".into()));
        assert_eq!(entries[2], Renderable::Value(json!([1, 2])));
        assert_eq!(
            entries[3],
            Renderable::Error {
                banner: ERROR_BANNER.into(),
                detail: "boom".into()
            }
        );
    }

    #[test]
    fn test_input_forces_bottom() {
        let (out, transcript) = output();
        out.trace_input("1 + 1");
        assert_eq!(transcript.scroll().forced_refreshes, 1);
        assert_eq!(transcript.entries(), vec![Renderable::Input("1 + 1".into())]);
    }

    #[test]
    fn test_report_with_frame() {
        let (out, transcript) = output();
        let report = FailureReport {
            origin: FailureOrigin::Traced,
            message: "bad".into(),
            frame: Some(CallFrame::new(0, "c", Some(vec!["1".into()]))),
            stack: Vec::new(),
        };
        out.report(&report);

        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert!(matches!(
            &entries[0],
            Renderable::Error { banner, .. } if banner == LOG_ERROR_BANNER
        ));
        assert_eq!(entries[1], Renderable::Line("Callstack data:".into()));
        assert_eq!(entries[2], Renderable::Value(json!({"idx": 0, "fn": "c", "args": ["1"]})));
    }

    #[test]
    fn test_unhandled_banner() {
        let (out, transcript) = output();
        out.report(&FailureReport {
            origin: FailureOrigin::Unhandled,
            message: "panic".into(),
            frame: None,
            stack: Vec::new(),
        });
        assert!(matches!(
            &transcript.entries()[0],
            Renderable::Error { banner, .. } if banner == UNHANDLED_BANNER
        ));
    }
}
