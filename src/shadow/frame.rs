//! Call frames and failure reports.

use serde::Serialize;
use serde_json::Value;

/// One entry of the shadow stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallFrame {
    /// Stack depth at the time the frame was pushed.
    #[serde(rename = "idx")]
    pub index: usize,
    /// Name of the invoked callee.
    #[serde(rename = "fn")]
    pub callee: String,
    /// Arguments, when the invocation carried any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl CallFrame {
    /// Create a new frame.
    pub fn new(index: usize, callee: impl Into<String>, args: Option<Vec<String>>) -> Self {
        Self {
            index,
            callee: callee.into(),
            args,
        }
    }

    /// Structured form used for output.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Where a failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// Inside a traced invocation, on its way out.
    Traced,
    /// Outside any traced invocation, caught by the process hook.
    Unhandled,
    /// At the console's dispatch boundary.
    Dispatch,
}

/// A failure handed to an [`ErrorReporter`].
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub origin: FailureOrigin,
    pub message: String,
    /// Frame popped when the failure crossed it.
    pub frame: Option<CallFrame>,
    /// Shadow stack captured at the deepest failure point.
    pub stack: Vec<CallFrame>,
}

/// Receiver of failure reports.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: &FailureReport);
}
