//! Call-stack shadowing for traced invocations.
//!
//! [`CallStackShadow`] keeps a synthetic, most-recent-first list of
//! [`CallFrame`]s around invocations routed through [`CallStackShadow::call`]
//! or [`CallStackShadow::apply`]. Instrumentation is opt-in per call site and
//! never changes what the wrapped closure returns:
//!
//! - on `Ok` the frame is popped and the value is returned untouched
//! - on `Err` the frame is popped, reported, and the error is returned untouched
//! - on panic the frame is popped, reported, and the panic resumes unwinding
//!
//! While any shadow is enabled, a process panic hook reports panics raised
//! outside any traced invocation to every enabled shadow, then runs the hook
//! that was active before. When the last shadow is disabled that hook is
//! reinstalled. On a panicking thread the reinstall waits for the next toggle.
//!
//! # Example
//!
//! ```
//! use nvlv_console::shadow::CallStackShadow;
//!
//! let shadow = CallStackShadow::new();
//! shadow.set_enabled(true);
//!
//! let depth = shadow
//!     .apply("outer", ["1"], || Ok::<_, String>(shadow.stack_snapshot().len()))
//!     .unwrap();
//! assert_eq!(depth, 1);
//! assert!(shadow.stack_snapshot().is_empty());
//!
//! shadow.set_enabled(false);
//! ```

mod frame;

pub use frame::{CallFrame, ErrorReporter, FailureOrigin, FailureReport};

use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use tracing::debug;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

struct ShadowInner {
    enabled: AtomicBool,
    stack: Mutex<VecDeque<CallFrame>>,
    failure_snapshot: Mutex<Option<Vec<CallFrame>>>,
    reporter: Mutex<Option<Arc<dyn ErrorReporter>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shadows receiving unhandled panics, and the hook they displaced.
struct HookListeners {
    listeners: Vec<Weak<ShadowInner>>,
    previous: Option<Arc<PanicHook>>,
}

static LISTENERS: Mutex<HookListeners> = Mutex::new(HookListeners {
    listeners: Vec::new(),
    previous: None,
});

/// Whether [`dispatch_panic`] is the installed hook.
///
/// Held across `take_hook`/`set_hook`; never taken by the hook itself, so a
/// panic on another thread cannot deadlock a toggle.
static INSTALLED: Mutex<bool> = Mutex::new(false);

fn dispatch_panic(info: &PanicHookInfo<'_>) {
    let (listeners, previous) = {
        let state = lock(&LISTENERS);
        let live: Vec<_> = state.listeners.iter().filter_map(Weak::upgrade).collect();
        (live, state.previous.clone())
    };
    for inner in &listeners {
        inner.on_panic(info);
    }
    if let Some(previous) = previous {
        (**previous)(info);
    }
}

fn listen(inner: &Arc<ShadowInner>) {
    let mut installed = lock(&INSTALLED);
    lock(&LISTENERS).listeners.push(Arc::downgrade(inner));
    if *installed || thread::panicking() {
        return;
    }
    let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
    lock(&LISTENERS).previous = Some(previous);
    panic::set_hook(Box::new(dispatch_panic));
    *installed = true;
}

/// Drop `inner` (and any dead shadow) from the listeners, reinstalling the
/// displaced hook once nobody listens.
fn unlisten(inner: *const ShadowInner) {
    let prune = |state: &mut HookListeners| {
        state
            .listeners
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), inner));
    };
    // std refuses hook changes while panicking, and this may run inside the hook.
    if thread::panicking() {
        prune(&mut *lock(&LISTENERS));
        return;
    }

    let mut installed = lock(&INSTALLED);
    let previous = {
        let mut state = lock(&LISTENERS);
        prune(&mut *state);
        if !state.listeners.is_empty() || !*installed {
            return;
        }
        state.previous.take()
    };
    match previous.map(Arc::try_unwrap) {
        Some(Ok(hook)) => panic::set_hook(hook),
        Some(Err(shared)) => panic::set_hook(Box::new(move |info| (**shared)(info))),
        None => drop(panic::take_hook()),
    }
    *installed = false;
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl ShadowInner {
    fn push(&self, callee: &str, args: Option<Vec<String>>) {
        let mut stack = lock(&self.stack);
        let frame = CallFrame::new(stack.len(), callee, args);
        stack.push_front(frame);
    }

    fn pop(&self) -> Option<CallFrame> {
        lock(&self.stack).pop_front()
    }

    fn fail(&self, message: String) {
        {
            let mut snapshot = lock(&self.failure_snapshot);
            if snapshot.is_none() {
                *snapshot = Some(lock(&self.stack).iter().cloned().collect());
            }
        }
        let frame = self.pop();
        self.report(FailureReport {
            origin: FailureOrigin::Traced,
            message,
            frame,
            stack: Vec::new(),
        });
    }

    fn report(&self, report: FailureReport) {
        debug!(origin = ?report.origin, message = %report.message, "failure observed");
        let reporter = lock(&self.reporter).clone();
        if let Some(reporter) = reporter {
            reporter.report(&report);
        }
    }

    fn on_panic(&self, info: &PanicHookInfo<'_>) {
        // Panics inside traced calls are reported as their frames unwind.
        if !self.enabled.load(Ordering::Acquire) || !lock(&self.stack).is_empty() {
            return;
        }
        let mut message = panic_message(info.payload());
        if let Some(location) = info.location() {
            message = format!("{} ({}:{})", message, location.file(), location.line());
        }
        self.report(FailureReport {
            origin: FailureOrigin::Unhandled,
            message,
            frame: None,
            stack: Vec::new(),
        });
    }
}

/// Shadow call stack shared by everything that traces through it.
///
/// Cloning yields another handle to the same stack.
#[derive(Clone)]
pub struct CallStackShadow {
    inner: Arc<ShadowInner>,
}

impl CallStackShadow {
    /// Create a disabled shadow with no reporter.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShadowInner {
                enabled: AtomicBool::new(false),
                stack: Mutex::new(VecDeque::new()),
                failure_snapshot: Mutex::new(None),
                reporter: Mutex::new(None),
            }),
        }
    }

    /// Create a disabled shadow reporting to `reporter`.
    pub fn with_reporter(reporter: Arc<dyn ErrorReporter>) -> Self {
        let shadow = Self::new();
        shadow.set_reporter(reporter);
        shadow
    }

    /// Replace the reporter.
    pub fn set_reporter(&self, reporter: Arc<dyn ErrorReporter>) {
        *lock(&self.inner.reporter) = Some(reporter);
    }

    /// Check if instrumentation is active.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Turn instrumentation on or off.
    ///
    /// Idempotent. Returns `true` if the state changed. Safe to call while
    /// the thread is panicking.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        if self.inner.enabled.swap(enabled, Ordering::AcqRel) == enabled {
            return false;
        }
        if enabled {
            listen(&self.inner);
        } else {
            unlisten(Arc::as_ptr(&self.inner));
        }
        debug!(enabled, "call stack shadow toggled");
        true
    }

    /// Number of live frames.
    pub fn depth(&self) -> usize {
        lock(&self.inner.stack).len()
    }

    /// Point-in-time copy of the live stack, most recent first.
    pub fn stack_snapshot(&self) -> Vec<CallFrame> {
        lock(&self.inner.stack).iter().cloned().collect()
    }

    /// Take the stack captured at the deepest failure since the last take.
    pub fn take_failure_snapshot(&self) -> Vec<CallFrame> {
        lock(&self.inner.failure_snapshot).take().unwrap_or_default()
    }

    /// Forget any failure captured so far.
    pub fn clear_failure_snapshot(&self) {
        lock(&self.inner.failure_snapshot).take();
    }

    /// Report a failure through the configured reporter.
    pub fn report(&self, report: FailureReport) {
        self.inner.report(report);
    }

    /// Invoke `f` as `callee` with no recorded arguments.
    pub fn call<T, E, F>(&self, callee: &str, f: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.is_enabled() {
            return f();
        }
        self.traced(callee, None, f)
    }

    /// Invoke `f` as `callee`, recording `args` on the frame.
    pub fn apply<T, E, F, I, A>(&self, callee: &str, args: I, f: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
        I: IntoIterator<Item = A>,
        A: ToString,
    {
        if !self.is_enabled() {
            return f();
        }
        let args = args.into_iter().map(|a| a.to_string()).collect();
        self.traced(callee, Some(args), f)
    }

    fn traced<T, E, F>(&self, callee: &str, args: Option<Vec<String>>, f: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.inner.push(callee, args);
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                self.inner.pop();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.inner.fail(err.to_string());
                Err(err)
            }
            Err(payload) => {
                self.inner.fail(panic_message(payload.as_ref()));
                panic::resume_unwind(payload)
            }
        }
    }
}

impl Drop for ShadowInner {
    fn drop(&mut self) {
        if *self.enabled.get_mut() {
            unlisten(&*self);
        }
    }
}

impl Default for CallStackShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallStackShadow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallStackShadow")
            .field("enabled", &self.is_enabled())
            .field("depth", &self.depth())
            .finish()
    }
}
