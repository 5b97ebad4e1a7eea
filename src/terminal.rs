//! Interactive terminal frontend.
//!
//! Runs the console on a raw-mode terminal: output entries are printed
//! above a single prompt line, keys are mapped onto [`KeyInput`]s, and the
//! relay's WebSocket transport reports through a channel drained by the same
//! loop. Everything runs on one task, so the engine never sees two events at
//! once.

use std::borrow::Cow;
use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{MoveTo, MoveToColumn};
use crossterm::event::{
    Event, EventStream, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::console::{Console, ConsoleOptions, ScheduledTimer, Timer};
use crate::modal::{KeyCode, KeyInput, Mode, Purpose};
use crate::output::{OutputSanitizer, OutputView, Renderable};
use crate::relay::{event_channel, WsTransport};
use crate::storage::Storage;
use crate::Result;

const PROMPT: &str = "> ";

/// [`OutputView`] printing to the terminal.
pub struct TerminalView {
    out: Stdout,
    left: f64,
    top: f64,
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            left: 0.0,
            top: 0.0,
        }
    }

    fn write_entry(&mut self, item: &Renderable) -> io::Result<()> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        match item {
            Renderable::Input(line) => {
                queue!(self.out, PrintStyledContent(format!("{}{}", PROMPT, line).dark_grey()))?
            }
            Renderable::Line(text) => queue!(self.out, Print(crlf(&printable(text))))?,
            Renderable::Raw(text) => {
                queue!(self.out, Print(crlf(printable(text).trim_end_matches('\n'))))?
            }
            Renderable::Value(value) => queue!(self.out, Print(crlf(&pretty(value))))?,
            Renderable::Error { banner, detail } => queue!(
                self.out,
                PrintStyledContent(banner.as_str().red().bold()),
                Print(" "),
                PrintStyledContent(crlf(detail).red())
            )?,
        }
        queue!(self.out, Print("\r\n"))?;
        self.out.flush()
    }
}

/// Backend text with control sequences stripped.
fn printable(text: &str) -> Cow<'_, str> {
    if OutputSanitizer::needs_cleaning(text) {
        Cow::Owned(OutputSanitizer::clean(text))
    } else {
        Cow::Borrowed(text)
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

fn crlf(text: &str) -> String {
    text.replace('\n', "\r\n")
}

fn pretty(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

impl OutputView for TerminalView {
    fn append(&mut self, item: Renderable) {
        if let Err(e) = self.write_entry(&item) {
            debug!(error = %e, "terminal write failed");
        }
    }

    fn clear(&mut self) {
        let cleared = queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))
            .and_then(|_| self.out.flush());
        if let Err(e) = cleared {
            debug!(error = %e, "terminal clear failed");
        }
    }

    fn note_position(&mut self) {}

    // Output always follows the newest line.
    fn refresh_scroll(&mut self, _force_bottom: bool, _duration: Option<Duration>) {}

    fn view_height(&self) -> f64 {
        terminal::size().map(|(_, rows)| f64::from(rows)).unwrap_or(24.0)
    }

    fn scroll_to(&mut self, left: f64, top: f64, relative: bool) {
        if relative {
            self.left += left;
            self.top += top;
        } else {
            self.left = left;
            self.top = top;
        }
    }

    fn scroll_position(&self) -> (f64, f64) {
        (self.left, self.top)
    }
}

/// Map a terminal key event to a console key.
pub fn map_key(event: &KeyEvent) -> Option<KeyInput> {
    let code = match event.code {
        TermKey::Char(c) => KeyCode::Char(c),
        TermKey::Backspace => KeyCode::Backspace,
        TermKey::Delete => KeyCode::Delete,
        TermKey::Left => KeyCode::Left,
        TermKey::Right => KeyCode::Right,
        TermKey::Up => KeyCode::Up,
        TermKey::Down => KeyCode::Down,
        TermKey::Home => KeyCode::Home,
        TermKey::End => KeyCode::End,
        TermKey::Enter => KeyCode::Enter,
        TermKey::Esc => KeyCode::Esc,
        TermKey::Tab => KeyCode::Tab,
        _ => return None,
    };
    Some(KeyInput {
        code,
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
    })
}

fn is_quit(event: &KeyEvent) -> bool {
    event.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(event.code, TermKey::Char('c') | TermKey::Char('d'))
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = io::stdout().write_all(b"\r\n");
    }
}

fn draw_prompt(console: &Console) -> io::Result<()> {
    let mut out = io::stdout();
    let label = match console.mode() {
        Mode::Idle => PROMPT.to_string(),
        Mode::AwaitingDirectional { purpose, .. } => format!("[{}] ", purpose_label(purpose)),
    };
    let column = label.chars().count() + console.caret();
    queue!(
        out,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        PrintStyledContent(label.as_str().cyan()),
        Print(console.input()),
        MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX))
    )?;
    out.flush()
}

fn purpose_label(purpose: Purpose) -> &'static str {
    match purpose {
        Purpose::Move => "move",
        Purpose::Resize => "size",
        Purpose::Scroll => "scroll",
    }
}

fn schedule(timers: &mpsc::UnboundedSender<Timer>, scheduled: Vec<ScheduledTimer>) {
    for ScheduledTimer { timer, delay } in scheduled {
        debug!(?timer, ?delay, "timer scheduled");
        let tx = timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(timer);
        });
    }
}

/// Run the console until the user quits with Ctrl-C or Ctrl-D.
///
/// Must be called inside a tokio runtime. `auto_start` runs the session
/// bootstrap before the first key is read.
pub async fn run(
    options: ConsoleOptions,
    storage: Box<dyn Storage>,
    auto_start: bool,
) -> Result<()> {
    let (events_tx, mut events_rx) = event_channel();
    let (timers_tx, mut timers_rx) = mpsc::unbounded_channel();
    let _raw = RawMode::enable()?;

    let mut console = Console::with_parts(
        options,
        TerminalView::new(),
        storage,
        Box::new(WsTransport::new(events_tx)),
    );
    if auto_start {
        if let Err(e) = console.start_bootstrap() {
            warn!(error = %e, "bootstrap failed to start");
            console.output().log_error(e.to_string());
        }
    }

    let mut keys = EventStream::new();
    let mut pick = 0usize;
    info!("console running");
    loop {
        schedule(&timers_tx, console.take_scheduled());
        draw_prompt(&console)?;

        tokio::select! {
            key = keys.next() => match key {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if is_quit(&key) {
                        break;
                    }
                    if key.code == TermKey::Tab && console.mode() == Mode::Idle {
                        let picks = console.quick_picks().len();
                        if picks > 0 {
                            console.select_quick_pick(pick % picks);
                            pick = pick.wrapping_add(1);
                        }
                        continue;
                    }
                    if let Some(input) = map_key(&key) {
                        if let Err(e) = console.handle_key(input) {
                            warn!(error = %e, kind = ?e.kind(), "command failed");
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            event = events_rx.recv() => {
                if let Some(event) = event {
                    console.handle_transport_event(event);
                }
            }
            timer = timers_rx.recv() => {
                if let Some(timer) = timer {
                    console.fire_timer(timer);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    console.core_mut().relay_mut().close();
    info!("console stopped");
    Ok(())
}
