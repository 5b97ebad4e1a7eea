//! Console integration tests.
//!
//! These drive a [`Console`] through its public API with in-memory storage,
//! a recording transport and a memory view.

use std::sync::{Arc, Mutex};

use serde_json::json;
use serial_test::serial;

use nvlv_console::output::{ERROR_BANNER, LOG_ERROR_BANNER, UNHANDLED_BANNER};
use nvlv_console::relay::{Outbound, START_ACK};
use nvlv_console::{
    CallStackShadow, Channel, Console, ConsoleError, ConsoleOptions, ErrorReporter, FailureReport,
    InstanceId, KeyCode, KeyInput, MemoryStorage, MemoryView, Readiness, RecordingTransport,
    Renderable, Storage, Timer, Transcript, TransportEvent,
};

struct Harness {
    console: Console,
    transcript: Transcript,
    transport: RecordingTransport,
}

fn harness_with(options: ConsoleOptions, storage: MemoryStorage) -> Harness {
    let view = MemoryView::new();
    let transcript = view.transcript();
    let transport = RecordingTransport::new();
    let console = Console::new(options, view, storage, transport.clone());
    transcript.reset();
    Harness {
        console,
        transcript,
        transport,
    }
}

fn harness() -> Harness {
    harness_with(ConsoleOptions::default(), MemoryStorage::new())
}

fn with_capacity(hist_max: usize) -> Harness {
    let options = ConsoleOptions {
        hist_max: Some(hist_max),
        ..ConsoleOptions::default()
    };
    harness_with(options, MemoryStorage::new())
}

fn press(console: &mut Console, code: KeyCode) {
    console.handle_key(KeyInput::new(code)).unwrap();
}

fn type_text(console: &mut Console, text: &str) {
    for c in text.chars() {
        press(console, KeyCode::Char(c));
    }
}

// ============================================================================
// Command registry
// ============================================================================

#[test]
fn test_reregister_keeps_one_quick_pick_and_latest_handler() {
    let mut h = harness();
    let before = h.console.quick_picks().len();

    h.console.register(".who", |core, _| {
        core.output().trace("first");
        Ok(false)
    }, true);
    h.console.register(".who", |core, _| {
        core.output().trace("second");
        Ok(false)
    }, true);

    assert_eq!(h.console.quick_picks().len(), before + 1);
    assert_eq!(h.console.quick_picks().iter().filter(|q| *q == ".who").count(), 1);

    h.console.submit(".who").unwrap();
    assert_eq!(h.transcript.lines().last().map(String::as_str), Some("second"));
}

#[test]
fn test_handler_receives_remaining_tokens() {
    let mut h = harness();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    h.console.register(".args", move |_, args| {
        sink.lock().unwrap().extend(args.iter().cloned());
        Ok(true)
    }, false);

    h.console.submit(".args  a   b").unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_unmatched_input_falls_back_to_evaluation() {
    let mut h = harness();
    h.console.submit("cfg = {\"depth\": [1, 2]}").unwrap();
    h.console.submit("cfg.depth[1]").unwrap();
    assert_eq!(h.transcript.entries().last(), Some(&Renderable::Value(json!(2))));
}

#[test]
fn test_default_snippets_are_quick_picks() {
    let h = harness();
    let picks = h.console.quick_picks();
    assert!(picks.iter().any(|p| p.starts_with(": source ")));
    assert!(picks.iter().any(|p| p.contains("--interpreter mi")));
}

#[test]
fn test_quick_pick_selection_does_not_submit() {
    let mut h = harness();
    assert!(h.console.select_quick_pick(0));
    assert_eq!(h.console.input(), h.console.quick_picks()[0]);
    assert!(h.console.history_entries().is_empty());
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_keeps_most_recent_entries() {
    let mut h = with_capacity(3);
    for cmd in ["1", "2", "3", "4", "5"] {
        h.console.submit(cmd).unwrap();
    }
    assert_eq!(
        h.console.core().history().entries_oldest_first(),
        vec!["3", "4", "5"]
    );
    assert_eq!(h.console.history_entries(), vec!["5", "4", "3"]);
}

#[test]
fn test_write_cursor_wraps_to_start() {
    let mut h = with_capacity(3);
    for cmd in ["1", "2", "3"] {
        h.console.submit(cmd).unwrap();
    }
    assert_eq!(h.console.core().history().cursor(), Some(2));
    h.console.submit("4").unwrap();
    assert_eq!(h.console.core().history().cursor(), Some(0));
    assert_eq!(h.console.core().history().get(0), Some("4"));
}

#[test]
fn test_up_visits_each_entry_once_then_stops() {
    let mut h = with_capacity(3);
    for cmd in ["1", "2", "3", "4"] {
        h.console.submit(cmd).unwrap();
    }

    let mut visited = Vec::new();
    for _ in 0..3 {
        press(&mut h.console, KeyCode::Up);
        visited.push(h.console.input().to_string());
    }
    assert_eq!(visited, vec!["4", "3", "2"]);

    press(&mut h.console, KeyCode::Up);
    assert_eq!(h.console.input(), "2");
}

#[test]
fn test_up_stops_at_oldest_when_not_full() {
    let mut h = with_capacity(5);
    h.console.submit("1").unwrap();
    h.console.submit("2").unwrap();
    press(&mut h.console, KeyCode::Up);
    press(&mut h.console, KeyCode::Up);
    press(&mut h.console, KeyCode::Up);
    assert_eq!(h.console.input(), "1");
}

#[test]
fn test_down_restores_unsent_input() {
    let mut h = harness();
    h.console.submit("1").unwrap();
    h.console.submit("2").unwrap();

    type_text(&mut h.console, "half typed");
    press(&mut h.console, KeyCode::Up);
    press(&mut h.console, KeyCode::Up);
    assert_eq!(h.console.input(), "1");
    press(&mut h.console, KeyCode::Down);
    assert_eq!(h.console.input(), "2");
    press(&mut h.console, KeyCode::Down);
    assert_eq!(h.console.input(), "half typed");
}

#[test]
fn test_enter_submits_and_resets_browsing() {
    let mut h = harness();
    h.console.submit("7").unwrap();
    press(&mut h.console, KeyCode::Up);
    press(&mut h.console, KeyCode::Enter);
    assert_eq!(h.console.history_entries(), vec!["7", "7"]);
    assert_eq!(h.console.input(), "");
}

#[test]
fn test_history_survives_restart() {
    let storage = MemoryStorage::new();
    {
        let mut h = harness_with(ConsoleOptions::default(), storage.clone());
        h.console.submit("1").unwrap();
        h.console.submit("2").unwrap();
        h.console.submit(".move 12 34").unwrap();
    }

    let mut h = harness_with(ConsoleOptions::default(), storage);
    assert_eq!(h.console.history_entries(), vec![".move 12 34", "2", "1"]);
    let geometry = h.console.core().geometry();
    assert_eq!((geometry.left, geometry.top), (12.0, 34.0));

    press(&mut h.console, KeyCode::Up);
    assert_eq!(h.console.input(), ".move 12 34");
}

#[test]
fn test_instances_do_not_share_state() {
    let storage = MemoryStorage::new();
    {
        let mut h = harness_with(ConsoleOptions::default(), storage.clone());
        h.console.submit("1").unwrap();
    }
    let options = ConsoleOptions {
        instance_id: "other".parse::<InstanceId>().unwrap(),
        ..ConsoleOptions::default()
    };
    let h = harness_with(options, storage.clone());
    assert!(h.console.history_entries().is_empty());
    assert!(storage.get("nvlv_gbl_hist0").is_some());
}

#[test]
fn test_storage_failure_reported_once() {
    let mut h = harness_with(ConsoleOptions::default(), MemoryStorage::read_only());
    h.console.submit("1").unwrap();
    h.console.submit("2").unwrap();

    let failures = h
        .transcript
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("Unable to write to storage"))
        .count();
    assert_eq!(failures, 1);
    assert_eq!(h.console.history_entries(), vec!["2", "1"]);
}

// ============================================================================
// Modal commands
// ============================================================================

#[test]
fn test_new_modal_command_replaces_previous() {
    let mut h = harness();
    h.console.submit(".move").unwrap();
    h.console.submit(".size").unwrap();
    press(&mut h.console, KeyCode::Left);
    let geometry = h.console.core().geometry();
    assert_eq!(geometry.left, 30.0);
    assert_eq!(geometry.width, 395.0);
}

#[test]
fn test_move_session_persists_on_exit() {
    let storage = MemoryStorage::new();
    let mut h = harness_with(ConsoleOptions::default(), storage.clone());
    h.console.submit(".move").unwrap();
    h.console.handle_key(KeyInput::shifted(KeyCode::Right)).unwrap();
    press(&mut h.console, KeyCode::Up);
    press(&mut h.console, KeyCode::Enter);

    let settings = h.console.settings();
    assert_eq!((settings.win_left, settings.win_top), (55.0, 85.0));
    let stored: serde_json::Value =
        serde_json::from_str(&storage.get("nvlv_gbl_cfg").unwrap()).unwrap();
    assert_eq!(stored["winLeft"], json!(55.0));
    assert_eq!(h.transcript.lines().last().map(String::as_str), Some("Move command exit."));
}

// ============================================================================
// Call-stack shadow
// ============================================================================

#[derive(Default)]
struct Collecting {
    reports: Mutex<Vec<FailureReport>>,
}

impl ErrorReporter for Collecting {
    fn report(&self, report: &FailureReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

#[test]
#[serial]
fn test_nested_failure_reports_innermost_frame_first() {
    let reporter = Arc::new(Collecting::default());
    let shadow = CallStackShadow::with_reporter(reporter.clone());
    shadow.set_enabled(true);

    let result: Result<(), String> = shadow.call("A", || {
        shadow.call("B", || shadow.call("C", || Err("C failed".to_string())))
    });

    assert!(result.is_err());
    assert!(shadow.stack_snapshot().is_empty());
    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports[0].frame.as_ref().unwrap().callee, "C");
    assert_eq!(reports[0].message, "C failed");
    drop(reports);

    shadow.set_enabled(false);
}

#[test]
#[serial]
fn test_caught_dispatch_failure_reports_shadow_stack() {
    let mut h = harness();
    h.console.submit(".errs true").unwrap();
    assert_eq!(
        h.transcript.lines().last().map(String::as_str),
        Some("Error catching enabled: true")
    );

    h.console.register(".outer", |core, _| {
        let shadow = core.shadow().clone();
        shadow.call("inner", || Err(ConsoleError::Dispatch("inner broke".into())))
    }, false);
    h.console.submit(".outer").unwrap();

    assert_eq!(h.console.core().shadow().depth(), 0);
    let text = h.transcript.lines().join("\n");
    assert!(text.contains("inner broke"));
    assert!(text.contains("Shadow stack:"));
    assert!(h
        .transcript
        .errors()
        .iter()
        .all(|e| matches!(e, Renderable::Error { banner, .. } if banner == LOG_ERROR_BANNER)));

    h.console.submit(".errs false").unwrap();
    assert!(!h.console.core().shadow().is_enabled());
}

#[test]
#[serial]
fn test_uncaught_failure_propagates() {
    let mut h = harness();
    let err = h.console.submit(".size wide").unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidArgument { .. }));
    assert_eq!(h.transcript.errors().len(), 1);
}

#[test]
#[serial]
fn test_dropping_console_stops_unhandled_reports() {
    let view = MemoryView::new();
    let transcript = view.transcript();
    let options = ConsoleOptions {
        catch_errors: Some(true),
        ..ConsoleOptions::default()
    };
    let console = Console::new(options, view, MemoryStorage::new(), RecordingTransport::new());
    assert!(console.core().shadow().is_enabled());
    drop(console);
    transcript.reset();

    let _ = std::panic::catch_unwind(|| panic!("after drop"));
    assert!(transcript.is_empty());
}

#[test]
#[serial]
fn test_unhandled_panic_reported_while_catching() {
    let options = ConsoleOptions {
        catch_errors: Some(true),
        ..ConsoleOptions::default()
    };
    let h = harness_with(options, MemoryStorage::new());
    let _ = std::panic::catch_unwind(|| panic!("stray"));
    assert!(matches!(
        &h.transcript.errors()[..],
        [Renderable::Error { banner, detail }]
            if banner == UNHANDLED_BANNER && detail.contains("stray")
    ));
}

// ============================================================================
// Relay
// ============================================================================

#[test]
fn test_outbound_framing() {
    let generic = Outbound::new(Channel::Generic, "foo", &["1", "2"]);
    assert_eq!(
        serde_json::to_value(&generic).unwrap(),
        json!({"ctx": "cmd", "data": {"cmd": "foo", "args": ["1", "2"]}})
    );
    let shell = Outbound::new(Channel::Shell, "a", &["b"]);
    assert_eq!(
        serde_json::to_value(&shell).unwrap(),
        json!({"ctx": "sh", "data": {"cmd": "a b"}})
    );
}

#[test]
fn test_relay_commands_send_envelopes() {
    let mut h = harness();
    h.console.submit("-open").unwrap();
    h.console.handle_transport_event(TransportEvent::Opened);
    h.console.submit("- -gdb-start dev_0").unwrap();
    h.console.submit("! ls -la").unwrap();
    h.console.submit(": -exec-next").unwrap();

    assert_eq!(
        h.transport.sent_json(),
        vec![
            json!({"ctx": "sh", "data": {"cmd": "pwd"}}),
            json!({"ctx": "cmd", "data": {"cmd": "-gdb-start", "args": ["dev_0"]}}),
            json!({"ctx": "sh", "data": {"cmd": "ls -la"}}),
            json!({"ctx": "gdb", "data": {"cmd": "-exec-next"}}),
        ]
    );
    assert!(h.transcript.lines().contains(&"CONNECTED".to_string()));
}

#[test]
fn test_send_without_connection_fails() {
    let mut h = harness();
    let err = h.console.submit("! pwd").unwrap_err();
    assert!(matches!(err, ConsoleError::NotConnected));
}

#[test]
fn test_debug_line_list_traced_in_order() {
    let mut h = harness();
    let msg = r#"{"Ctx":"gdb","Data":{"data":["line1","line2"]}}"#;
    h.console.handle_transport_event(TransportEvent::Message(msg.into()));
    assert_eq!(h.transcript.lines(), vec!["line1", "line2"]);
}

#[test]
fn test_error_payload_traced_once_with_banner() {
    let mut h = harness();
    h.console
        .handle_transport_event(TransportEvent::Message(r#"{"Data":{"err":"boom"}}"#.into()));
    assert_eq!(
        h.transcript.entries(),
        vec![Renderable::Error {
            banner: ERROR_BANNER.to_string(),
            detail: "boom".to_string()
        }]
    );
}

#[test]
fn test_malformed_message_reported_once_and_dropped() {
    let mut h = harness();
    h.console
        .handle_transport_event(TransportEvent::Message("{not json".into()));
    h.console.handle_transport_event(TransportEvent::Message(
        r#"{"Ctx":"gdb","Data":{"raw":"~\"ok\"\n"}}"#.into(),
    ));

    assert_eq!(h.transcript.errors().len(), 1);
    assert_eq!(
        h.transcript.entries().last(),
        Some(&Renderable::Raw("~\"ok\"\n".into()))
    );
    assert_eq!(h.console.core().relay().parse_failures(), 1);
    assert!(h.console.message_log().starts_with("{not json"));
}

#[test]
fn test_disconnect_traced() {
    let mut h = harness();
    h.console.submit("-open").unwrap();
    h.console.handle_transport_event(TransportEvent::Opened);
    h.console.handle_transport_event(TransportEvent::Closed);
    h.console.handle_transport_event(TransportEvent::Closed);
    let disconnects = h
        .transcript
        .lines()
        .iter()
        .filter(|l| *l == "DISCONNECTED")
        .count();
    assert_eq!(disconnects, 1);
}

// ============================================================================
// Bootstrap
// ============================================================================

#[test]
fn test_init_waits_for_acknowledgement() {
    let mut options = ConsoleOptions::default();
    options.bootstrap.readiness = Readiness::Ack;
    let mut h = harness_with(options, MemoryStorage::new());
    h.console.submit("-init").unwrap();
    h.console.handle_transport_event(TransportEvent::Opened);
    h.transport.clear_sent();

    let pwd = r#"{"Ctx":"sh","Data":{"cmd":"pwd","msg":"/srv"}}"#;
    h.console.handle_transport_event(TransportEvent::Message(pwd.into()));
    assert_eq!(h.transport.sent().len(), 1);

    let ack = json!({"Ctx": "cmd", "Data": {"cmd": "-gdb-start", "msg": START_ACK}});
    h.console
        .handle_transport_event(TransportEvent::Message(ack.to_string()));
    assert_eq!(
        h.transport.sent_json()[1..].to_vec(),
        vec![
            json!({"ctx": "gdb", "data": {"cmd": "-break-insert main.main"}}),
            json!({"ctx": "cmd", "data": {"cmd": "-gdb-run"}}),
        ]
    );
}

#[test]
fn test_init_with_grace_delay() {
    let mut h = harness();

    h.console.submit("-init").unwrap();
    let scheduled = h.console.take_scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].timer, Timer::BootstrapGrace);
    assert_eq!(scheduled[0].delay, std::time::Duration::from_millis(1000));
    assert!(h.transport.sent().is_empty());
    assert!(h.console.take_scheduled().is_empty());

    h.console.handle_transport_event(TransportEvent::Opened);
    h.transport.clear_sent();
    h.console.fire_timer(Timer::BootstrapGrace);
    let cmds: Vec<_> = h
        .transport
        .sent_json()
        .iter()
        .map(|v| v["data"]["cmd"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(cmds, vec!["-gdb-start", "-break-insert main.main", "-gdb-run"]);
}

#[test]
fn test_grace_timer_without_connection_reports() {
    let view = MemoryView::new();
    let transcript = view.transcript();
    let mut console = Console::new(
        ConsoleOptions::default(),
        view,
        MemoryStorage::new(),
        RecordingTransport::refusing(),
    );
    console.submit("-init").unwrap();
    transcript.reset();
    console.fire_timer(Timer::BootstrapGrace);
    assert_eq!(transcript.errors().len(), 1);
}
