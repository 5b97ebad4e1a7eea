//! CLI integration tests.
//!
//! These tests verify argument parsing, configuration loading and a console
//! built from the resulting options.

use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use nvlv_console::cli::{parse_args_from, Args};
use nvlv_console::config::{Config, ConfigError};
use nvlv_console::relay::Readiness;
use nvlv_console::{Console, FileStorage, MemoryView, RecordingTransport};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("nvlv")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |name| {
        pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    }
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.uri.is_none());
    assert!(result.instance_id.is_none());
    assert!(result.state_file.is_none());
    assert!(result.config.is_none());
    assert!(!result.bootstrap);
    assert!(!result.catch_errors);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-u",
        "wss://debug.internal/nvlv",
        "-i",
        "panel_2",
        "-s",
        "/tmp/nvlv.json",
        "-l",
        "debug",
        "--bootstrap",
        "--catch-errors",
    ]))
    .unwrap();

    assert_eq!(result.uri.as_deref(), Some("wss://debug.internal/nvlv"));
    assert_eq!(result.instance_id.as_deref(), Some("panel_2"));
    assert_eq!(result.state_file.unwrap().to_str().unwrap(), "/tmp/nvlv.json");
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert!(result.bootstrap);
    assert!(result.catch_errors);
}

#[test]
fn test_cli_rejects_non_websocket_uri() {
    assert!(parse_args_from(args(&["-u", "http://localhost:12345"])).is_err());
}

#[test]
fn test_cli_rejects_bad_instance_id() {
    assert!(parse_args_from(args(&["-i", "has space"])).is_err());
    assert!(parse_args_from(args(&["-i", "a/b"])).is_err());
}

#[test]
fn test_cli_unknown_and_positional() {
    assert!(parse_args_from(args(&["--unknown"])).is_err());
    assert!(parse_args_from(args(&["stray"])).is_err());
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_file_loading() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{
            "relay": {{ "uri": "ws://10.0.0.5:12345/nvlv" }},
            "console": {{ "instance_id": "left", "hist_max": 20, "snippets": ["info threads"] }},
            "bootstrap": {{ "target": "dev_3", "readiness": "delay", "grace_delay_ms": 250 }}
        }}"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.relay.uri, "ws://10.0.0.5:12345/nvlv");
    assert_eq!(config.console.instance_id, "left");
    assert_eq!(config.console.hist_max, Some(20));
    assert_eq!(config.bootstrap.target, "dev_3");
    // Unset fields keep their defaults.
    assert_eq!(config.bootstrap.entry_symbol, "main.main");
    assert!(!config.bootstrap.auto_start);

    let options = config.to_console_options().unwrap();
    assert_eq!(options.instance_id.as_str(), "left");
    assert_eq!(options.hist_max, Some(20));
    assert_eq!(options.bootstrap.readiness, Readiness::Delay);
    assert_eq!(options.bootstrap.grace_delay, Duration::from_millis(250));
    assert!(options.snippets.iter().any(|s| s == "info threads"));
}

#[test]
fn test_config_invalid_json() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not json").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Json(_))));
}

#[test]
fn test_config_missing_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/nvlv.json"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_config_priority() {
    let mut config = Config::default();
    config.relay.uri = "ws://file/nvlv".to_string();
    config.logging.level = "warn".to_string();

    config.apply_vars(vars(&[
        ("NVLV_URI", "ws://env/nvlv"),
        ("NVLV_HIST_MAX", "7"),
        ("RUST_LOG", "trace"),
    ]));
    assert_eq!(config.relay.uri, "ws://env/nvlv");
    assert_eq!(config.console.hist_max, Some(7));
    assert_eq!(config.log_filter(), "trace");

    let cli = Args {
        uri: Some("ws://cli/nvlv".to_string()),
        ..Args::default()
    };
    config.apply_args(&cli);
    assert_eq!(config.relay.uri, "ws://cli/nvlv");
    // Not given on the command line, so the env value stays.
    assert_eq!(config.console.hist_max, Some(7));
}

#[test]
fn test_config_rejects_bad_values() {
    let mut config = Config::default();
    config.console.hist_max = Some(0);
    assert!(matches!(config.to_console_options(), Err(ConfigError::InvalidHistMax)));

    let mut config = Config::default();
    config.console.instance_id = "no spaces".to_string();
    assert!(matches!(
        config.to_console_options(),
        Err(ConfigError::InvalidInstance(_))
    ));
}

// ============================================================================
// File-backed Console Tests
// ============================================================================

fn file_console(path: &std::path::Path, config: &Config) -> Console {
    Console::new(
        config.to_console_options().unwrap(),
        MemoryView::new(),
        FileStorage::open(path).unwrap(),
        RecordingTransport::new(),
    )
}

#[test]
fn test_history_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let config = Config::default();

    {
        let mut console = file_console(&path, &config);
        console.submit("x = 42").unwrap();
        console.submit(".cls").unwrap();
    }
    assert!(path.exists());

    let console = file_console(&path, &config);
    assert_eq!(console.history_entries(), vec![".cls", "x = 42"]);
}

#[test]
fn test_instances_share_file_without_mixing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut left = Config::default();
    left.console.instance_id = "left".to_string();
    let mut right = Config::default();
    right.console.instance_id = "right".to_string();

    {
        let mut console = file_console(&path, &left);
        console.submit("left = 1").unwrap();
    }
    {
        let mut console = file_console(&path, &right);
        console.submit("right = 2").unwrap();
    }

    assert_eq!(file_console(&path, &left).history_entries(), vec!["left = 1"]);
    assert_eq!(file_console(&path, &right).history_entries(), vec!["right = 2"]);
}
