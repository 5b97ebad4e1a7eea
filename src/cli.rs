//! Command-line interface for nvlv.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Relay endpoint.
    pub uri: Option<String>,
    /// Console instance identifier.
    pub instance_id: Option<String>,
    /// File holding persisted console state.
    pub state_file: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level or filter directive.
    pub log_level: Option<String>,
    /// Run the session bootstrap at startup.
    pub bootstrap: bool,
    /// Start with error catching enabled.
    pub catch_errors: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('u') | Long("uri") => {
                let value: String = parser.value()?.parse()?;
                if !value.starts_with("ws://") && !value.starts_with("wss://") {
                    return Err(ArgsError::InvalidValue("uri", value));
                }
                result.uri = Some(value);
            }
            Short('i') | Long("id") => {
                let value: String = parser.value()?.parse()?;
                if value.parse::<crate::session::InstanceId>().is_err() {
                    return Err(ArgsError::InvalidValue("id", value));
                }
                result.instance_id = Some(value);
            }
            Short('s') | Long("state-file") => {
                result.state_file = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("bootstrap") => {
                result.bootstrap = true;
            }
            Long("catch-errors") => {
                result.catch_errors = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"nvlv {version}
Interactive diagnostic console for a remote debug backend

USAGE:
    nvlv [OPTIONS]

OPTIONS:
    -u, --uri <URI>          Relay endpoint [default: ws://localhost:12345/nvlv]
    -i, --id <ID>            Console instance id [default: gbl]
    -s, --state-file <FILE>  Persist settings and history to FILE
    -c, --config <FILE>      Path to configuration file (JSON)
    -l, --log-level <LVL>    Log level (error, warn, info, debug, trace; default warn)
        --bootstrap          Connect and start the debug session on launch
        --catch-errors       Report failing commands with their shadow stack
    -h, --help               Print help
    -V, --version            Print version

ENVIRONMENT VARIABLES:
    NVLV_URI                 Relay endpoint (overrides config)
    NVLV_INSTANCE            Instance id (overrides config)
    NVLV_STATE_FILE          State file (overrides config)
    NVLV_HIST_MAX            History capacity (overrides config)
    NVLV_LOG_LEVEL           Log level (overrides config)
    RUST_LOG                 Alternative log level setting

EXAMPLES:
    # Console only, state kept in memory
    nvlv

    # Connect to a remote backend and start debugging
    nvlv -u ws://devbox:12345/nvlv --bootstrap

    # Keep history between runs
    nvlv -s ~/.nvlv-state.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("nvlv {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
