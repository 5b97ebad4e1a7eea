//! nvlv binary entry point.

use std::process::ExitCode;

use nvlv_console::cli::{self, Args};
use nvlv_console::config::Config;
use nvlv_console::storage::{FileStorage, MemoryStorage, Storage};
use nvlv_console::{logging, terminal};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'nvlv --help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(args)?;
    let _ = logging::try_init_with(config.log_filter());

    info!("nvlv v{}", env!("CARGO_PKG_VERSION"));

    let options = config.to_console_options()?;
    let storage: Box<dyn Storage> = match &config.console.state_file {
        Some(path) => {
            info!(path = %path.display(), "persisting console state");
            Box::new(FileStorage::open(path)?)
        }
        None => Box::new(MemoryStorage::new()),
    };

    // Single-threaded runtime: the console processes one event at a time.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(terminal::run(
        options,
        storage,
        config.bootstrap.auto_start,
    ))?;
    Ok(())
}
