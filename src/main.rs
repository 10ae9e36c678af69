//! Scan Station - headless operator console
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! Reads one intent per line from stdin (`init`, `start`, `voxel 0.003`, ...)
//! and prints one status line per intent on stdout. Logs go to a daily
//! rotating file and, unless disabled, to stderr.
//!
//! # Execution Flow
//!
//! 1. Parse arguments and resolve settings (defaults, YAML file, environment)
//! 2. Initialize logging
//! 3. Create a current-thread tokio runtime
//! 4. Start the session on a headless surface with the simulated engine
//! 5. Run the event loop until `quit` or end of input
//! 6. Tear the session down (persisting configuration when enabled)
//!
//! A missing, empty or rejected license ends the process with exit code 3.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use scan_station::session::{run_event_loop, spawn_intent_reader};
use scan_station::{
    APP_NAME, AppSettings, HeadlessSurface, Session, SimulatedEngine, StartupError, VERSION,
};
use std::io::{self, BufReader};
use tokio::sync::mpsc;

/// Intents buffered between the stdin reader and the event loop
const INTENT_QUEUE: usize = 32;

#[derive(Parser, Debug)]
#[command(name = "scan-station", version, about = "Operator console for a 3D scanning session")]
struct Args {
    /// Settings file (YAML). Defaults to ~/scan-station/settings.yaml when present
    #[arg(long, value_name = "PATH")]
    settings: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Only log to the log file, not to stderr
    #[arg(long)]
    no_console_log: bool,

    /// Print the effective settings as YAML and exit
    #[arg(long)]
    print_settings: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = AppSettings::load(args.settings.as_deref())?;
    settings.debug |= args.debug;

    if args.print_settings {
        print!("{}", settings.to_yaml()?);
        return Ok(());
    }

    let guard = scan_station::logging::setup_logging_with_console(
        &settings.log_dir,
        APP_NAME,
        settings.debug,
        !args.no_console_log,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    // Everything runs on this thread: intents, render ticks and engine calls
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run_console(&settings));

    match result {
        Ok(()) => {
            tracing::info!("Application shutdown complete");
            Ok(())
        }
        Err(e) => {
            if let Some(startup) = e.downcast_ref::<StartupError>() {
                let code = startup.exit_code();
                tracing::error!("Startup failed: {}", startup);
                eprintln!("{}: {}", APP_NAME, startup);
                // Flush the log file before leaving without unwinding
                drop(runtime);
                drop(guard);
                std::process::exit(code);
            }
            tracing::error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

async fn run_console(settings: &AppSettings) -> Result<()> {
    let surface = HeadlessSurface::new(settings.surface.width, settings.surface.height);
    let mut session = Session::startup(surface, settings, |size| {
        SimulatedEngine::new(size).without_call_log()
    })?;

    // The reader thread may still be blocked on stdin after `quit`. It is not
    // joined; process exit ends it.
    let (tx, rx) = mpsc::channel(INTENT_QUEUE);
    spawn_intent_reader(BufReader::new(io::stdin()), tx, |message| {
        println!("{}", message)
    })
    .context("Failed to start console input thread")?;

    run_event_loop(&mut session, rx, |status| println!("{}", status)).await;

    session
        .teardown()
        .context("Failed to persist configuration on exit")?;
    Ok(())
}
