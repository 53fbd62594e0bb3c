use log::{error, info, warn};
use overlay_kit_core::{overlay, Config, OverlaySurface};
use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod cli;
mod display;
mod logger;
mod shell;

use shell::Shell;

fn load_config(args: &cli::Args) -> Option<Config> {
    if args.use_defaults {
        info!("Using default configuration");
        return Some(Config::default());
    }

    match Config::load(args.config_path.as_deref(), !args.dry_run) {
        Ok(config) => {
            if let Some(path) = &config.config_path {
                info!("Loaded config from {}", path.display());
            }
            Some(config)
        }
        Err(e) => {
            error!("{e}");
            None
        }
    }
}

fn main() -> ExitCode {
    let args = cli::parse_args();

    if let Err(e) = logger::init_logger(args.quiet, args.verbose) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting OverlayKit {}", overlay_kit_core::version());

    let Some(config) = load_config(&args) else {
        return ExitCode::FAILURE;
    };

    if args.dry_run {
        info!("Configuration is valid");
        return ExitCode::SUCCESS;
    }

    Config::set_config(config);

    let overlays = overlay::controller::<String>();
    let surface = Arc::new(OverlaySurface::attach(
        overlays.store(),
        Duration::from_millis(Config::exit_animation_ms()),
    ));
    surface.on_frame(display::print_frame);

    let shutdown = Arc::new(AtomicBool::new(false));
    let ticker = display::spawn_ticker(
        surface.clone(),
        shutdown.clone(),
        Duration::from_millis(Config::tick_interval_ms().max(1)),
    );

    let interrupted = overlays.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, shutting down...");
        interrupted.unmount_all();
        std::process::exit(130);
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    let mut shell = Shell::new(overlays.clone());
    let result = match &args.script {
        Some(path) => match File::open(path) {
            Ok(file) => {
                info!("Running script {}", path.display());
                shell.run(BufReader::new(file), None)
            }
            Err(e) => {
                error!("Failed to open script {}: {e}", path.display());
                Err(e)
            }
        },
        None => {
            println!("{}", shell::HELP);
            shell.run(io::stdin().lock(), Some(Config::prompt().as_str()))
        }
    };

    shutdown.store(true, Ordering::SeqCst);
    if ticker.join().is_err() {
        warn!("Ticker thread panicked");
    }
    overlays.unmount_all();

    match result {
        Ok(()) => {
            info!("OverlayKit stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Shell stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
