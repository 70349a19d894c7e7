//! strokestr – turn-back stroke gesture recognition for Linux touchscreens.
//!
//! CLI entry point.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::SystemTime;

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};

use strokestr::manager::{GestureManager, list_touch_devices};

#[derive(Parser)]
#[command(
    name = "strokestr",
    about = "Turn-back stroke gestures for touchscreens"
)]
struct Cli {
    /// Path to configuration file
    #[arg(default_value = "/etc/strokestr/gestures.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List available touchscreen devices and exit
    #[arg(short, long)]
    list_devices: bool,
}

/// Simple logger that writes to stderr and optionally to a log file.
struct StrokestrLogger {
    level: LevelFilter,
    file: Option<Mutex<std::fs::File>>,
}

impl Log for StrokestrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("strokestr")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let line = format!("[{secs} {} strokestr] {}\n", record.level(), record.args());

        // Write to stderr (→ journald when running as systemd service)
        eprint!("{line}");

        // Write to log file if configured
        if let Some(ref file_mutex) = self.file {
            if let Ok(mut f) = file_mutex.lock() {
                let _ = f.write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Some(ref file_mutex) = self.file {
            if let Ok(mut f) = file_mutex.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Install the logger. CLI `--verbose` overrides the configured level.
fn init_logging(manager: &GestureManager, verbose: bool) {
    let level: LevelFilter = if verbose {
        LevelFilter::Debug
    } else {
        manager
            .config_log_level()
            .parse()
            .unwrap_or(LevelFilter::Info)
    };

    let file = manager.config_log_file().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                eprintln!("Warning: cannot open log file '{path}': {e}");
                None
            }
        }
    });

    log::set_boxed_logger(Box::new(StrokestrLogger { level, file })).expect("Failed to set logger");
    log::set_max_level(level);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_touch_devices();
    }

    // Parse config first (before logger init) so we can read the configured log level.
    let mut manager = match GestureManager::new(&cli.config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!(
                "Error: {e}\n\n\
                 To find available touchscreen devices, run:\n\
                 \x20 strokestr --list-devices"
            );
            return ExitCode::FAILURE;
        }
    };

    init_logging(&manager, cli.verbose);

    // Graceful shutdown on SIGINT/SIGTERM
    let running = manager.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    })
    .expect("Error setting Ctrl-C handler");

    log::info!("Loading configuration from: {}", cli.config.display());
    manager.start();

    ExitCode::SUCCESS
}
