use anyhow::Context;
use blum_clicker::config::Config;
use blum_clicker::{AppResult, GameLoopController, MonitorCapture, RdevInjector, TemplateSet};
use sysinfo::System;
use xcap::Monitor;

const LOG_TARGET_STARTUP: &str = "startup";

/// Initialize tracing with file rotation
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Get log directory in user config folder
    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("BlumClicker").join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));

    // Create log directory if it doesn't exist
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    // Create file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "blum-clicker.log");

    // Configure filter (info level by default)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    // In debug builds, also log to console
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    // In release builds, only log to file
    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Blum Clicker v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);

    match Monitor::all() {
        Ok(monitors) => {
            tracing::info!(target: LOG_TARGET_STARTUP, "Displays: {} detected", monitors.len());
            for (index, monitor) in monitors.iter().enumerate() {
                tracing::debug!(
                    target: LOG_TARGET_STARTUP,
                    "  Display {}: {}x{}{}",
                    index,
                    monitor.width().unwrap_or(0),
                    monitor.height().unwrap_or(0),
                    if monitor.is_primary().unwrap_or(false) { " (primary)" } else { "" }
                );
            }
        }
        Err(e) => tracing::warn!(target: LOG_TARGET_STARTUP, "Could not list displays: {}", e),
    }
}

fn run() -> AppResult<()> {
    let config = Config::load()
        .with_context(|| format!("Config file: {}", Config::config_path_display()))?;
    let templates = TemplateSet::load(&config)?;

    let capture = MonitorCapture::primary().context(
        "On macOS grant Screen Recording permission \
         (System Settings > Privacy & Security > Screen Recording)",
    )?;
    let injector = RdevInjector::new();

    tracing::info!("Bring the game window into view. Click or scroll between rounds to stop.");

    let controller = GameLoopController::new(config, templates, capture, injector);
    let stats = controller.run()?;
    tracing::info!("Stopped after {} rounds", stats.rounds);
    Ok(())
}

fn main() {
    initialize_tracing();
    log_runtime_environment();

    if let Err(e) = run() {
        tracing::error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
