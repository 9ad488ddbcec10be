//! Wardbook: terminal hospital management.
//!
//! Main entry point for the terminal application.

#![allow(non_snake_case)]

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use Wardbook::adapters::notify::{LogNotifier, TelegramNotifier};
use Wardbook::adapters::sanitize::SanitizingMakeWriter;
use Wardbook::adapters::sqlite::SqliteStorage;
use Wardbook::adapters::textdb::TextStorage;
use Wardbook::adapters::StorageError;
use Wardbook::application::HospitalService;
use Wardbook::config::{AppConfig, LogMode, StorageBackend};
use Wardbook::ports::{Notifier, Storage};
use Wardbook::tui::App;

type SharedNotifier = Arc<Box<dyn Notifier>>;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    let _guard = init_logging(&config)?;

    tracing::info!("Starting Wardbook...");

    let notifier: SharedNotifier = Arc::new(match &config.telegram_credentials {
        Some(path) => Box::new(TelegramNotifier::from_credentials_file(path)),
        None => Box::new(LogNotifier),
    });

    match config.storage {
        StorageBackend::Text => {
            tracing::info!("Using text database in {}", config.data_dir.display());
            run(Arc::new(TextStorage::new(&config.data_dir)), notifier)?;
        }
        StorageBackend::Sqlite => {
            tracing::info!("Using SQLite database {}", config.db_path.display());
            let storage = SqliteStorage::new(&config.db_path)
                .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
            run(Arc::new(storage), notifier)?;
        }
    }

    tracing::info!("Wardbook shutdown complete.");
    Ok(())
}

fn run<S>(storage: Arc<S>, notifier: SharedNotifier) -> Result<()>
where
    S: Storage,
    S::Error: Into<StorageError>,
{
    let service = HospitalService::load(storage, notifier).context("Failed to load hospital data")?;
    let mut app = App::new(service);
    app.run()
}

/// Writing logs to the terminal would corrupt the TUI, so interactive runs
/// log to a file unless told otherwise.
fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    let use_file = match config.log_mode {
        LogMode::File => true,
        LogMode::Stdout => false,
        LogMode::Auto => std::io::stdout().is_terminal(),
    };

    let (writer, guard) = if use_file {
        if let Some(parent) = config.log_file.parent() {
            // Best-effort: a missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}
