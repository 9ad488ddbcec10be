//! Copy a text database into SQLite.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin import_text_db -- [<data_dir>] [<db_path>]
//! ```
//!
//! Both paths default to the configured `data_dir` and `db_path`. Every
//! collection already in the SQLite file is replaced.

#![allow(non_snake_case)]

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use Wardbook::adapters::sanitize::SanitizingMakeWriter;
use Wardbook::adapters::sqlite::SqliteStorage;
use Wardbook::adapters::textdb::TextStorage;
use Wardbook::config::AppConfig;
use Wardbook::ports::Storage;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(SanitizingMakeWriter::new(std::io::stderr))
        .init();

    let config = AppConfig::load()?;
    let mut args = env::args().skip(1).peekable();
    if matches!(args.peek().map(String::as_str), Some("-h" | "--help")) {
        eprintln!("Usage: import_text_db [<data_dir>] [<db_path>]");
        return Ok(());
    }
    let data_dir = args.next().map_or(config.data_dir, PathBuf::from);
    let db_path = args.next().map_or(config.db_path, PathBuf::from);

    let source = TextStorage::new(&data_dir);
    let target = SqliteStorage::new(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    let users = source.load_users()?;
    let appointments = source.load_appointments()?;
    let records = source.load_medical_records()?;
    let medications = source.load_medications()?;
    let requests = source.load_replenishment_requests()?;
    let schedules = source.load_schedules()?;

    target.save_users(&users)?;
    target.save_appointments(&appointments)?;
    target.save_medical_records(&records)?;
    target.save_medications(&medications)?;
    target.save_replenishment_requests(&requests)?;
    target.save_schedules(&schedules)?;

    tracing::info!(
        "Imported {} users, {} appointments, {} records, {} medications, {} requests, {} schedules from {} into {}",
        users.len(),
        appointments.len(),
        records.len(),
        medications.len(),
        requests.len(),
        schedules.len(),
        data_dir.display(),
        db_path.display()
    );
    Ok(())
}
