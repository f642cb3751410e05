use std::path::Path;

use poic_core::config::Settings;
use poic_core::db::LibSqlKvStore;

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_show(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let settings = Settings::load(&kv).await?;

    println!("remote_folder:  {}", settings.remote_folder);
    println!("retention_days: {}", settings.retention_days);
    println!("debounce_ms:    {}", settings.debounce_ms);
    println!("date_format:    {}", settings.date_format);
    Ok(())
}

pub async fn run_set(
    folder: Option<String>,
    retention_days: Option<u32>,
    debounce_ms: Option<u64>,
    date_format: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let mut settings = Settings::load(&kv).await?;

    if let Some(folder) = folder {
        settings.remote_folder = folder;
    }
    if let Some(retention_days) = retention_days {
        settings.retention_days = retention_days;
    }
    if let Some(debounce_ms) = debounce_ms {
        settings.debounce_ms = debounce_ms;
    }
    if let Some(date_format) = date_format {
        settings.date_format = date_format;
    }

    let settings = settings.normalized()?;
    settings.save(&kv).await?;

    println!("Settings updated");
    Ok(())
}
