use std::path::Path;

use poic_core::auth::{CredentialSource, StoredCredential};
use poic_core::collection::CardCollection;
use poic_core::config::Settings;
use poic_core::db::LibSqlKvStore;
use poic_core::remote::{CardStore, DropboxFiles};
use poic_core::sync::{ChangeTracker, RetentionPolicy, SyncEngine, SyncMode, SyncReport};

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_sync(full: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());

    let credential = StoredCredential::load(&kv).await?;
    if !credential.has_credential() {
        return Err(CliError::NotConnected);
    }

    let settings = Settings::load(&kv).await?;
    let remote = DropboxFiles::new(credential)?;
    let store = CardStore::new(remote, settings.remote_folder.clone());
    let mut engine = SyncEngine::new(store, RetentionPolicy::new(settings.retention_days));

    let mut collection = CardCollection::load(&kv).await?;
    let mut tracker = ChangeTracker::load(&kv).await?;
    let mode = if full {
        SyncMode::Full
    } else {
        SyncMode::Incremental
    };

    match engine.sync(&mut collection, &mut tracker, mode).await {
        Ok(report) => {
            collection.persist(&kv).await?;
            tracker.persist(&kv).await?;
            tracing::debug!("Sync report: {report:?}");
            print_report(&report);
            Ok(())
        }
        Err(error) if error.is_auth() => {
            // The dirty set was restored by the engine; keep it for the
            // next attempt after re-authentication.
            tracker.persist(&kv).await?;
            Err(CliError::Disconnected)
        }
        Err(error) => Err(error.into()),
    }
}

fn print_report(report: &SyncReport) {
    let mut parts = Vec::new();
    if report.uploaded > 0 {
        parts.push(format!("{} uploaded", report.uploaded));
    }
    if report.tombstones_pushed > 0 {
        parts.push(format!("{} deletions pushed", report.tombstones_pushed));
    }
    if report.adopted > 0 {
        parts.push(format!("{} downloaded", report.adopted));
    }
    if report.healed > 0 {
        parts.push(format!("{} healed", report.healed));
    }
    if report.purged > 0 {
        parts.push(format!("{} purged", report.purged));
    }
    if report.failed > 0 {
        parts.push(format!("{} failed (will retry)", report.failed));
    }

    if parts.is_empty() {
        println!("Already in sync");
    } else {
        println!("Sync completed: {}", parts.join(", "));
    }
}
