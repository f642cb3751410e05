use std::path::Path;

use poic_core::auth::{BearerToken, CredentialSource, StoredCredential};
use poic_core::db::LibSqlKvStore;

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_connect(token: &str, db_path: &Path) -> Result<(), CliError> {
    let Some(token) = BearerToken::new(token) else {
        return Err(CliError::Core(poic_core::Error::InvalidInput(
            "Access token must not be empty".to_string(),
        )));
    };

    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    StoredCredential::store(&kv, &token).await?;

    println!("Connected to Dropbox. Run `poic sync --full` to reconcile.");
    Ok(())
}

pub async fn run_status(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let credential = StoredCredential::load(&kv).await?;

    if credential.has_credential() {
        println!("Connected (token stored)");
    } else {
        println!("Not connected");
    }
    Ok(())
}

pub async fn run_logout(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    StoredCredential::clear(&kv).await?;

    println!("Disconnected");
    Ok(())
}
