//! PoIC CLI - card notes from the terminal
//!
//! Capture, link, and organize index cards locally, and reconcile them
//! with a Dropbox folder on demand.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{AuthCommands, Cli, Commands, ConfigCommands};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("poic=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add {
            title,
            body,
            kind,
            tags,
            due,
        } => commands::add::run_add(&title, &body, kind, &tags, due.as_deref(), &db_path).await?,
        Commands::List {
            limit,
            kind,
            tag,
            json,
        } => commands::list::run_list(limit, kind, tag.as_deref(), json, &db_path).await?,
        Commands::Show { card } => commands::show::run_show(&card, &db_path).await?,
        Commands::Edit { card } => commands::edit::run_edit(&card, &db_path).await?,
        Commands::Rename { card, title } => {
            commands::rename::run_rename(&card, &title, &db_path).await?;
        }
        Commands::Delete { card } => commands::delete::run_delete(&card, &db_path).await?,
        Commands::Pin { card } => commands::pin::run_pin(&card, &db_path).await?,
        Commands::Done { card } => commands::done::run_done(&card, &db_path).await?,
        Commands::Sync { full } => commands::sync::run_sync(full, &db_path).await?,
        Commands::Auth { command } => match command {
            AuthCommands::Connect { token } => {
                commands::auth_cmd::run_connect(&token, &db_path).await?;
            }
            AuthCommands::Status => commands::auth_cmd::run_status(&db_path).await?,
            AuthCommands::Logout => commands::auth_cmd::run_logout(&db_path).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config::run_show(&db_path).await?,
            ConfigCommands::Set {
                folder,
                retention_days,
                debounce_ms,
                date_format,
            } => {
                commands::config::run_set(folder, retention_days, debounce_ms, date_format, &db_path)
                    .await?;
            }
        },
    }

    Ok(())
}
