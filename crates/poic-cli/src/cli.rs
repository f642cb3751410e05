use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use poic_core::CardKind;

#[derive(Parser)]
#[command(name = "poic")]
#[command(about = "Pile of index cards: capture, link, and sync card notes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new card
    #[command(alias = "new")]
    Add {
        /// Card title (unique among live cards)
        title: String,
        /// Card body; piped stdin is used when omitted
        body: Vec<String>,
        /// Card kind
        #[arg(long, value_enum, default_value_t = KindArg::Record)]
        kind: KindArg,
        /// Tag the card (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Due date for Task cards, e.g. 2026-03-01
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
    },
    /// List cards, pinned first
    List {
        /// Number of cards to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Filter by kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one card with its backlinks
    Show {
        /// Card ID, unique ID prefix, or exact title
        card: String,
    },
    /// Edit a card's body in $EDITOR
    Edit {
        /// Card ID, unique ID prefix, or exact title
        card: String,
    },
    /// Rename a card, rewriting inbound [[links]]
    Rename {
        /// Card ID, unique ID prefix, or exact title
        card: String,
        /// New title
        title: String,
    },
    /// Delete a card (tombstoned, purged after the retention window)
    Delete {
        /// Card ID, unique ID prefix, or exact title
        card: String,
    },
    /// Toggle a card's pin
    Pin {
        /// Card ID, unique ID prefix, or exact title
        card: String,
    },
    /// Toggle a Task card's completion
    Done {
        /// Card ID, unique ID prefix, or exact title
        card: String,
    },
    /// Sync with Dropbox
    Sync {
        /// Also push cards never seen by the change tracker
        #[arg(long)]
        full: bool,
    },
    /// Manage the Dropbox credential
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a Dropbox access token
    Connect {
        /// Access token from the Dropbox app console
        #[arg(long, value_name = "TOKEN")]
        token: String,
    },
    /// Show connection status
    Status,
    /// Forget the stored token
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print current settings
    Show,
    /// Update settings
    Set {
        /// Dropbox folder holding the cards
        #[arg(long, value_name = "PATH")]
        folder: Option<String>,
        /// Tombstone retention window in days
        #[arg(long, value_name = "DAYS")]
        retention_days: Option<u32>,
        /// Sync debounce window in milliseconds
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,
        /// Timestamp display pattern, e.g. "YYYY/MM/DD HH:mm"
        #[arg(long, value_name = "PATTERN")]
        date_format: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Record,
    Discovery,
    Task,
    Reference,
}

impl From<KindArg> for CardKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Record => Self::Record,
            KindArg::Discovery => Self::Discovery,
            KindArg::Task => Self::Task,
            KindArg::Reference => Self::Reference,
        }
    }
}
