//! veildav CLI
//!
//! Command-line tools for hidden contact and calendar sync.
//!
//! # Commands
//!
//! - `keygen` - Write a new master key file
//! - `sync` - Run one sync over a file-backed local store and server
//! - `inspect` - Show what the server stores
//! - `add-contact` - Create a local contact

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// veildav command-line tools.
#[derive(Parser)]
#[command(name = "veildav")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which records a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    /// Address books
    Contacts,
    /// Calendars
    Events,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new master key file
    Keygen {
        /// Key file to write
        #[arg(short, long)]
        out: PathBuf,

        /// Derive the key from a passphrase instead of generating it
        #[arg(short, long, requires = "salt")]
        passphrase: Option<String>,

        /// Salt for passphrase derivation
        #[arg(short, long)]
        salt: Option<String>,

        /// Overwrite an existing key file
        #[arg(short, long)]
        force: bool,
    },

    /// Run one sync over every collection
    Sync {
        /// Local store file
        #[arg(short, long)]
        local: PathBuf,

        /// Sync state file
        #[arg(short, long)]
        state: PathBuf,

        /// Server file
        #[arg(short, long)]
        remote: PathBuf,

        /// Master key file
        #[arg(short, long)]
        key: PathBuf,

        /// Record kind of the local store
        #[arg(long, value_enum, default_value = "contacts")]
        kind: Kind,

        /// Only sync collections with local changes
        #[arg(long)]
        local_changes_only: bool,

        /// Run deadline in seconds
        #[arg(short, long, default_value = "300")]
        timeout_secs: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show what the server stores
    Inspect {
        /// Server file
        #[arg(short, long)]
        remote: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create a new local contact
    AddContact {
        /// Local store file
        #[arg(short, long)]
        local: PathBuf,

        /// Collection path
        #[arg(short, long, default_value = "contacts/default")]
        collection: String,

        /// Formatted name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Keygen {
            out,
            passphrase,
            salt,
            force,
        } => {
            let derivation = passphrase.zip(salt);
            commands::keygen::run(&out, derivation, force)?;
        }
        Commands::Sync {
            local,
            state,
            remote,
            key,
            kind,
            local_changes_only,
            timeout_secs,
            format,
        } => {
            let files = commands::sync::SyncFiles {
                local,
                state,
                remote,
                key,
            };
            commands::sync::run(&files, kind, local_changes_only, timeout_secs, &format)?;
        }
        Commands::Inspect { remote, format } => {
            commands::inspect::run(&remote, &format)?;
        }
        Commands::AddContact {
            local,
            collection,
            name,
            email,
        } => {
            commands::add_contact::run(&local, &collection, &name, email.as_deref())?;
        }
    }

    Ok(())
}
