//! CLI entry point for Lectern.
//!
//! The `lectern` binary opens the SQLite store named in the configuration
//! and runs one operation against it. Results are printed as JSON.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lectern_core::{Lectern, ProfileUpdate};
use lectern_store::SqliteKv;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_PATH, LecternConfig};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Lectern: video lesson catalog and learner profiles.
#[derive(Parser)]
#[command(name = "lectern", version, about = "Lectern catalog and user store")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// SQLite database file. Overrides the configuration.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the store from the JSON catalog and print lesson statistics.
    Seed {
        /// Catalog file. Overrides the configuration.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Print the category tree, optionally only categories with a tag.
    Categories {
        #[arg(long)]
        tag: Option<String>,
    },

    /// Print the lesson statistics written by the last seed.
    Stats,

    /// Print every user profile.
    Users,

    /// Print one user profile.
    User { username: String },

    /// Print the number of stored user records.
    Count,

    /// Record a login.
    Login { username: String, ip: String },

    /// Mark a video as watched.
    Complete { slug: String, username: String },

    /// Edit a user's profile fields.
    SetInfo {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        bugzilla: Option<String>,
    },

    /// Remove every stored key of a user.
    DeleteUser { username: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LecternConfig::load(&cli.config)?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_tracing(&config.log_level);

    let lectern = open(&config).await?;

    match cli.command {
        Commands::Seed { catalog } => {
            let path = catalog.unwrap_or(config.catalog_path);
            let stats = lectern
                .catalog
                .init(&path)
                .await
                .with_context(|| format!("failed to seed from {}", path.display()))?;
            print_json(&stats)
        }
        Commands::Categories { tag } => {
            lectern.catalog.load().await?;
            let categories = match tag {
                Some(tag) => lectern.catalog.by_tag(&tag),
                None => lectern.catalog.categories(),
            };
            print_json(&*categories)
        }
        Commands::Stats => print_json(&lectern.catalog.load_stats().await?),
        Commands::Users => print_json(&lectern.directory.list_all().await?),
        Commands::User { username } => print_json(&lectern.profiles.get(&username).await?),
        Commands::Count => print_json(&json!({ "users": lectern.directory.count().await? })),
        Commands::Login { username, ip } => {
            let logins = lectern.sessions.report_login(&username, &ip).await?;
            print_json(&json!({ "username": username, "loginCount": logins }))
        }
        Commands::Complete { slug, username } => {
            let added = lectern.sessions.report_completed(&slug, &username).await?;
            print_json(&json!({ "username": username, "slug": slug, "added": added }))
        }
        Commands::SetInfo {
            username,
            display_name,
            website,
            bugzilla,
        } => {
            let update = ProfileUpdate {
                display_name,
                website,
                bugzilla,
            };
            print_json(&lectern.profiles.update_info(&username, update).await?)
        }
        Commands::DeleteUser { username } => {
            let removed = lectern.profiles.delete(&username).await?;
            print_json(&json!({ "username": username, "removed": removed }))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn open(config: &LecternConfig) -> Result<Lectern> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let kv = SqliteKv::open(config.database_path.clone())
        .await
        .context("failed to open store")?;
    info!(path = %config.database_path.display(), "store opened");
    Ok(Lectern::new(Arc::new(kv)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize the global tracing subscriber. Logs go to stderr so stdout
/// stays valid JSON.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
