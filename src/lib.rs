//! userdir: a user and group directory over SQLite.
//!
//! Users and groups are joined by a many-to-many membership relation. Every
//! mutation that touches more than one row (a user plus its memberships, a
//! group's full member list, a cascade delete) commits as one transaction, and
//! every caller error is detected before anything is written.
//!
//! # Architecture
//!
//! - [`core::store`]: the record store and its scoped transactions
//! - [`core::validate`]: shape and referential checks on incoming records
//! - [`core::directory`]: the `Directory` service handle
//! - [`plugins`]: user and group operations plus their command groups
//! - [`http`]: the JSON-over-HTTP adapter
//!
//! # Examples
//!
//! ```bash
//! userdir migrate
//! userdir group create admins
//! userdir user create --userid jsmith --first-name John --last-name Smith --group admins
//! userdir serve --bind 127.0.0.1:5000
//! ```

pub mod core;
pub mod http;
pub mod logging;
pub mod plugins;

use crate::core::config::DirectoryConfig;
use crate::core::directory::Directory;
use crate::core::{error, migration};
use clap::{Parser, Subcommand};
use plugins::{groups, users};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "userdir",
    version = env!("CARGO_PKG_VERSION"),
    about = "User and group directory service"
)]
struct Cli {
    /// TOML config file. Defaults to ./userdir.toml when present.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database file; overrides config and environment.
    #[clap(long, global = true)]
    database: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate the store, then serve the HTTP API.
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:5000.
        #[clap(long)]
        bind: Option<String>,
    },
    /// Create or upgrade the database schema and exit.
    Migrate,
    /// User records
    User(users::UserCli),
    /// Groups and member lists
    Group(groups::GroupCli),
    /// Print the command schema as JSON.
    Schema,
}

pub fn run() -> Result<(), error::DirectoryError> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let mut config = DirectoryConfig::load(cli.config.as_deref(), &cwd)?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    logging::init(&config.log_filter);

    match cli.command {
        Command::Schema => {
            print_json(&serde_json::json!({
                "name": "userdir",
                "version": env!("CARGO_PKG_VERSION"),
                "subsystems": [users::schema(), groups::schema()],
            }));
        }
        Command::Migrate => {
            let (_, report) = Directory::open(&config)?;
            print_migration(&config, &report);
        }
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            let (directory, report) = Directory::open(&config)?;
            tracing::info!(
                db = %config.database.display(),
                schema_version = report.to_version,
                "store ready"
            );
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(http::serve(directory, &config.bind))?;
        }
        Command::User(user_cli) => {
            let (directory, _) = Directory::open(&config)?;
            print_json(&users::run_user_cli(&directory, user_cli)?);
        }
        Command::Group(group_cli) => {
            let (directory, _) = Directory::open(&config)?;
            print_json(&groups::run_group_cli(&directory, group_cli)?);
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", value),
    }
}

fn print_migration(config: &DirectoryConfig, report: &migration::MigrationReport) {
    use colored::Colorize;

    if report.applied {
        println!(
            "{} schema v{} → v{} at {}",
            "✓".bright_green(),
            report.from_version,
            report.to_version.to_string().bright_green(),
            config.database.display()
        );
    } else {
        println!(
            "{} schema already at v{} ({})",
            "ℹ".bright_blue(),
            report.to_version,
            config.database.display()
        );
    }
}
