pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "nearn")]
#[command(about = "NearnNext CLI - database migrations and scaffolding")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Directory holding NNN_name.sql files (default: migrations)")]
    pub migrations_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Database URL, overrides DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run pending migrations as one new batch")]
    Migrate,

    #[command(about = "Forget the latest batch (schema changes are kept)")]
    Rollback,

    #[command(about = "Show executed and pending migrations")]
    Status,

    #[command(about = "Drop all known tables and the ledger, then migrate")]
    Fresh {
        #[arg(long, help = "Allow dropping tables in production")]
        force: bool,
    },

    #[command(name = "make:migration", about = "Create a new numbered migration file")]
    MakeMigration {
        #[arg(help = "Migration name, e.g. create_tags_table")]
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Environment configuration with the command-line overrides applied.
fn resolve_config(cli: &Cli) -> AppConfig {
    let mut config = crate::config::config().clone();
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    if let Some(dir) = &cli.migrations_dir {
        config.migrations.directory = dir.clone();
    }
    config
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = resolve_config(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::migrate(&config, &output_format).await,
        Commands::Rollback => commands::migrate::rollback(&config, &output_format).await,
        Commands::Status => commands::migrate::status(&config, &output_format).await,
        Commands::Fresh { force } => commands::migrate::fresh(&config, force, &output_format).await,
        Commands::MakeMigration { name } => commands::make::make_migration(&config, &name, &output_format),
    }
}
