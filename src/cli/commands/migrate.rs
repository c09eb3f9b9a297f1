use anyhow::{bail, Context};
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, Environment};
use crate::database::DatabaseManager;
use crate::migration::{MigrationState, Migrator, PgMigrationStore};

const ROLLBACK_WARNING: &str =
    "Rollback only removes ledger entries. Tables and data created by these migrations are still in the database.";

async fn migrator(config: &AppConfig) -> anyhow::Result<Migrator<PgMigrationStore>> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                DatabaseManager::redacted_url(&config.database.url)
            )
        })?;
    Ok(Migrator::new(
        PgMigrationStore::new(pool),
        &config.migrations.directory,
    ))
}

pub async fn migrate(config: &AppConfig, output_format: &OutputFormat) -> anyhow::Result<()> {
    let report = migrator(config).await?.migrate().await?;

    let message = match report.batch {
        Some(batch) => {
            if let OutputFormat::Text = output_format {
                for name in &report.applied {
                    println!("  migrated  {}", name);
                }
            }
            format!("Applied {} migrations in batch {}", report.applied.len(), batch)
        }
        None => "Nothing to migrate".to_string(),
    };

    output_success(output_format, &message, Some(serde_json::to_value(&report)?))
}

pub async fn rollback(config: &AppConfig, output_format: &OutputFormat) -> anyhow::Result<()> {
    let report = migrator(config).await?.rollback().await?;

    let Some(batch) = report.batch else {
        return output_success(output_format, "No migrations to roll back", None);
    };

    if let OutputFormat::Text = output_format {
        for name in &report.forgotten {
            println!("  forgotten {}", name);
        }
    }
    output_warning(output_format, ROLLBACK_WARNING);

    let mut data = serde_json::to_value(&report)?;
    data["warning"] = json!(ROLLBACK_WARNING);
    output_success(
        output_format,
        &format!("Rolled back batch {} ({} migrations)", batch, report.forgotten.len()),
        Some(data),
    )
}

pub async fn status(config: &AppConfig, output_format: &OutputFormat) -> anyhow::Result<()> {
    let migrator = migrator(config).await?;
    let report = migrator.status().await?;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if report.migrations.is_empty() {
                println!("No migration files found in {}", migrator.directory().display());
            } else {
                println!("{:<48} {}", "MIGRATION", "STATUS");
                println!("{}", "-".repeat(58));
                for entry in &report.migrations {
                    let state = match entry.state {
                        MigrationState::Executed => "Executed",
                        MigrationState::Pending => "Pending",
                    };
                    println!("{:<48} {}", entry.name, state);
                }
            }
            println!();
            println!("Total: {} files, {} executed", report.total_files, report.executed);
        }
    }
    Ok(())
}

pub async fn fresh(config: &AppConfig, force: bool, output_format: &OutputFormat) -> anyhow::Result<()> {
    if config.environment == Environment::Production && !force {
        output_error(output_format, "Refusing to drop tables in production")?;
        bail!("fresh in production requires --force");
    }

    let report = migrator(config)
        .await?
        .fresh(&config.migrations.fresh_tables)
        .await?;

    if let OutputFormat::Text = output_format {
        for table in &report.dropped {
            println!("  dropped   {}", table);
        }
        for name in &report.migrate.applied {
            println!("  migrated  {}", name);
        }
    }

    output_success(
        output_format,
        &format!(
            "Dropped {} tables and applied {} migrations",
            report.dropped.len(),
            report.migrate.applied.len()
        ),
        Some(serde_json::to_value(&report)?),
    )
}
