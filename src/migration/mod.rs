//! File-based SQL migrations tracked in a ledger table.
//!
//! Files named `NNN_description.sql` are applied in lexical order. Each run of
//! [`Migrator::migrate`] stamps the files it applies with one batch number,
//! and [`Migrator::rollback`] forgets the latest batch. Rolling back removes
//! ledger rows only: the SQL those migrations ran is not reversed, so a later
//! `migrate` replays them against the existing schema.

pub mod ledger;
pub mod scaffold;

use serde::Serialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::database::DatabaseError;

pub use ledger::{MigrationStore, PgMigrationStore, LEDGER_TABLE};
pub use scaffold::create_migration;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Migration {name} failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Invalid migration name '{0}'")]
    InvalidName(String),
}

/// A discovered `.sql` file. `name` is the file name without extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
}

/// List the `.sql` files of `dir` sorted by file name.
pub fn discover(dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Migrations directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(MigrationError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MigrationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push(MigrationFile {
                name: stem.to_string(),
                path: path.clone(),
            });
        }
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

/// Split SQL text on `;`. Fragments that are blank or hold only `--` comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|fragment| {
            fragment
                .lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrateReport {
    /// Batch stamped on this run, `None` when nothing was pending
    pub batch: Option<i32>,
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackReport {
    pub batch: Option<i32>,
    /// Ledger entries removed, most recent first
    pub forgotten: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    Executed,
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub name: String,
    pub state: MigrationState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub migrations: Vec<StatusEntry>,
    pub total_files: usize,
    /// Ledger rows, including any whose file is gone
    pub executed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreshReport {
    pub dropped: Vec<String>,
    pub migrate: MigrateReport,
}

/// Applies, forgets and reports migrations from one directory.
pub struct Migrator<S> {
    store: S,
    directory: PathBuf,
}

impl<S: MigrationStore> Migrator<S> {
    pub fn new(store: S, directory: impl Into<PathBuf>) -> Self {
        Self {
            store,
            directory: directory.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Apply every pending file in order under one new batch number.
    ///
    /// The first failing statement aborts the run. Statements already executed
    /// for that file are not undone and the file gets no ledger row.
    pub async fn migrate(&self) -> Result<MigrateReport, MigrationError> {
        self.store.ensure_ledger().await?;

        let files = discover(&self.directory)?;
        if files.is_empty() {
            info!("No migration files found in {}", self.directory.display());
            return Ok(MigrateReport::default());
        }

        let executed: HashSet<String> = self
            .store
            .executed()
            .await?
            .into_iter()
            .map(|record| record.migration)
            .collect();

        let pending: Vec<MigrationFile> = files
            .into_iter()
            .filter(|file| !executed.contains(&file.name))
            .collect();

        if pending.is_empty() {
            info!("All migrations are up to date");
            return Ok(MigrateReport::default());
        }

        let batch = self.store.latest_batch().await? + 1;
        info!("Applying {} pending migrations as batch {}", pending.len(), batch);

        let mut applied = Vec::with_capacity(pending.len());
        for file in pending {
            self.apply(&file, batch).await?;
            applied.push(file.name);
        }

        Ok(MigrateReport {
            batch: Some(batch),
            applied,
        })
    }

    async fn apply(&self, file: &MigrationFile, batch: i32) -> Result<(), MigrationError> {
        info!("Running migration {}", file.name);
        let sql = std::fs::read_to_string(&file.path).map_err(|source| MigrationError::Io {
            path: file.path.clone(),
            source,
        })?;

        let failed = |source| MigrationError::Failed {
            name: file.name.clone(),
            source,
        };

        for statement in split_statements(&sql) {
            self.store.execute(&statement).await.map_err(failed)?;
        }
        self.store.record(&file.name, batch).await.map_err(failed)?;
        Ok(())
    }

    /// Forget the latest batch.
    pub async fn rollback(&self) -> Result<RollbackReport, MigrationError> {
        self.store.ensure_ledger().await?;

        let batch = self.store.latest_batch().await?;
        if batch == 0 {
            info!("No migrations to roll back");
            return Ok(RollbackReport::default());
        }

        let forgotten = self.store.batch_names(batch).await?;
        let removed = self.store.delete_batch(batch).await?;
        info!("Removed {} ledger entries of batch {}", removed, batch);

        Ok(RollbackReport {
            batch: Some(batch),
            forgotten,
        })
    }

    pub async fn status(&self) -> Result<StatusReport, MigrationError> {
        self.store.ensure_ledger().await?;

        let files = discover(&self.directory)?;
        let records = self.store.executed().await?;
        let executed: HashSet<&str> = records.iter().map(|r| r.migration.as_str()).collect();

        let migrations = files
            .iter()
            .map(|file| StatusEntry {
                name: file.name.clone(),
                state: if executed.contains(file.name.as_str()) {
                    MigrationState::Executed
                } else {
                    MigrationState::Pending
                },
            })
            .collect();

        Ok(StatusReport {
            migrations,
            total_files: files.len(),
            executed: records.len(),
        })
    }

    /// Drop `tables` and the ledger, then migrate from scratch.
    pub async fn fresh(&self, tables: &[String]) -> Result<FreshReport, MigrationError> {
        let mut dropped = Vec::with_capacity(tables.len() + 1);
        for table in tables.iter().map(String::as_str).chain([LEDGER_TABLE]) {
            warn!("Dropping table {}", table);
            self.store.drop_table(table).await?;
            dropped.push(table.to_string());
        }

        let migrate = self.migrate().await?;
        Ok(FreshReport { dropped, migrate })
    }
}
