use async_trait::async_trait;
use sqlx::{Executor, PgPool};

use crate::database::models::MigrationRecord;
use crate::database::{DatabaseError, DatabaseManager};

/// Name of the table recording applied migrations.
pub const LEDGER_TABLE: &str = "migrations";

/// Everything the migration runner needs from the database.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create the ledger table if it does not exist.
    async fn ensure_ledger(&self) -> Result<(), DatabaseError>;

    /// Ledger rows in insertion order.
    async fn executed(&self) -> Result<Vec<MigrationRecord>, DatabaseError>;

    /// Highest batch number, 0 when the ledger is empty.
    async fn latest_batch(&self) -> Result<i32, DatabaseError>;

    /// Run one raw SQL statement.
    async fn execute(&self, statement: &str) -> Result<(), DatabaseError>;

    async fn record(&self, name: &str, batch: i32) -> Result<(), DatabaseError>;

    /// Migration names of a batch, most recent first.
    async fn batch_names(&self, batch: i32) -> Result<Vec<String>, DatabaseError>;

    /// Delete the ledger rows of a batch. The schema changes stay in place.
    async fn delete_batch(&self, batch: i32) -> Result<u64, DatabaseError>;

    /// `DROP TABLE IF EXISTS ... CASCADE`
    async fn drop_table(&self, table: &str) -> Result<(), DatabaseError>;
}

#[derive(Clone)]
pub struct PgMigrationStore {
    pool: PgPool,
}

impl PgMigrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    async fn ensure_ledger(&self) -> Result<(), DatabaseError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                id SERIAL PRIMARY KEY,
                migration VARCHAR(255) NOT NULL,
                batch INT NOT NULL,
                executed_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn executed(&self) -> Result<Vec<MigrationRecord>, DatabaseError> {
        let sql = format!("SELECT id, migration, batch, executed_at FROM {LEDGER_TABLE} ORDER BY id");
        let rows = sqlx::query_as::<_, MigrationRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn latest_batch(&self) -> Result<i32, DatabaseError> {
        let sql = format!("SELECT COALESCE(MAX(batch), 0) FROM {LEDGER_TABLE}");
        let batch: i32 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(batch)
    }

    async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
        // Unprepared, so DDL and multi-line statements run as written.
        (&self.pool).execute(statement).await?;
        Ok(())
    }

    async fn record(&self, name: &str, batch: i32) -> Result<(), DatabaseError> {
        let sql = format!("INSERT INTO {LEDGER_TABLE} (migration, batch) VALUES ($1, $2)");
        sqlx::query(&sql)
            .bind(name)
            .bind(batch)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn batch_names(&self, batch: i32) -> Result<Vec<String>, DatabaseError> {
        let sql = format!("SELECT migration FROM {LEDGER_TABLE} WHERE batch = $1 ORDER BY id DESC");
        let names = sqlx::query_scalar::<_, String>(&sql)
            .bind(batch)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn delete_batch(&self, batch: i32) -> Result<u64, DatabaseError> {
        let sql = format!("DELETE FROM {LEDGER_TABLE} WHERE batch = $1");
        let result = sqlx::query(&sql).bind(batch).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn drop_table(&self, table: &str) -> Result<(), DatabaseError> {
        let sql = format!(
            "DROP TABLE IF EXISTS {} CASCADE",
            DatabaseManager::quote_identifier(table)
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
