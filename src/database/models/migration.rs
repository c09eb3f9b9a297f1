use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the migration ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MigrationRecord {
    pub id: i32,
    pub migration: String,
    pub batch: i32,
    pub executed_at: DateTime<Utc>,
}
