use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use super::MigrationError;

fn template(filename: &str, name: &str, created: &str) -> String {
    format!(
        "-- Migration: {filename}
-- Description: {description}
-- Created: {created}

-- Write the SQL for this migration here.
-- Example:
-- CREATE TABLE IF NOT EXISTS table_name (
--   id BIGSERIAL PRIMARY KEY,
--   name VARCHAR(255) NOT NULL,
--   created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
--   updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
-- );

-- Example INSERT:
-- INSERT INTO table_name (name) VALUES ('Sample Data')
-- ON CONFLICT DO NOTHING;
",
        description = name.replace('_', " "),
    )
}

fn validate_name(name: &str) -> Result<&str, MigrationError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(MigrationError::InvalidName(name.to_string()))
    }
}

/// Leading digits of a migration file name, `Some(3)` for `003_add_tags.sql`.
fn sequence_number(file_name: &str) -> Option<u32> {
    let digits: String = file_name.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Write `NNN_<name>.sql` into `dir`, numbered after the highest existing prefix.
/// An existing file is never replaced.
pub fn create_migration(dir: &Path, name: &str) -> Result<PathBuf, MigrationError> {
    let name = validate_name(name)?;
    let io_err = |source| MigrationError::Io {
        path: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut highest = 0;
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        if let Some(number) = path.file_name().and_then(|f| f.to_str()).and_then(sequence_number) {
            highest = highest.max(number);
        }
    }

    let filename = format!("{:03}_{}.sql", highest + 1, name);
    let path = dir.join(&filename);
    let created = Utc::now().format("%Y-%m-%d").to_string();
    let write_err = |source| MigrationError::Io {
        path: path.clone(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(write_err)?;
    file.write_all(template(&filename, name, &created).as_bytes())
        .map_err(write_err)?;

    info!("Created migration {}", path.display());
    Ok(path)
}
