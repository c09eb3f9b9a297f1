mod common;

use anyhow::Result;
use serde_json::Value;

#[test]
fn make_migration_numbers_files_sequentially() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let first = common::nearn(dir.path(), &[], &["make:migration", "create_tags_table"])?;
    assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
    assert!(dir.path().join("001_create_tags_table.sql").exists());

    let second = common::nearn(dir.path(), &[], &["--json", "make:migration", "add_tag_index"])?;
    assert!(second.status.success(), "stderr: {}", String::from_utf8_lossy(&second.stderr));
    assert!(dir.path().join("002_add_tag_index.sql").exists());

    let body: Value = serde_json::from_slice(&second.stdout)?;
    assert_eq!(body["success"], true);
    assert_eq!(body["file"], "002_add_tag_index.sql");
    Ok(())
}

#[test]
fn make_migration_rejects_bad_names() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let output = common::nearn(dir.path(), &[], &["make:migration", "drop table;"])?;
    assert!(!output.status.success());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn fresh_in_production_requires_force() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let output = common::nearn(dir.path(), &[("APP_ENV", "production")], &["fresh"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Refusing"));
    Ok(())
}

#[test]
fn status_without_database_fails_cleanly() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let output = common::nearn(dir.path(), &[], &["status"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
    Ok(())
}
