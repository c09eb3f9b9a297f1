use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::migration::create_migration;

pub fn make_migration(config: &AppConfig, name: &str, output_format: &OutputFormat) -> anyhow::Result<()> {
    let path = create_migration(&config.migrations.directory, name)?;

    if let OutputFormat::Text = output_format {
        println!("Location: {}", path.display());
        println!("Next: add your SQL, then run `nearn migrate`");
    }

    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    output_success(
        output_format,
        &format!("Migration created: {}", filename),
        Some(json!({ "file": filename, "path": path.display().to_string() })),
    )
}
