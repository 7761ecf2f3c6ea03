use anyhow::Result;
use std::path::Path;

use super::{format_bytes, open_engine};

pub async fn run(file_id: &str, json: bool, base_dir: &Path) -> Result<()> {
    let engine = open_engine(base_dir).await?;
    let versions = engine.list_versions(file_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No committed versions.");
        return Ok(());
    }

    println!(
        "{:<8} {:<9} {:>8} {:>10} {:<20} {}",
        "VERSION", "CURRENT", "CHUNKS", "SIZE", "CREATED", "NOTES"
    );
    println!("{}", "-".repeat(80));
    for v in &versions {
        println!(
            "{:<8} {:<9} {:>8} {:>10} {:<20} {}",
            v.id,
            if v.is_current { "*" } else { "" },
            v.chunk_count,
            format_bytes(v.total_size),
            v.created_at,
            v.notes,
        );
    }
    Ok(())
}
