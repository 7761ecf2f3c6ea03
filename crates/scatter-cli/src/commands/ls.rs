use anyhow::Result;
use std::path::Path;

use super::open_engine;

pub async fn run(json: bool, base_dir: &Path) -> Result<()> {
    let engine = open_engine(base_dir).await?;
    let files = engine.list_files()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("No files stored.");
        return Ok(());
    }

    println!("{:<38} {:>8} {}", "ID", "CHUNKS", "NAME");
    println!("{}", "-".repeat(70));
    for f in &files {
        println!("{:<38} {:>8} {}", f.id, f.chunk_count, f.name);
    }
    Ok(())
}
