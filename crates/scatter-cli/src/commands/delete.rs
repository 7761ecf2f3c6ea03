use anyhow::Result;
use std::path::Path;

use super::open_engine;

pub async fn run(file_id: &str, base_dir: &Path) -> Result<()> {
    let engine = open_engine(base_dir).await?;
    engine.delete(file_id).await?;
    println!("Deleted file {file_id} and all its versions");
    Ok(())
}
