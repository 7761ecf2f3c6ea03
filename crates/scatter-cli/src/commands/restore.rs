use anyhow::Result;
use std::path::Path;

use super::open_engine;

pub async fn run(file_id: &str, version: i64, base_dir: &Path) -> Result<()> {
    let engine = open_engine(base_dir).await?;
    engine.restore(file_id, version).await?;
    println!("File {file_id}: version {version} is now current");
    Ok(())
}
