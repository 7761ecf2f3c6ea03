use anyhow::Result;
use std::path::Path;

use super::{format_bytes, open_engine};

pub async fn run(file_id: &str, version: Option<i64>, base_dir: &Path) -> Result<()> {
    let engine = open_engine(base_dir).await?;
    let report = engine.verify(file_id, version).await?;
    println!(
        "Version {} verified: {} chunks, {}",
        report.version_id,
        report.chunks,
        format_bytes(report.bytes)
    );
    Ok(())
}
