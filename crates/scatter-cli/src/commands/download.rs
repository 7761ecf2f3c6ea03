use anyhow::Result;
use std::path::Path;

use super::{format_bytes, open_engine};

pub async fn run(
    file_id: &str,
    dest: &Path,
    version: Option<i64>,
    base_dir: &Path,
) -> Result<()> {
    let engine = open_engine(base_dir).await?;

    let data = engine.download(file_id, version).await?;
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(dest, &data)?;

    println!(
        "Wrote {} to {}",
        format_bytes(data.len() as u64),
        dest.display()
    );
    Ok(())
}
