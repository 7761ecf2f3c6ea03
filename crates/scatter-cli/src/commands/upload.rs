use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use super::{cancel_on_ctrl_c, open_engine};

pub async fn run(path: &Path, name: Option<&str>, base_dir: &Path) -> Result<()> {
    let path = path.canonicalize()?;
    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
    };

    let engine = open_engine(base_dir).await?;
    let cancel = cancel_on_ctrl_c();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Uploading {}", path.display()));

    let file = std::fs::File::open(&path)?;
    let file_id = engine.upload(&name, file, &cancel).await?;

    pb.finish_and_clear();
    println!("Stored '{name}'");
    println!("  file id: {file_id}");
    Ok(())
}
