use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use super::{cancel_on_ctrl_c, open_engine};

pub async fn run(file_id: &str, path: &Path, notes: &str, base_dir: &Path) -> Result<()> {
    let path = path.canonicalize()?;
    let engine = open_engine(base_dir).await?;
    let cancel = cancel_on_ctrl_c();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Updating {file_id}"));

    let file = std::fs::File::open(&path)?;
    let version_id = engine.update(file_id, file, notes, &cancel).await?;

    pb.finish_and_clear();
    println!("File {file_id} updated: version {version_id} is now current");
    Ok(())
}
