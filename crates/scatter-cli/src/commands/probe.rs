use anyhow::Result;
use std::path::Path;

use super::open_engine;

pub async fn run(base_dir: &Path) -> Result<()> {
    let engine = open_engine(base_dir).await?;

    println!("{:<24} STATUS", "PROVIDER");
    println!("{}", "-".repeat(36));
    let mut all_ok = true;
    for (name, live) in engine.probe_providers().await {
        println!("{:<24} {}", name, if live { "ok" } else { "UNREACHABLE" });
        all_ok &= live;
    }
    if !all_ok {
        anyhow::bail!("one or more providers are unreachable");
    }
    Ok(())
}
