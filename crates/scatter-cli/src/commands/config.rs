use anyhow::Result;
use std::path::Path;

use scatter_core::config::ScatterConfig;

pub fn run(base_dir: &Path) -> Result<()> {
    let config_path = ScatterConfig::default_path(base_dir);
    let config = ScatterConfig::load(&config_path)?;

    println!("Config: {}", config_path.display());
    println!("  db_path:       {}", config.engine.db_path);
    println!("  chunk_size:    {}", config.engine.chunk_size);
    println!("  max_transfers: {}", config.engine.max_transfers);
    println!("  placement:     {:?}", config.engine.placement);
    println!(
        "  retry:         {} attempts, {} ms base delay",
        config.engine.retry.max_attempts, config.engine.retry.base_delay_ms
    );
    match config.engine.max_versions {
        Some(n) => println!("  max_versions:  {n}"),
        None => println!("  max_versions:  unbounded"),
    }

    if config.providers.is_empty() {
        println!("\nNo providers configured (local fallback in use).");
    } else {
        println!("\nProviders:");
        for p in &config.providers {
            println!(
                "  {:<20} {:<14} root={} weight={}",
                p.name, p.provider_type, p.root, p.weight
            );
        }
    }
    Ok(())
}
