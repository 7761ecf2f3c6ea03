use anyhow::Result;
use std::path::Path;

use scatter_core::config::ScatterConfig;
use scatter_core::manifest::ManifestDb;

pub fn run(base_dir: &Path) -> Result<()> {
    println!("Initializing scatter in {}", base_dir.display());

    std::fs::create_dir_all(base_dir)?;

    let config_path = ScatterConfig::default_path(base_dir);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = ScatterConfig::default_config(base_dir);
        config.save(&config_path)?;
        println!("Created config: {}", config_path.display());
    }

    let config = ScatterConfig::load(&config_path)?;
    let db_path = Path::new(&config.engine.db_path);
    let _db = ManifestDb::open(db_path)?;
    println!("Initialized database: {}", db_path.display());

    println!("\nScatter initialized. Next steps:");
    println!("  1. Add providers to {}", config_path.display());
    println!("  2. Run `scatter upload <path>` to store your first file");

    Ok(())
}
