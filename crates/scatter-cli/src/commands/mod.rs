pub mod config;
pub mod delete;
pub mod download;
pub mod init;
pub mod ls;
pub mod probe;
pub mod restore;
pub mod update;
pub mod upload;
pub mod verify;
pub mod versions;

use anyhow::Result;
use std::path::Path;
use tracing::warn;

use scatter_core::config::ScatterConfig;
use scatter_core::engine::{CancelFlag, StorageEngine};
use scatter_core::manifest::ManifestDb;
use scatter_core::provider::ProviderHandle;
use scatter_core::types::ProviderType;

/// Load config, open the manifest, register configured providers, and build
/// the engine. With no providers configured a local fallback under the base
/// directory is used so the tool works out of the box.
pub async fn open_engine(base_dir: &Path) -> Result<StorageEngine> {
    let config_path = ScatterConfig::default_path(base_dir);
    let config = ScatterConfig::load(&config_path)?;
    let db = ManifestDb::open(Path::new(&config.engine.db_path))?;

    let mut handles = Vec::new();
    if config.providers.is_empty() {
        let storage_path = base_dir.join("storage");
        let adapter = scatter_storage::LocalAdapter::new(&storage_path, "local-default")?;
        let id = ensure_registered(
            &db,
            "local-default",
            ProviderType::Local,
            storage_path.to_str().unwrap_or(""),
            None,
            1,
        )?;
        let info = provider_info(&db, id)?;
        handles.push(ProviderHandle::new(info, std::sync::Arc::new(adapter)));
    } else {
        for pc in &config.providers {
            let adapter = scatter_storage::build_adapter(pc).await?;
            let id = ensure_registered(
                &db,
                &pc.name,
                pc.provider_type,
                &pc.root,
                pc.region.as_deref(),
                pc.weight,
            )?;
            let info = provider_info(&db, id)?;
            handles.push(ProviderHandle::new(info, adapter));
        }
    }

    let engine = StorageEngine::new(db, handles, config.engine_options())?;

    for (name, live) in engine.probe_providers().await {
        if !live {
            warn!("provider '{name}' is unreachable and will be skipped for writes");
        }
    }
    Ok(engine)
}

fn ensure_registered(
    db: &ManifestDb,
    name: &str,
    provider_type: ProviderType,
    root: &str,
    region: Option<&str>,
    weight: u32,
) -> Result<i64> {
    match db.list_providers()?.iter().find(|p| p.name == name) {
        Some(p) => Ok(p.id),
        None => Ok(db.insert_provider(name, provider_type, root, region, weight)?),
    }
}

fn provider_info(db: &ManifestDb, id: i64) -> Result<scatter_core::types::ProviderInfo> {
    db.list_providers()?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| anyhow::anyhow!("provider {id} vanished from the manifest"))
}

/// Cancel flag wired to Ctrl-C, so an interrupted transfer rolls back
/// instead of leaving half a version on the providers.
pub fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, rolling back...");
            flag.cancel();
        }
    });
    cancel
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
