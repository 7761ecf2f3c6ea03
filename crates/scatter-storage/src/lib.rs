//! Provider adapters for the scatter engine.
//!
//! Each adapter implements [`ProviderAdapter`] over one backend account.
//! Cloud SDKs sit behind cargo features so a local-only build stays light.

mod azure;
mod gcs;
mod local;
mod s3;

pub use local::LocalAdapter;

#[cfg(feature = "s3")]
pub use s3::{S3Adapter, S3Options};

#[cfg(feature = "azure")]
pub use azure::AzureAdapter;

#[cfg(feature = "gcs")]
pub use gcs::GcsAdapter;

use std::path::Path;
use std::sync::Arc;

use scatter_core::config::ProviderConfig;
use scatter_core::provider::ProviderAdapter;
use scatter_core::types::ProviderType;

/// Build the adapter described by one `[[providers]]` config entry.
pub async fn build_adapter(cfg: &ProviderConfig) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
    match cfg.provider_type {
        ProviderType::Local => {
            let adapter = LocalAdapter::new(Path::new(&cfg.root), &cfg.name)?;
            Ok(Arc::new(adapter))
        }

        #[cfg(feature = "s3")]
        ProviderType::S3 => {
            let adapter = S3Adapter::new(&cfg.root, cfg.region.as_deref(), &cfg.name).await?;
            Ok(Arc::new(adapter))
        }

        #[cfg(feature = "s3")]
        ProviderType::S3Compatible => {
            let endpoint = cfg.endpoint_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("provider '{}': endpoint_url is required", cfg.name)
            })?;
            let adapter = S3Adapter::s3_compatible(
                &cfg.root,
                endpoint,
                cfg.region.as_deref(),
                &cfg.name,
                cfg.access_key.as_deref(),
                cfg.secret_key.as_deref(),
            )
            .await?;
            Ok(Arc::new(adapter))
        }

        #[cfg(feature = "azure")]
        ProviderType::Azure => {
            let account = cfg
                .account
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("provider '{}': account is required", cfg.name))?;
            let key = cfg.access_key.as_deref().ok_or_else(|| {
                anyhow::anyhow!("provider '{}': access_key is required", cfg.name)
            })?;
            let adapter = AzureAdapter::new(account, key, &cfg.root, &cfg.name)?;
            Ok(Arc::new(adapter))
        }

        #[cfg(feature = "gcs")]
        ProviderType::Gcs => {
            let adapter = GcsAdapter::new(&cfg.root, &cfg.name).await?;
            Ok(Arc::new(adapter))
        }

        #[allow(unreachable_patterns)]
        other => anyhow::bail!(
            "provider '{}': support for {other} is not compiled in",
            cfg.name
        ),
    }
}
