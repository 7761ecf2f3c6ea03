use async_trait::async_trait;
use std::path::{Path, PathBuf};

use scatter_core::provider::ProviderAdapter;

/// Filesystem-backed provider. Useful for local setups and testing; the
/// locator is the key itself, resolved under the base directory.
pub struct LocalAdapter {
    base_path: PathBuf,
    name: String,
}

impl LocalAdapter {
    pub fn new(base_path: &Path, name: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)?;
        Ok(Self {
            base_path: base_path.to_path_buf(),
            name: name.to_string(),
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl ProviderAdapter for LocalAdapter {
    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<String> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        Ok(key.to_string())
    }

    async fn get(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        Ok(std::fs::read(self.object_path(locator))?)
    }

    async fn delete(&self, locator: &str) -> anyhow::Result<()> {
        let path = self.object_path(locator);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    async fn probe(&self) -> anyhow::Result<()> {
        if !self.base_path.exists() {
            anyhow::bail!("Base path does not exist: {}", self.base_path.display());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(tmp.path(), "test-local").unwrap();

        let data = b"chunk bytes here";
        let key = "scatter/f1/v1/000000";

        let locator = adapter.put(key, data).await.unwrap();
        assert_eq!(locator, key);

        let fetched = adapter.get(&locator).await.unwrap();
        assert_eq!(fetched, data);

        adapter.delete(&locator).await.unwrap();
        assert!(adapter.get(&locator).await.is_err());
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(tmp.path(), "test-local").unwrap();
        adapter.delete("scatter/nope/v1/000000").await.unwrap();
    }

    #[tokio::test]
    async fn probe_ok() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(tmp.path(), "test-local").unwrap();
        adapter.probe().await.unwrap();
    }
}
