use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::ProviderInfo;

/// Uniform capability over one storage backend account.
///
/// Adapters are stateless per call; anything protocol-specific stays behind
/// this boundary.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Write a chunk under `key`, returning the locator to read it back with.
    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<String>;

    /// Read the bytes behind a locator.
    async fn get(&self, locator: &str) -> anyhow::Result<Vec<u8>>;

    /// Delete the bytes behind a locator.
    async fn delete(&self, locator: &str) -> anyhow::Result<()>;

    /// Check backend reachability.
    async fn probe(&self) -> anyhow::Result<()>;

    /// Provider name for display.
    fn name(&self) -> &str;
}

/// A configured provider: its manifest identity, adapter, and liveness flag.
///
/// Liveness is written by probes and read by placement without locking;
/// a stale reading costs at most one extra failed attempt, which the retry
/// path absorbs.
pub struct ProviderHandle {
    pub info: ProviderInfo,
    pub adapter: Arc<dyn ProviderAdapter>,
    live: AtomicBool,
}

impl ProviderHandle {
    pub fn new(info: ProviderInfo, adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            info,
            adapter,
            live: AtomicBool::new(true),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Relaxed);
    }
}
