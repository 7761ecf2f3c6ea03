//! End-to-end engine tests against in-memory mock providers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scatter_core::engine::{CancelFlag, EngineOptions, RetryPolicy, StorageEngine};
use scatter_core::manifest::ManifestDb;
use scatter_core::provider::{ProviderAdapter, ProviderHandle};
use scatter_core::types::{PlacementStrategy, ProviderType};
use scatter_core::ScatterError;

/// In-memory provider with switchable failure modes.
struct MockAdapter {
    name: String,
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    fail_all_puts: Arc<AtomicBool>,
    /// Fail puts whose key contains this substring.
    fail_put_matching: Option<String>,
    fail_probe: Arc<AtomicBool>,
}

impl MockAdapter {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            store: Arc::default(),
            deleted: Arc::default(),
            fail_all_puts: Arc::default(),
            fail_put_matching: None,
            fail_probe: Arc::default(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<String> {
        if self.fail_all_puts.load(Ordering::SeqCst) {
            anyhow::bail!("{}: injected put failure", self.name);
        }
        if let Some(pat) = &self.fail_put_matching {
            if key.contains(pat.as_str()) {
                anyhow::bail!("{}: injected put failure for {key}", self.name);
            }
        }
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(key.to_string())
    }

    async fn get(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        self.store
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{}: no object at {locator}", self.name))
    }

    async fn delete(&self, locator: &str) -> anyhow::Result<()> {
        self.store.lock().unwrap().remove(locator);
        self.deleted.lock().unwrap().push(locator.to_string());
        Ok(())
    }

    async fn probe(&self) -> anyhow::Result<()> {
        if self.fail_probe.load(Ordering::SeqCst) {
            anyhow::bail!("{}: injected probe failure", self.name);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handles into a mock provider's state, kept for assertions after the
/// adapter has been moved into the engine.
struct MockControls {
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    fail_all_puts: Arc<AtomicBool>,
}

impl MockControls {
    fn chunk_count(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    fn is_empty(&self) -> bool {
        self.store.lock().unwrap().is_empty()
    }
}

fn test_options() -> EngineOptions {
    EngineOptions {
        chunk_size: 4,
        max_transfers: 4,
        strategy: PlacementStrategy::RoundRobin,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        },
        max_versions: None,
    }
}

fn build_engine(
    adapters: Vec<MockAdapter>,
    opts: EngineOptions,
) -> (StorageEngine, Vec<MockControls>) {
    let db = ManifestDb::open_in_memory().unwrap();
    let mut handles = Vec::new();
    let mut controls = Vec::new();
    for adapter in adapters {
        let id = db
            .insert_provider(&adapter.name, ProviderType::Local, "/mock", None, 1)
            .unwrap();
        let info = db
            .list_providers()
            .unwrap()
            .into_iter()
            .find(|p| p.id == id)
            .unwrap();
        controls.push(MockControls {
            store: Arc::clone(&adapter.store),
            deleted: Arc::clone(&adapter.deleted),
            fail_all_puts: Arc::clone(&adapter.fail_all_puts),
        });
        handles.push(ProviderHandle::new(info, Arc::new(adapter)));
    }
    (StorageEngine::new(db, handles, opts).unwrap(), controls)
}

fn three_mocks() -> Vec<MockAdapter> {
    vec![
        MockAdapter::new("alpha"),
        MockAdapter::new("beta"),
        MockAdapter::new("gamma"),
    ]
}

#[tokio::test]
async fn upload_scatters_and_download_reassembles() {
    let (engine, controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("demo.bin", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();

    // 9 bytes at chunk size 4: three chunks, one per provider.
    for c in &controls {
        assert_eq!(c.chunk_count(), 1);
    }

    let data = engine.download(&file_id, None).await.unwrap();
    assert_eq!(data, b"ABCDEFGHI");

    let files = engine.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "demo.bin");
    assert_eq!(files[0].chunk_count, 3);
}

#[tokio::test]
async fn update_makes_new_version_current_and_keeps_history() {
    let (engine, _controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();
    let v2 = engine
        .update(&file_id, &b"XYZ"[..], "second draft", &cancel)
        .await
        .unwrap();

    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"XYZ");

    let versions = engine.list_versions(&file_id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);
    assert!(versions.iter().find(|v| v.id == v2).unwrap().is_current);

    // The old version stays downloadable by id.
    let v1 = versions.iter().find(|v| v.id != v2).unwrap().id;
    assert_eq!(
        engine.download(&file_id, Some(v1)).await.unwrap(),
        b"ABCDEFGHI"
    );
}

#[tokio::test]
async fn restore_flips_pointer_without_moving_bytes() {
    let (engine, controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();
    engine
        .update(&file_id, &b"XYZ"[..], "", &cancel)
        .await
        .unwrap();

    let versions = engine.list_versions(&file_id).unwrap();
    let v1 = versions.iter().find(|v| !v.is_current).unwrap().id;

    let stored_before: usize = controls.iter().map(|c| c.chunk_count()).sum();
    engine.restore(&file_id, v1).await.unwrap();
    let stored_after: usize = controls.iter().map(|c| c.chunk_count()).sum();

    assert_eq!(stored_before, stored_after);
    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"ABCDEFGHI");

    // Restoring the already-current version is a no-op.
    engine.restore(&file_id, v1).await.unwrap();
    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"ABCDEFGHI");
}

#[tokio::test]
async fn failed_first_upload_leaves_nothing_behind() {
    let mut adapter = MockAdapter::new("solo");
    adapter.fail_put_matching = Some("000001".to_string());
    let (engine, controls) = build_engine(vec![adapter], test_options());
    let cancel = CancelFlag::new();

    let err = engine
        .upload("doomed", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ScatterError::ChunkUploadFailed { .. }));

    // Compensating deletes cleaned up every acknowledged write and the
    // file never came into existence.
    assert!(controls[0].is_empty());
    assert!(engine.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn failed_update_keeps_previous_version_current() {
    let (engine, controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();

    for c in &controls {
        c.fail_all_puts.store(true, Ordering::SeqCst);
    }
    let err = engine
        .update(&file_id, &b"NEW CONTENT!"[..], "", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ScatterError::ChunkUploadFailed { .. }));

    for c in &controls {
        c.fail_all_puts.store(false, Ordering::SeqCst);
    }

    // The failed version is invisible and the old bytes still read back.
    assert_eq!(engine.list_versions(&file_id).unwrap().len(), 1);
    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"ABCDEFGHI");
}

#[tokio::test]
async fn chunk_replaced_once_when_provider_dies_mid_upload() {
    let mut adapters = three_mocks();
    adapters[1].fail_all_puts.store(true, Ordering::SeqCst);
    let (engine, controls) = build_engine(adapters, test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();

    // The failing provider holds nothing, its chunk landed elsewhere, and it
    // is now flagged dead.
    assert!(controls[1].is_empty());
    let total: usize = controls.iter().map(|c| c.chunk_count()).sum();
    assert_eq!(total, 3);
    assert!(!engine.providers()[1].is_live());

    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"ABCDEFGHI");
}

#[tokio::test]
async fn probe_excludes_dead_provider_from_placement() {
    let mut adapters = three_mocks();
    adapters[1].fail_probe.store(true, Ordering::SeqCst);
    let (engine, controls) = build_engine(adapters, test_options());

    let results = engine.probe_providers().await;
    assert_eq!(results.len(), 3);
    assert!(!results[1].1);

    // 5 chunks over the 2 surviving providers: 3 then 2, round robin.
    let cancel = CancelFlag::new();
    engine
        .upload("doc", &b"AAAABBBBCCCCDDDDEE"[..], &cancel)
        .await
        .unwrap();

    assert_eq!(controls[0].chunk_count(), 3);
    assert!(controls[1].is_empty());
    assert_eq!(controls[2].chunk_count(), 2);
}

#[tokio::test]
async fn cancelled_upload_rolls_back() {
    let (engine, controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ScatterError::Cancelled));

    for c in &controls {
        assert!(c.is_empty());
    }
    assert!(engine.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn delete_releases_chunks_of_all_versions() {
    let (engine, controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();
    engine
        .update(&file_id, &b"XYZ"[..], "", &cancel)
        .await
        .unwrap();

    engine.delete(&file_id).await.unwrap();

    for c in &controls {
        assert!(c.is_empty());
    }
    assert!(engine.list_files().unwrap().is_empty());
    assert!(matches!(
        engine.download(&file_id, None).await,
        Err(ScatterError::FileNotFound(_))
    ));

    let deletes: usize = controls.iter().map(|c| c.deleted.lock().unwrap().len()).sum();
    assert_eq!(deletes, 4); // 3 chunks in v1 + 1 in v2
}

#[tokio::test]
async fn corrupted_chunk_fails_download() {
    let (engine, controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();

    // Flip bytes behind the engine's back.
    {
        let mut store = controls[0].store.lock().unwrap();
        let key = store.keys().next().unwrap().clone();
        store.insert(key, b"corrupt!".to_vec());
    }

    assert!(matches!(
        engine.download(&file_id, None).await,
        Err(ScatterError::ChecksumMismatch(..))
    ));
}

#[tokio::test]
async fn verify_reports_current_version() {
    let (engine, _controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine
        .upload("doc", &b"ABCDEFGHI"[..], &cancel)
        .await
        .unwrap();
    let report = engine.verify(&file_id, None).await.unwrap();
    assert_eq!(report.chunks, 3);
    assert_eq!(report.bytes, 9);
}

#[tokio::test]
async fn empty_file_round_trips() {
    let (engine, _controls) = build_engine(three_mocks(), test_options());
    let cancel = CancelFlag::new();

    let file_id = engine.upload("empty", &b""[..], &cancel).await.unwrap();
    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"");

    let versions = engine.list_versions(&file_id).unwrap();
    assert_eq!(versions[0].chunk_count, 1);
    assert_eq!(versions[0].total_size, 0);
}

#[tokio::test]
async fn retention_prunes_oldest_stale_versions() {
    let opts = EngineOptions {
        max_versions: Some(1),
        ..test_options()
    };
    let (engine, _controls) = build_engine(three_mocks(), opts);
    let cancel = CancelFlag::new();

    let file_id = engine.upload("doc", &b"one"[..], &cancel).await.unwrap();
    engine
        .update(&file_id, &b"two"[..], "", &cancel)
        .await
        .unwrap();
    engine
        .update(&file_id, &b"three"[..], "", &cancel)
        .await
        .unwrap();

    // One stale version kept besides the current one; the oldest is gone.
    let versions = engine.list_versions(&file_id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(engine.download(&file_id, None).await.unwrap(), b"three");
    assert_eq!(
        engine.download(&file_id, Some(versions[0].id)).await.unwrap(),
        b"two"
    );
}

#[tokio::test]
async fn no_live_providers_fails_fast() {
    let mut adapters = three_mocks();
    for a in &mut adapters {
        a.fail_probe.store(true, Ordering::SeqCst);
    }
    let (engine, controls) = build_engine(adapters, test_options());
    engine.probe_providers().await;

    let cancel = CancelFlag::new();
    let err = engine
        .upload("doc", &b"data"[..], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ScatterError::NoProvidersAvailable));
    for c in &controls {
        assert!(c.is_empty());
    }
}
