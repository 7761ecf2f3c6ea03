mod retry;

pub use retry::{RetryPolicy, with_retry};

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::chunker::{ChunkPayload, Chunker, compute_checksum, reassemble};
use crate::error::{Result, ScatterError};
use crate::manifest::ManifestDb;
use crate::placement::PlacementPolicy;
use crate::provider::ProviderHandle;
use crate::types::{
    ChunkDescriptor, ChunkHash, FileListing, PlacementStrategy, ProviderInfo, VersionRecord,
    VersionState,
};

/// Caller-held handle for cancelling an in-flight upload. Cancellation routes
/// through the same compensating-delete rollback as a transfer failure.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine construction knobs, read once from configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub chunk_size: usize,
    /// Upper bound on concurrent chunk transfers per operation.
    pub max_transfers: usize,
    pub strategy: PlacementStrategy,
    pub retry: RetryPolicy,
    /// Stale versions kept per file; `None` keeps unbounded history.
    pub max_versions: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: 4 * 1024 * 1024,
            max_transfers: 4,
            strategy: PlacementStrategy::default(),
            retry: RetryPolicy::default(),
            max_versions: None,
        }
    }
}

/// Outcome of a `verify` audit.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub version_id: i64,
    pub chunks: u32,
    pub bytes: u64,
}

/// The chunked multi-provider storage engine.
///
/// Drives upload/download/delete/restore across the configured provider
/// adapters, with the manifest database as the only durable record. Mutations
/// on one file are serialized behind a per-file lock; unrelated files proceed
/// concurrently. Manifest calls are never held across a network await.
pub struct StorageEngine {
    db: StdMutex<ManifestDb>,
    providers: Arc<Vec<Arc<ProviderHandle>>>,
    placement: PlacementPolicy,
    chunker: Chunker,
    max_transfers: usize,
    retry: RetryPolicy,
    max_versions: Option<u32>,
    file_locks: StdMutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StorageEngine {
    pub fn new(db: ManifestDb, handles: Vec<ProviderHandle>, opts: EngineOptions) -> Result<Self> {
        Ok(Self {
            db: StdMutex::new(db),
            providers: Arc::new(handles.into_iter().map(Arc::new).collect()),
            placement: PlacementPolicy::new(opts.strategy),
            chunker: Chunker::new(opts.chunk_size)?,
            max_transfers: opts.max_transfers.max(1),
            retry: opts.retry,
            max_versions: opts.max_versions,
            file_locks: StdMutex::new(HashMap::new()),
        })
    }

    pub fn providers(&self) -> &[Arc<ProviderHandle>] {
        &self.providers
    }

    // ── Operation surface ──────────────────────────────────────

    /// Store a new file: creates the File and its first Version in one
    /// operation. A file that never commits a version does not exist.
    pub async fn upload<R: Read>(
        &self,
        name: &str,
        reader: R,
        cancel: &CancelFlag,
    ) -> Result<String> {
        let (chunks, file_hash, total_size) = self.split_payload(reader)?;
        let file_id = uuid::Uuid::now_v7().to_string();

        let lock = self.file_lock(&file_id);
        let _guard = lock.lock().await;

        self.with_db(|db| db.create_file(&file_id, name))?;
        match self
            .transfer_version(&file_id, "Initial version", chunks, file_hash, total_size, cancel)
            .await
        {
            Ok(version_id) => {
                info!("uploaded '{name}' as file {file_id} (version {version_id})");
                Ok(file_id)
            }
            Err(e) => {
                // First version never committed: the file must not exist.
                let cleanup = self.with_db(|db| {
                    if !db.has_complete_versions(&file_id)? {
                        db.delete_file(&file_id)?;
                    }
                    Ok(())
                });
                if let Err(cleanup_err) = cleanup {
                    warn!("failed to remove file record {file_id}: {cleanup_err}");
                }
                Err(e)
            }
        }
    }

    /// Create a new current version of an existing file.
    pub async fn update<R: Read>(
        &self,
        file_id: &str,
        reader: R,
        notes: &str,
        cancel: &CancelFlag,
    ) -> Result<i64> {
        self.with_db(|db| db.get_file(file_id).map(|_| ()))?;
        let (chunks, file_hash, total_size) = self.split_payload(reader)?;

        let lock = self.file_lock(file_id);
        let _guard = lock.lock().await;

        let notes = if notes.is_empty() {
            format!("Updated {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"))
        } else {
            notes.to_string()
        };
        let version_id = self
            .transfer_version(file_id, &notes, chunks, file_hash, total_size, cancel)
            .await?;
        info!("updated file {file_id}: version {version_id} is now current");
        Ok(version_id)
    }

    /// Fetch and reassemble a version (the current one by default).
    pub async fn download(&self, file_id: &str, version: Option<i64>) -> Result<Vec<u8>> {
        let (record, descriptors) = self.resolve_version(file_id, version)?;
        let parts = self.fetch_chunks(&descriptors).await?;
        let data = reassemble(record.id, record.chunk_count, parts)?;

        if let Some(expected) = &record.checksum {
            let actual = compute_checksum(&data).to_hex();
            if actual != *expected {
                return Err(ScatterError::ChecksumMismatch(
                    "file".to_string(),
                    expected.clone(),
                    actual,
                ));
            }
        }
        Ok(data)
    }

    /// Re-fetch and re-hash a version without producing output.
    pub async fn verify(&self, file_id: &str, version: Option<i64>) -> Result<VerifyReport> {
        let (record, _) = self.resolve_version(file_id, version)?;
        let data = self.download(file_id, Some(record.id)).await?;
        Ok(VerifyReport {
            version_id: record.id,
            chunks: record.chunk_count,
            bytes: data.len() as u64,
        })
    }

    /// Remove a file: best-effort physical deletes of every locator across
    /// every version, then the manifest rows. Irreversible; incomplete
    /// provider cleanup is accepted and logged, never rolled back.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let lock = self.file_lock(file_id);
        let _guard = lock.lock().await;

        let file = self.with_db(|db| db.get_file(file_id))?;
        let locations = self.with_db(|db| db.file_chunk_locations(file_id))?;
        self.best_effort_delete(&locations).await;
        self.with_db(|db| db.delete_file(file_id))?;
        info!(
            "deleted file {file_id} ('{}'): {} chunk locations released",
            file.name,
            locations.len()
        );
        Ok(())
    }

    /// Point the file at an older committed version. Never moves chunk
    /// bytes; restoring the already-current version is a no-op.
    pub async fn restore(&self, file_id: &str, version_id: i64) -> Result<()> {
        let lock = self.file_lock(file_id);
        let _guard = lock.lock().await;
        self.with_db(|db| db.set_current(file_id, version_id))?;
        info!("restored file {file_id} to version {version_id}");
        Ok(())
    }

    pub fn list_files(&self) -> Result<Vec<FileListing>> {
        self.with_db(|db| db.list_files())
    }

    pub fn list_versions(&self, file_id: &str) -> Result<Vec<VersionRecord>> {
        self.with_db(|db| db.list_versions(file_id))
    }

    /// Probe every configured provider and update its liveness flag.
    pub async fn probe_providers(&self) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.providers.len());
        for handle in self.providers.iter() {
            let ok = match handle.adapter.probe().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("provider '{}' failed probe: {e:#}", handle.info.name);
                    false
                }
            };
            handle.set_live(ok);
            results.push((handle.info.name.clone(), ok));
        }
        results
    }

    // ── Upload saga ────────────────────────────────────────────

    /// Transfer one version's chunks and commit it. On any failure or
    /// cancellation: compensating deletes of everything written, then abort.
    /// The file's prior current version stays authoritative either way.
    async fn transfer_version(
        &self,
        file_id: &str,
        notes: &str,
        chunks: Vec<ChunkPayload>,
        file_hash: ChunkHash,
        total_size: u64,
        cancel: &CancelFlag,
    ) -> Result<i64> {
        let live = self.live_provider_infos();
        let assignments = self.placement.assign(chunks.len(), &live)?;
        let chunk_count = chunks.len() as u32;

        let version_id = self.with_db(|db| db.begin_version(file_id, notes))?;

        // The saga log: every acknowledged provider write, recorded by the
        // transfer tasks themselves so aborted tasks are still covered.
        let written: Arc<StdMutex<Vec<(i64, String)>>> = Arc::default();

        let parallelism = chunks
            .len()
            .min(self.max_transfers)
            .min(live.len())
            .max(1);
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut tasks = JoinSet::new();

        for (chunk, provider_id) in chunks.into_iter().zip(assignments) {
            let providers = Arc::clone(&self.providers);
            let semaphore = Arc::clone(&semaphore);
            let written = Arc::clone(&written);
            let cancel = cancel.clone();
            let retry = self.retry;
            let placement = self.placement;
            let key = chunk_key(file_id, version_id, chunk.index);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                if cancel.is_cancelled() {
                    return Err(ScatterError::Cancelled);
                }
                put_chunk(
                    chunk,
                    provider_id,
                    version_id,
                    &key,
                    &providers,
                    placement,
                    &retry,
                    &written,
                )
                .await
            });
        }

        let mut failure: Option<ScatterError> = None;
        while let Some(joined) = tasks.join_next().await {
            if failure.is_none() && cancel.is_cancelled() {
                failure = Some(ScatterError::Cancelled);
            }
            match joined {
                Ok(Ok(desc)) => {
                    if failure.is_none() {
                        if let Err(e) = self.with_db(|db| db.record_chunk(&desc)) {
                            failure = Some(e);
                        }
                    }
                }
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(join_err) => {
                    if failure.is_none() && !join_err.is_cancelled() {
                        failure = Some(ScatterError::ChunkUploadFailed {
                            index: 0,
                            reason: join_err.to_string(),
                        });
                    }
                }
            }
            if failure.is_some() {
                tasks.abort_all();
            }
        }
        if failure.is_none() && cancel.is_cancelled() {
            failure = Some(ScatterError::Cancelled);
        }

        if failure.is_none() {
            if let Err(e) = self.with_db(|db| {
                db.commit_version(version_id, chunk_count, total_size, &file_hash, true)
            }) {
                failure = Some(e);
            }
        }

        match failure {
            None => {
                self.prune_history(file_id).await;
                Ok(version_id)
            }
            Some(e) => {
                let locations = {
                    let w = written.lock().unwrap_or_else(|p| p.into_inner());
                    w.clone()
                };
                warn!(
                    "version {version_id} of file {file_id} failed, rolling back {} written chunks: {e}",
                    locations.len()
                );
                self.best_effort_delete(&locations).await;
                if let Err(abort_err) = self.with_db(|db| db.abort_version(version_id)) {
                    warn!("failed to abort version {version_id}: {abort_err}");
                }
                Err(e)
            }
        }
    }

    // ── Download ───────────────────────────────────────────────

    fn resolve_version(
        &self,
        file_id: &str,
        version: Option<i64>,
    ) -> Result<(VersionRecord, Vec<ChunkDescriptor>)> {
        self.with_db(|db| {
            let file = db.get_file(file_id)?;
            let version_id = match version {
                Some(v) => v,
                None => file
                    .current_version
                    .ok_or_else(|| ScatterError::FileNotFound(file_id.to_string()))?,
            };
            let record = db.get_version(file_id, version_id)?;
            if record.state != VersionState::Complete {
                return Err(ScatterError::VersionNotFound(version_id));
            }
            let descriptors = db.version_chunks(version_id)?;
            Ok((record, descriptors))
        })
    }

    async fn fetch_chunks(
        &self,
        descriptors: &[ChunkDescriptor],
    ) -> Result<Vec<(ChunkDescriptor, Vec<u8>)>> {
        let parallelism = descriptors.len().min(self.max_transfers).max(1);
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut tasks = JoinSet::new();

        for desc in descriptors.iter().cloned() {
            let providers = Arc::clone(&self.providers);
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                get_chunk(desc, &providers, &retry).await
            });
        }

        let mut parts = Vec::new();
        let mut failure: Option<ScatterError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                        tasks.abort_all();
                    }
                }
                Err(join_err) => {
                    if failure.is_none() && !join_err.is_cancelled() {
                        failure = Some(ScatterError::ProviderUnavailable {
                            provider: "task".to_string(),
                            reason: join_err.to_string(),
                        });
                        tasks.abort_all();
                    }
                }
            }
        }
        match failure {
            None => Ok(parts),
            Some(e) => Err(e),
        }
    }

    // ── Maintenance ────────────────────────────────────────────

    /// Enforce the retention cap after a successful commit. Failures here are
    /// warnings only; the committed version is already durable.
    async fn prune_history(&self, file_id: &str) {
        let Some(max) = self.max_versions else {
            return;
        };
        let stale = match self.with_db(|db| db.stale_versions(file_id)) {
            Ok(s) => s,
            Err(e) => {
                warn!("retention scan failed for file {file_id}: {e}");
                return;
            }
        };
        if stale.len() <= max as usize {
            return;
        }
        let excess = stale.len() - max as usize;
        for version_id in stale.into_iter().take(excess) {
            let locations = match self.with_db(|db| db.version_chunks(version_id)) {
                Ok(chunks) => chunks
                    .into_iter()
                    .map(|c| (c.provider_id, c.locator))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!("retention scan failed for version {version_id}: {e}");
                    continue;
                }
            };
            self.best_effort_delete(&locations).await;
            if let Err(e) = self.with_db(|db| db.delete_version(version_id)) {
                warn!("failed to prune version {version_id}: {e}");
            } else {
                info!("pruned stale version {version_id} of file {file_id}");
            }
        }
    }

    /// Fire deletes at every listed locator, logging failures as orphaned
    /// chunks. Never changes the outcome of the surrounding operation.
    async fn best_effort_delete(&self, locations: &[(i64, String)]) {
        for (provider_id, locator) in locations {
            let Some(handle) = self.handle(*provider_id) else {
                warn!("orphaned chunk at unknown provider {provider_id}: {locator}");
                continue;
            };
            if let Err(e) = handle.adapter.delete(locator).await {
                warn!(
                    "orphaned chunk on provider '{}': {locator}: {e:#}",
                    handle.info.name
                );
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────

    fn with_db<T>(&self, f: impl FnOnce(&ManifestDb) -> Result<T>) -> Result<T> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        f(&db)
    }

    fn file_lock(&self, file_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.file_locks.lock().unwrap_or_else(|p| p.into_inner());
        // A lock held only by the map is no longer in use anywhere.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(file_id.to_string()).or_default().clone()
    }

    fn handle(&self, provider_id: i64) -> Option<&Arc<ProviderHandle>> {
        self.providers.iter().find(|h| h.info.id == provider_id)
    }

    fn live_provider_infos(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .filter(|h| h.is_live())
            .map(|h| h.info.clone())
            .collect()
    }

    fn split_payload<R: Read>(&self, reader: R) -> Result<(Vec<ChunkPayload>, ChunkHash, u64)> {
        let mut stream = self.chunker.split(reader);
        let mut chunks = Vec::new();
        for chunk in stream.by_ref() {
            chunks.push(chunk?);
        }
        let (file_hash, total_size) = stream.finish();
        Ok((chunks, file_hash, total_size))
    }
}

fn chunk_key(file_id: &str, version_id: i64, index: u32) -> String {
    format!("scatter/{file_id}/v{version_id}/{index:06}")
}

/// Upload one chunk: retry on its assigned provider, then one re-placement
/// to the next live provider before giving up. Acknowledged writes land in
/// the saga log immediately.
#[allow(clippy::too_many_arguments)]
async fn put_chunk(
    chunk: ChunkPayload,
    provider_id: i64,
    version_id: i64,
    key: &str,
    providers: &[Arc<ProviderHandle>],
    placement: PlacementPolicy,
    retry: &RetryPolicy,
    written: &StdMutex<Vec<(i64, String)>>,
) -> std::result::Result<ChunkDescriptor, ScatterError> {
    let index = chunk.index;
    let primary = providers
        .iter()
        .find(|h| h.info.id == provider_id)
        .ok_or(ScatterError::ProviderNotFound(provider_id))?;

    let first_error = match try_put(primary, key, &chunk, retry, written).await {
        Ok(locator) => {
            return Ok(descriptor_for(&chunk, version_id, provider_id, locator));
        }
        Err(e) => e,
    };

    // The whole retry ceiling failed: consider the provider down and make
    // one re-placement attempt.
    primary.set_live(false);
    warn!(
        "provider '{}' exhausted retries for chunk {index}, re-placing",
        primary.info.name
    );

    let live: Vec<ProviderInfo> = providers
        .iter()
        .filter(|h| h.is_live())
        .map(|h| h.info.clone())
        .collect();
    let Some(fallback_id) = placement.reassign(provider_id, &live) else {
        return Err(ScatterError::ChunkUploadFailed {
            index,
            reason: format!("{first_error:#}; no live provider left for re-placement"),
        });
    };
    let fallback = providers
        .iter()
        .find(|h| h.info.id == fallback_id)
        .ok_or(ScatterError::ProviderNotFound(fallback_id))?;

    match try_put(fallback, key, &chunk, retry, written).await {
        Ok(locator) => Ok(descriptor_for(&chunk, version_id, fallback_id, locator)),
        Err(e) => Err(ScatterError::ChunkUploadFailed {
            index,
            reason: format!("{e:#} (after re-placement from '{}')", primary.info.name),
        }),
    }
}

async fn try_put(
    handle: &ProviderHandle,
    key: &str,
    chunk: &ChunkPayload,
    retry: &RetryPolicy,
    written: &StdMutex<Vec<(i64, String)>>,
) -> anyhow::Result<String> {
    let locator = with_retry(retry, &format!("put to '{}'", handle.info.name), || {
        handle.adapter.put(key, &chunk.data)
    })
    .await?;
    written
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .push((handle.info.id, locator.clone()));
    Ok(locator)
}

fn descriptor_for(
    chunk: &ChunkPayload,
    version_id: i64,
    provider_id: i64,
    locator: String,
) -> ChunkDescriptor {
    ChunkDescriptor {
        version_id,
        index: chunk.index,
        size: chunk.data.len() as u64,
        checksum: chunk.checksum.clone(),
        provider_id,
        locator,
    }
}

/// Download one chunk and verify its checksum before handing it back.
async fn get_chunk(
    desc: ChunkDescriptor,
    providers: &[Arc<ProviderHandle>],
    retry: &RetryPolicy,
) -> std::result::Result<(ChunkDescriptor, Vec<u8>), ScatterError> {
    let handle = providers
        .iter()
        .find(|h| h.info.id == desc.provider_id)
        .ok_or(ScatterError::ProviderNotFound(desc.provider_id))?;

    let data = with_retry(retry, &format!("get from '{}'", handle.info.name), || {
        handle.adapter.get(&desc.locator)
    })
    .await
    .map_err(|e| ScatterError::ProviderUnavailable {
        provider: handle.info.name.clone(),
        reason: format!("{e:#}"),
    })?;

    let actual = compute_checksum(&data);
    if actual != desc.checksum {
        return Err(ScatterError::ChecksumMismatch(
            format!("chunk {}", desc.index),
            desc.checksum.to_hex(),
            actual.to_hex(),
        ));
    }
    Ok((desc, data))
}
