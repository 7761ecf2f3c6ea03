use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::error::{Result, ScatterError};
use crate::types::{
    ChunkDescriptor, ChunkHash, FileListing, FileRecord, ProviderInfo, ProviderType, VersionRecord,
    VersionState,
};

/// High-level interface for manifest database operations.
///
/// The manifest is the single source of truth: providers hold bytes behind
/// locators but know nothing about files, versions or ordering. Callers are
/// expected to serialize mutations per file id (the engine holds a per-file
/// lock); this type only guarantees statement-level atomicity plus explicit
/// transactions for commit and delete.
pub struct ManifestDb {
    conn: Connection,
}

impl ManifestDb {
    /// Open (or create) the manifest database and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        super::schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Providers ──────────────────────────────────────────────

    pub fn insert_provider(
        &self,
        name: &str,
        provider_type: ProviderType,
        root: &str,
        region: Option<&str>,
        weight: u32,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO providers (name, type, root, region, weight) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, provider_type.to_string(), root, region, weight],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_providers(&self) -> Result<Vec<ProviderInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, type, root, region, weight FROM providers")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProviderInfo {
                id: row.get(0)?,
                name: row.get(1)?,
                provider_type: row
                    .get::<_, String>(2)?
                    .parse()
                    .unwrap_or(ProviderType::Local),
                root: row.get(3)?,
                region: row.get(4)?,
                weight: row.get(5)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ── Files ──────────────────────────────────────────────────

    pub fn create_file(&self, file_id: &str, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO files (id, name) VALUES (?1, ?2)",
            params![file_id, name],
        )?;
        Ok(())
    }

    pub fn get_file(&self, file_id: &str) -> Result<FileRecord> {
        self.conn
            .query_row(
                "SELECT id, name, current_version, created_at, updated_at FROM files WHERE id=?1",
                params![file_id],
                |row| {
                    Ok(FileRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        current_version: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| ScatterError::FileNotFound(file_id.to_string()))
    }

    /// Files with at least one committed version, with the chunk count of
    /// their current version.
    pub fn list_files(&self) -> Result<Vec<FileListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, v.chunk_count FROM files f
             JOIN versions v ON f.current_version = v.id
             ORDER BY f.created_at, f.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FileListing {
                id: row.get(0)?,
                name: row.get(1)?,
                chunk_count: row.get(2)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Remove a file and all its versions and chunk descriptors.
    /// Physical provider cleanup happens before this is called.
    pub fn delete_file(&self, file_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE files SET current_version=NULL WHERE id=?1",
            params![file_id],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE version_id IN (SELECT id FROM versions WHERE file_id=?1)",
            params![file_id],
        )?;
        tx.execute("DELETE FROM versions WHERE file_id=?1", params![file_id])?;
        tx.execute("DELETE FROM files WHERE id=?1", params![file_id])?;
        tx.commit()?;
        Ok(())
    }

    // ── Versions ───────────────────────────────────────────────

    /// Allocate a new version in `uploading` state. Does not touch the
    /// file's current pointer.
    pub fn begin_version(&self, file_id: &str, notes: &str) -> Result<i64> {
        self.get_file(file_id)?;
        self.conn.execute(
            "INSERT INTO versions (file_id, notes) VALUES (?1, ?2)",
            params![file_id, notes],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record where one chunk landed. Idempotent for retries of the same
    /// (version, index).
    pub fn record_chunk(&self, desc: &ChunkDescriptor) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO chunks (version_id, idx, size, checksum, provider_id, locator)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                desc.version_id,
                desc.index,
                desc.size,
                desc.checksum.to_hex(),
                desc.provider_id,
                desc.locator
            ],
        )?;
        Ok(())
    }

    /// Validate that every chunk 0..expected-1 is recorded, then atomically
    /// mark the version complete and (unless `make_current` is false, as in
    /// pre-restore commits) flip the file's current pointer.
    pub fn commit_version(
        &self,
        version_id: i64,
        expected_chunks: u32,
        total_size: u64,
        checksum: &ChunkHash,
        make_current: bool,
    ) -> Result<()> {
        let (file_id, state) = self.version_meta(version_id)?;
        if state != VersionState::Uploading {
            return Err(ScatterError::InvalidState(format!(
                "version {version_id} is {state}, cannot commit"
            )));
        }

        let indices: Vec<u32> = {
            let mut stmt = self
                .conn
                .prepare("SELECT idx FROM chunks WHERE version_id=?1 ORDER BY idx")?;
            let rows = stmt.query_map(params![version_id], |row| row.get(0))?;
            rows.filter_map(|r| r.ok()).collect()
        };
        if indices.len() != expected_chunks as usize {
            return Err(ScatterError::IncompleteVersion(
                version_id,
                format!("{} of {} chunks recorded", indices.len(), expected_chunks),
            ));
        }
        for (want, got) in indices.iter().enumerate() {
            if *got != want as u32 {
                return Err(ScatterError::IncompleteVersion(
                    version_id,
                    format!("index gap at {want}"),
                ));
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE versions SET state='complete', chunk_count=?2, total_size=?3, checksum=?4
             WHERE id=?1",
            params![version_id, expected_chunks, total_size, checksum.to_hex()],
        )?;
        if make_current {
            tx.execute(
                "UPDATE files SET current_version=?2, updated_at=datetime('now') WHERE id=?1",
                params![file_id, version_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Mark a version dead without it ever having been current, dropping its
    /// chunk descriptors. Used by the rollback path.
    pub fn abort_version(&self, version_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM chunks WHERE version_id=?1", params![version_id])?;
        tx.execute(
            "UPDATE versions SET state='dead' WHERE id=?1",
            params![version_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Point the file's current pointer at a committed version. This is the
    /// entire restore mechanism; chunk bytes are never touched.
    pub fn set_current(&self, file_id: &str, version_id: i64) -> Result<()> {
        self.get_file(file_id)?;
        let (owner, state) = self.version_meta(version_id)?;
        if owner != file_id || state != VersionState::Complete {
            return Err(ScatterError::VersionNotFound(version_id));
        }
        self.conn.execute(
            "UPDATE files SET current_version=?2, updated_at=datetime('now') WHERE id=?1",
            params![file_id, version_id],
        )?;
        Ok(())
    }

    pub fn get_version(&self, file_id: &str, version_id: i64) -> Result<VersionRecord> {
        let record = self
            .conn
            .query_row(
                "SELECT v.id, v.file_id, v.state, v.notes, v.chunk_count, v.total_size,
                        v.checksum, v.created_at, (f.current_version = v.id)
                 FROM versions v JOIN files f ON v.file_id = f.id
                 WHERE v.id=?1 AND v.file_id=?2",
                params![version_id, file_id],
                version_row,
            )
            .optional()?;
        record.ok_or(ScatterError::VersionNotFound(version_id))
    }

    /// Committed versions of a file in creation order. Exactly one carries
    /// `is_current` once the file has ever committed.
    pub fn list_versions(&self, file_id: &str) -> Result<Vec<VersionRecord>> {
        self.get_file(file_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT v.id, v.file_id, v.state, v.notes, v.chunk_count, v.total_size,
                    v.checksum, v.created_at, (f.current_version = v.id)
             FROM versions v JOIN files f ON v.file_id = f.id
             WHERE v.file_id=?1 AND v.state='complete'
             ORDER BY v.id",
        )?;
        let rows = stmt.query_map(params![file_id], version_row)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Committed versions that are not current, oldest first. Input to
    /// retention pruning.
    pub fn stale_versions(&self, file_id: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.id FROM versions v JOIN files f ON v.file_id = f.id
             WHERE v.file_id=?1 AND v.state='complete' AND v.id != COALESCE(f.current_version, -1)
             ORDER BY v.id",
        )?;
        let rows = stmt.query_map(params![file_id], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn has_complete_versions(&self, file_id: &str) -> Result<bool> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM versions WHERE file_id=?1 AND state='complete'",
            params![file_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Remove one version and its chunk descriptors (prune path).
    pub fn delete_version(&self, version_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM chunks WHERE version_id=?1", params![version_id])?;
        tx.execute("DELETE FROM versions WHERE id=?1", params![version_id])?;
        tx.commit()?;
        Ok(())
    }

    // ── Chunks ─────────────────────────────────────────────────

    /// Ordered chunk descriptors of one version.
    pub fn version_chunks(&self, version_id: i64) -> Result<Vec<ChunkDescriptor>> {
        let mut stmt = self.conn.prepare(
            "SELECT version_id, idx, size, checksum, provider_id, locator
             FROM chunks WHERE version_id=?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![version_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (version_id, index, size, checksum, provider_id, locator) = row?;
            out.push(ChunkDescriptor {
                version_id,
                index,
                size,
                checksum: ChunkHash::from_hex(&checksum)?,
                provider_id,
                locator,
            });
        }
        Ok(out)
    }

    /// Every (provider, locator) ever issued for a file, across all versions.
    /// Drives physical cleanup on delete.
    pub fn file_chunk_locations(&self, file_id: &str) -> Result<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.provider_id, c.locator FROM chunks c
             JOIN versions v ON c.version_id = v.id
             WHERE v.file_id=?1",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn version_meta(&self, version_id: i64) -> Result<(String, VersionState)> {
        let meta = self
            .conn
            .query_row(
                "SELECT file_id, state FROM versions WHERE id=?1",
                params![version_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let (file_id, state) = meta.ok_or(ScatterError::VersionNotFound(version_id))?;
        Ok((file_id, state.parse()?))
    }
}

fn version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRecord> {
    Ok(VersionRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        state: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(VersionState::Dead),
        notes: row.get(3)?,
        chunk_count: row.get(4)?,
        total_size: row.get(5)?,
        checksum: row.get(6)?,
        created_at: row.get(7)?,
        is_current: row.get::<_, Option<bool>>(8)?.unwrap_or(false),
    })
}
