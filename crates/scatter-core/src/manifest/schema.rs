use rusqlite::Connection;

use crate::error::Result;

/// Run all migrations on the database.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS providers (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            type        TEXT NOT NULL,
            root        TEXT NOT NULL,
            region      TEXT,
            weight      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS files (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            current_version INTEGER,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS versions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id     TEXT NOT NULL REFERENCES files(id),
            state       TEXT NOT NULL DEFAULT 'uploading',
            notes       TEXT NOT NULL DEFAULT '',
            chunk_count INTEGER NOT NULL DEFAULT 0,
            total_size  INTEGER NOT NULL DEFAULT 0,
            checksum    TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id  INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
            idx         INTEGER NOT NULL,
            size        INTEGER NOT NULL,
            checksum    TEXT NOT NULL,
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            locator     TEXT NOT NULL,
            UNIQUE(version_id, idx)
        );

        CREATE INDEX IF NOT EXISTS idx_versions_file ON versions(file_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_version ON chunks(version_id);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"providers".to_string()));
        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"versions".to_string()));
        assert!(tables.contains(&"chunks".to_string()));
    }

    #[test]
    fn migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should not fail
    }
}
