//! SQLite metadata for stored uploads.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename_original: String,
    pub stored_relpath: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub sha256: String,
    pub encrypted: bool,
    pub uploaded_at: String,
    pub download_count: i64,
}

impl FileRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            filename_original: row.get("filename_original")?,
            stored_relpath: row.get("stored_relpath")?,
            content_type: row.get("content_type")?,
            size: row.get("size")?,
            sha256: row.get("sha256")?,
            encrypted: row.get("encrypted")?,
            uploaded_at: row.get("uploaded_at")?,
            download_count: row.get("download_count")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename_original: String,
    pub stored_relpath: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub sha256: String,
    pub encrypted: bool,
    pub uploaded_at: String,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename_original TEXT NOT NULL,
    stored_relpath TEXT NOT NULL,
    content_type TEXT,
    size INTEGER NOT NULL,
    sha256 TEXT NOT NULL,
    encrypted INTEGER NOT NULL DEFAULT 0,
    uploaded_at TEXT NOT NULL,
    download_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_files_sha256 ON files(sha256);
CREATE INDEX IF NOT EXISTS idx_files_stored_relpath ON files(stored_relpath);
";

/// Shared handle to the metadata database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a query on the blocking pool so handlers never hold the
    /// connection lock on a runtime worker.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> rusqlite::Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| AppError::Internal(format!("database task failed: {e}")))?
            .map_err(AppError::from)
    }

    pub fn insert(&self, file: &NewFile) -> rusqlite::Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO files (
                filename_original, stored_relpath, content_type, size, sha256, encrypted, uploaded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.filename_original,
                file.stored_relpath,
                file.content_type,
                file.size,
                file.sha256,
                file.encrypted,
                file.uploaded_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest first.
    pub fn list(&self) -> rusqlite::Result<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM files ORDER BY datetime(uploaded_at) DESC, id DESC")?;
        let rows = stmt
            .query_map([], FileRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get(&self, id: i64) -> rusqlite::Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM files WHERE id = ?1",
            [id],
            FileRecord::from_row,
        )
        .optional()
    }

    pub fn increment_download_count(&self, id: i64) -> rusqlite::Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE files SET download_count = download_count + 1 WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }

    /// Delete the given rows in one transaction, returning the ones that existed.
    pub fn delete_many(&self, ids: &[i64]) -> rusqlite::Result<Vec<FileRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = Vec::new();
        for id in ids {
            let row = tx
                .query_row(
                    "SELECT * FROM files WHERE id = ?1",
                    [id],
                    FileRecord::from_row,
                )
                .optional()?;
            if let Some(row) = row {
                tx.execute("DELETE FROM files WHERE id = ?1", [id])?;
                removed.push(row);
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Rows still pointing at a stored blob. Identical bytes uploaded under
    /// different extensions live at different paths, so this counts by path.
    pub fn count_by_relpath(&self, relpath: &str) -> rusqlite::Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM files WHERE stored_relpath = ?1",
            [relpath],
            |row| row.get(0),
        )
    }
}
