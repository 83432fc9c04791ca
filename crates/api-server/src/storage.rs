//! Content-addressed blob storage under `<upload_dir>/<sha[..2]>/<sha><ext>`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use guestvault_crypto::hash::{sha256_hex, storage_relpath};

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub sha256: String,
    pub relpath: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    /// Held across "write blob + insert row" and "count refs + unlink", so a
    /// delete never unlinks a path an in-flight upload is about to reference.
    refs: Arc<Mutex<()>>,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            refs: Arc::new(Mutex::new(())),
        }
    }

    /// Exclusive access to the blob reference bookkeeping.
    pub async fn lock_refs(&self) -> MutexGuard<'_, ()> {
        self.refs.lock().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Write the bytes as-is. Identical content lands on the same path.
    pub async fn store(&self, data: &[u8], filename: &str) -> io::Result<StoredBlob> {
        let sha256 = sha256_hex(data);
        let relpath = storage_relpath(&sha256, filename);
        let abs_path = self.path_for(&relpath);
        if let Some(dir) = abs_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&abs_path, data).await?;

        Ok(StoredBlob {
            sha256,
            relpath,
            size: data.len() as u64,
        })
    }

    pub fn path_for(&self, relpath: &str) -> PathBuf {
        self.root.join(relpath)
    }

    pub async fn read(&self, relpath: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_for(relpath)).await
    }

    /// Remove a blob and, if it is now empty, its prefix directory.
    pub async fn remove(&self, relpath: &str) -> io::Result<()> {
        let abs_path = self.path_for(relpath);
        match tokio::fs::remove_file(&abs_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(dir) = abs_path.parent() {
            // fails while other blobs share the prefix
            let _ = tokio::fs::remove_dir(dir).await;
        }
        Ok(())
    }
}

/// Reduce a client-supplied filename to a safe ASCII name.
///
/// Path separators become spaces, whitespace runs become `_`, anything outside
/// `[A-Za-z0-9_.-]` is dropped and leading/trailing `.` and `_` are trimmed.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}
