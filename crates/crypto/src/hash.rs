use sha2::{Digest, Sha256};

/// Compute SHA-256 of the given data as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Storage location for a blob: `<first two hex chars>/<sha256><ext>`.
///
/// The original extension is kept so stored files stay recognisable on disk.
pub fn storage_relpath(sha256_hex: &str, filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let prefix = sha256_hex.get(..2).unwrap_or(sha256_hex);
    format!("{prefix}/{sha256_hex}{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_storage_relpath() {
        let hash = sha256_hex(b"hello");
        assert_eq!(
            storage_relpath(&hash, "photo.png"),
            format!("2c/{hash}.png")
        );
        assert_eq!(storage_relpath(&hash, "README"), format!("2c/{hash}"));
        assert_eq!(
            storage_relpath(&hash, "notes.txt.enc"),
            format!("2c/{hash}.enc")
        );
    }
}
