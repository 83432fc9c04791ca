use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use crate::envelope::{self, EnvelopeHeader};
use crate::key_derivation::{derive_for_header, DerivedKey};
use crate::preview::PreviewKind;
use crate::{CryptoError, IV_SIZE};

/// Plaintext recovered from an envelope, with the metadata its header carried.
#[derive(Debug, Clone)]
pub struct Decrypted {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Decrypted {
    pub fn preview_kind(&self) -> PreviewKind {
        PreviewKind::for_mime(&self.mime_type)
    }
}

/// AES-256-GCM open. Every failure collapses to [`CryptoError::DecryptionFailed`].
pub fn open(key: &DerivedKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != IV_SIZE {
        tracing::debug!(iv_len = iv.len(), "unexpected nonce length");
        return Err(CryptoError::DecryptionFailed);
    }
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Decrypt an envelope: split, parse the header, derive the key, open.
pub fn decrypt(password: &str, data: &[u8]) -> Result<Decrypted, CryptoError> {
    let (header_bytes, ciphertext) = envelope::split(data)?;
    let header = envelope::parse_header(header_bytes)?;
    let key = derive_for_header(password, &header)?;
    let plaintext = open(&key, &header.iv, ciphertext)?;
    Ok(into_decrypted(&header, plaintext))
}

pub fn into_decrypted(header: &EnvelopeHeader, data: Vec<u8>) -> Decrypted {
    if let Some(size) = header.size {
        if size != data.len() as u64 {
            // informational only
            tracing::debug!(declared = size, actual = data.len(), "size field mismatch");
        }
    }
    Decrypted {
        filename: header.filename().to_string(),
        mime_type: header.mime_type().to_string(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypt::{encrypt_with_options, EncryptOptions, PlainFile};

    const FAST: EncryptOptions = EncryptOptions { iterations: 1000 };

    fn file(data: &[u8]) -> PlainFile {
        PlainFile {
            filename: "a.bin".into(),
            mime_type: "application/pdf".into(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let plaintext = b"hello world, this is a test of guestvault encryption";
        let envelope = encrypt_with_options("pw", &file(plaintext), &FAST).unwrap();
        let decrypted = decrypt("pw", &envelope).unwrap();
        assert_eq!(decrypted.data, plaintext);
        assert_eq!(decrypted.filename, "a.bin");
        assert_eq!(decrypted.mime_type, "application/pdf");
        assert_eq!(decrypted.preview_kind(), PreviewKind::Download);
    }

    #[test]
    fn test_empty_file_roundtrip() {
        let envelope = encrypt_with_options("pw", &file(b""), &FAST).unwrap();
        assert!(decrypt("pw", &envelope).unwrap().data.is_empty());
    }

    #[test]
    fn test_wrong_password_fails() {
        let envelope = encrypt_with_options("pw", &file(b"secret data"), &FAST).unwrap();
        assert!(matches!(
            decrypt("other", &envelope),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let envelope = encrypt_with_options("pw", &file(b"secret data"), &FAST).unwrap();
        let truncated = &envelope[..envelope.len() - 1];
        assert!(matches!(
            decrypt("pw", truncated),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_bad_iv_length_fails_at_decrypt() {
        let key = DerivedKey::from_bytes([1u8; 32]);
        assert!(matches!(
            open(&key, &[0u8; 8], &[0u8; 32]),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_no_delimiter_fails() {
        assert!(matches!(
            decrypt("pw", &[0u8; 100]),
            Err(CryptoError::MissingDelimiter)
        ));
    }
}
