use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use crate::envelope::{self, EnvelopeHeader};
use crate::key_derivation::{derive_pbkdf2, generate_iv, generate_salt, DerivedKey};
use crate::{CryptoError, DEFAULT_ITERATIONS, DEFAULT_MIME_TYPE, ENCRYPTED_SUFFIX, IV_SIZE};

/// A file as the uploader picked it.
#[derive(Debug, Clone)]
pub struct PlainFile {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// What actually goes on the wire for one upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub filename: String,
    /// Declared part type; always [`DEFAULT_MIME_TYPE`] for envelopes.
    pub content_type: String,
    pub data: Vec<u8>,
    pub encrypted: bool,
}

impl UploadPayload {
    /// Value of the `encrypted` form field.
    pub fn encrypted_flag(&self) -> &'static str {
        if self.encrypted {
            "1"
        } else {
            "0"
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EncryptOptions {
    pub iterations: u32,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// AES-256-GCM encrypt with no associated data. Output is ciphertext + 16-byte tag.
pub fn seal(
    key: &DerivedKey,
    iv: &[u8; IV_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Encrypt a file into a complete envelope with the default PBKDF2 cost.
pub fn encrypt(password: &str, file: &PlainFile) -> Result<Vec<u8>, CryptoError> {
    encrypt_with_options(password, file, &EncryptOptions::default())
}

pub fn encrypt_with_options(
    password: &str,
    file: &PlainFile,
    options: &EncryptOptions,
) -> Result<Vec<u8>, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    // Fresh salt and nonce for every envelope.
    let salt = generate_salt();
    let iv = generate_iv();
    let key = derive_pbkdf2(password.as_bytes(), &salt, options.iterations)?;

    let ciphertext = seal(&key, &iv, &file.data)?;

    let header = EnvelopeHeader::new_pbkdf2(
        options.iterations,
        &salt,
        &iv,
        &file.filename,
        &file.mime_type,
        file.data.len() as u64,
    );
    let envelope = envelope::pack(&header, &ciphertext)?;

    tracing::debug!(
        plaintext_len = file.data.len(),
        envelope_len = envelope.len(),
        "sealed envelope"
    );
    Ok(envelope)
}

/// Turn a picked file into the upload payload.
///
/// An empty password uploads the file unchanged. Otherwise the payload is the
/// envelope, flagged as encrypted and renamed with [`ENCRYPTED_SUFFIX`].
pub fn prepare_upload(file: PlainFile, password: &str) -> Result<UploadPayload, CryptoError> {
    prepare_upload_with_options(file, password, &EncryptOptions::default())
}

pub fn prepare_upload_with_options(
    file: PlainFile,
    password: &str,
    options: &EncryptOptions,
) -> Result<UploadPayload, CryptoError> {
    if password.is_empty() {
        return Ok(UploadPayload {
            filename: file.filename,
            content_type: file.mime_type,
            data: file.data,
            encrypted: false,
        });
    }

    let data = encrypt_with_options(password, &file, options)?;
    Ok(UploadPayload {
        filename: format!("{}{ENCRYPTED_SUFFIX}", file.filename),
        content_type: DEFAULT_MIME_TYPE.to_string(),
        data,
        encrypted: true,
    })
}
