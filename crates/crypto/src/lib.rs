//! guestvault-crypto: password-protected upload envelopes.
//!
//! An envelope is `header_json ++ DELIMITER ++ ciphertext`, where the
//! ciphertext is AES-256-GCM output (tag appended) under a key derived from the
//! uploader's password. The server only ever stores and serves the envelope.

pub mod decrypt;
pub mod encrypt;
pub mod envelope;
pub mod hash;
pub mod key_derivation;
pub mod preview;

mod error;
pub use error::CryptoError;

pub use decrypt::{decrypt, Decrypted};
pub use encrypt::{
    encrypt, encrypt_with_options, prepare_upload, prepare_upload_with_options, EncryptOptions,
    PlainFile, UploadPayload,
};
pub use envelope::{EnvelopeHeader, Kdf};
pub use key_derivation::DerivedKey;
pub use preview::PreviewKind;

/// Separates the header JSON from the ciphertext.
pub const DELIMITER: &[u8] = b"\n\n--GV--\n\n";
pub const FORMAT_VERSION: u32 = 1;
pub const ALGORITHM: &str = "AES-GCM";
pub const KDF_PBKDF2: &str = "PBKDF2-SHA256";
pub const KDF_SHA256: &str = "SHA256";

/// PBKDF2 rounds written by the encoder and assumed by the decoder when absent.
pub const DEFAULT_ITERATIONS: u32 = 120_000;

pub const SALT_SIZE: usize = 16;
pub const IV_SIZE: usize = 12;
pub const KEY_SIZE: usize = 32;
pub const TAG_SIZE: usize = 16;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
pub const DEFAULT_FILENAME: &str = "decrypted";

/// Appended to the filename of encrypted uploads so the host never sniffs them.
pub const ENCRYPTED_SUFFIX: &str = ".enc";
