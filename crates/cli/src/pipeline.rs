//! The decode pipeline, one typed stage at a time:
//! fetch → split → parse → derive → decrypt → render.
//!
//! Fetch and render touch the network and the filesystem and live with the
//! download command; the stages here are pure and each maps its error to a
//! [`Failure`] the user sees.

use guestvault_crypto::decrypt::{into_decrypted, open};
use guestvault_crypto::envelope::{self, EnvelopeHeader};
use guestvault_crypto::key_derivation::derive_for_header;
use guestvault_crypto::{CryptoError, Decrypted, DerivedKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Split,
    Parse,
    Derive,
    Decrypt,
    Render,
}

/// User-visible failure categories. None of them is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("download failed: {0}")]
    Download(String),

    #[error("invalid encrypted format")]
    InvalidFormat,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("decryption failed (wrong password?)")]
    Decryption,

    #[error("unexpected error: {0}")]
    Other(String),
}

impl Failure {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Failure::Download(_) => Some(Stage::Fetch),
            Failure::InvalidFormat => Some(Stage::Split),
            Failure::InvalidHeader(_) => Some(Stage::Parse),
            Failure::KeyDerivation(_) => Some(Stage::Derive),
            Failure::Decryption => Some(Stage::Decrypt),
            Failure::Other(_) => None,
        }
    }
}

impl From<CryptoError> for Failure {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MissingDelimiter => Failure::InvalidFormat,
            CryptoError::InvalidHeader(msg) => Failure::InvalidHeader(msg),
            CryptoError::KeyDerivationFailed(msg) => Failure::KeyDerivation(msg),
            CryptoError::DecryptionFailed => Failure::Decryption,
            other => Failure::Other(other.to_string()),
        }
    }
}

pub fn split(data: &[u8]) -> Result<(&[u8], &[u8]), Failure> {
    Ok(envelope::split(data)?)
}

pub fn parse(header_bytes: &[u8]) -> Result<EnvelopeHeader, Failure> {
    Ok(envelope::parse_header(header_bytes)?)
}

pub fn derive(password: &str, header: &EnvelopeHeader) -> Result<DerivedKey, Failure> {
    Ok(derive_for_header(password, header)?)
}

pub fn decrypt(
    key: &DerivedKey,
    header: &EnvelopeHeader,
    ciphertext: &[u8],
) -> Result<Decrypted, Failure> {
    let plaintext = open(key, &header.iv, ciphertext)?;
    Ok(into_decrypted(header, plaintext))
}

/// Run split → parse → derive → decrypt over a fetched envelope.
pub fn decode(password: &str, data: &[u8]) -> Result<Decrypted, Failure> {
    let (header_bytes, ciphertext) = split(data)?;
    tracing::debug!(header_len = header_bytes.len(), "envelope split");

    let header = parse(header_bytes)?;
    tracing::debug!(v = header.v, kdf = ?header.kdf, "header parsed");

    let key = derive(password, &header)?;
    let decrypted = decrypt(&key, &header, ciphertext)?;
    tracing::debug!(len = decrypted.data.len(), "envelope opened");
    Ok(decrypted)
}
