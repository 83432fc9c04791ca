//! Envelope framing: `header_json ++ DELIMITER ++ ciphertext`.
//!
//! The header is compact JSON and never contains a raw newline, so the first
//! delimiter match always ends the header even if the same bytes later show up
//! inside the ciphertext.

use serde::{Deserialize, Serialize};

use crate::{
    CryptoError, ALGORITHM, DEFAULT_FILENAME, DEFAULT_ITERATIONS, DEFAULT_MIME_TYPE, DELIMITER,
    FORMAT_VERSION, KDF_PBKDF2, KDF_SHA256,
};

/// Key-derivation mode declared by an envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    Pbkdf2Sha256,
    /// Single SHA-256 over `salt ++ password`. Decode-only.
    Sha256,
}

impl Kdf {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kdf::Pbkdf2Sha256 => KDF_PBKDF2,
            Kdf::Sha256 => KDF_SHA256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    #[serde(default = "default_version")]
    pub v: u32,
    #[serde(default = "default_alg")]
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

fn default_version() -> u32 {
    FORMAT_VERSION
}

fn default_alg() -> String {
    ALGORITHM.to_string()
}

impl EnvelopeHeader {
    /// Header for a freshly encrypted file; the encoder always writes every field.
    pub fn new_pbkdf2(
        iterations: u32,
        salt: &[u8],
        iv: &[u8],
        filename: &str,
        mime_type: &str,
        size: u64,
    ) -> Self {
        Self {
            v: FORMAT_VERSION,
            alg: ALGORITHM.to_string(),
            kdf: Some(KDF_PBKDF2.to_string()),
            iterations: Some(iterations),
            salt: salt.to_vec(),
            iv: iv.to_vec(),
            filename: Some(filename.to_string()),
            mime_type: Some(mime_type.to_string()),
            size: Some(size),
        }
    }

    /// Resolve the declared KDF. A missing `kdf` field means PBKDF2.
    pub fn kdf(&self) -> Result<Kdf, CryptoError> {
        match self.kdf.as_deref() {
            None | Some(KDF_PBKDF2) => Ok(Kdf::Pbkdf2Sha256),
            Some(KDF_SHA256) => Ok(Kdf::Sha256),
            Some(other) => Err(CryptoError::KeyDerivationFailed(format!(
                "unsupported kdf: {other}"
            ))),
        }
    }

    /// PBKDF2 rounds, falling back to the default when absent or zero.
    pub fn iterations(&self) -> u32 {
        match self.iterations {
            Some(n) if n > 0 => n,
            _ => DEFAULT_ITERATIONS,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self.mime_type.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_MIME_TYPE,
        }
    }

    pub fn filename(&self) -> &str {
        match self.filename.as_deref() {
            Some(f) if !f.is_empty() => f,
            _ => DEFAULT_FILENAME,
        }
    }
}

/// Concatenate header JSON, delimiter and ciphertext into one blob.
pub fn pack(header: &EnvelopeHeader, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let header_json =
        serde_json::to_vec(header).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut output = Vec::with_capacity(header_json.len() + DELIMITER.len() + ciphertext.len());
    output.extend_from_slice(&header_json);
    output.extend_from_slice(DELIMITER);
    output.extend_from_slice(ciphertext);
    Ok(output)
}

/// Split at the first delimiter, returning `(header_bytes, ciphertext)`.
pub fn split(data: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    let pos = find_delimiter(data).ok_or(CryptoError::MissingDelimiter)?;
    Ok((&data[..pos], &data[pos + DELIMITER.len()..]))
}

fn find_delimiter(data: &[u8]) -> Option<usize> {
    if data.len() < DELIMITER.len() {
        return None;
    }
    data.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

pub fn parse_header(header_bytes: &[u8]) -> Result<EnvelopeHeader, CryptoError> {
    let text = std::str::from_utf8(header_bytes)
        .map_err(|e| CryptoError::InvalidHeader(format!("not UTF-8: {e}")))?;
    let header: EnvelopeHeader =
        serde_json::from_str(text).map_err(|e| CryptoError::InvalidHeader(e.to_string()))?;

    if header.alg != ALGORITHM {
        return Err(CryptoError::InvalidHeader(format!(
            "unsupported algorithm: {}",
            header.alg
        )));
    }

    Ok(header)
}
