use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::envelope::{EnvelopeHeader, Kdf};
use crate::{CryptoError, IV_SIZE, KEY_SIZE, SALT_SIZE};

/// A 256-bit AES key derived from a password.
///
/// Lives only for one encrypt or decrypt call and is zeroized on drop.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2-HMAC-SHA256 over the password and salt.
pub fn derive_pbkdf2(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<DerivedKey, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::KeyDerivationFailed(
            "iteration count must be positive".into(),
        ));
    }
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    Ok(DerivedKey::from_bytes(key))
}

/// Legacy mode: one SHA-256 digest over `salt ++ password`.
pub fn derive_sha256(password: &[u8], salt: &[u8]) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password);
    DerivedKey::from_bytes(hasher.finalize().into())
}

/// Derive the key an envelope header asks for.
pub fn derive_for_header(
    password: &str,
    header: &EnvelopeHeader,
) -> Result<DerivedKey, CryptoError> {
    let kdf = header.kdf()?;
    tracing::debug!(kdf = kdf.as_str(), "deriving envelope key");
    match kdf {
        Kdf::Pbkdf2Sha256 => derive_pbkdf2(password.as_bytes(), &header.salt, header.iterations()),
        Kdf::Sha256 => Ok(derive_sha256(password.as_bytes(), &header.salt)),
    }
}

/// Generate a random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Generate a random 12-byte GCM nonce.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}
