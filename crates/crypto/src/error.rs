use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid encrypted format")]
    MissingDelimiter,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Wrong password and corrupted ciphertext are deliberately indistinguishable.
    #[error("decryption failed (wrong password?)")]
    DecryptionFailed,
}
