//! Payload encryption using AES-256-GCM
//!
//! Every stored file gets its own random key and nonce, generated fresh at
//! encryption time. Key and nonce travel beside the ciphertext as metadata
//! (they are persisted on the file record, not prepended to the blob), so a
//! blob on its own is opaque bytes.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;
/// Size of a GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Errors from key/nonce handling and sealing
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Stored key bytes had the wrong length
    #[error("invalid key length: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),
    /// Stored nonce bytes had the wrong length
    #[error("invalid nonce length: expected {NONCE_SIZE} bytes, got {0}")]
    InvalidNonceLength(usize),
    /// Plaintext exceeds what GCM can seal in a single message
    #[error("payload too large to encrypt")]
    PayloadTooLarge,
}

/// Authentication tag verification failed: wrong key, wrong nonce, or the
/// ciphertext was modified. No plaintext is ever released in this case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("decryption failed: ciphertext rejected by authentication check")]
pub struct DecryptionError;

/// A 256-bit file encryption key
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey([u8; KEY_SIZE]);

/// A 96-bit GCM nonce, unique per encryption
#[derive(Clone, PartialEq, Eq)]
pub struct FileNonce([u8; NONCE_SIZE]);

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(..)")
    }
}

impl fmt::Debug for FileNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileNonce(..)")
    }
}

impl FileKey {
    /// Generate a new random key using the system CSPRNG
    pub fn generate() -> Self {
        let mut buf = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut buf).expect("failed to generate random bytes");
        Self(buf)
    }

    /// Reconstruct a key from stored bytes, validating the length
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(data.len()));
        }
        let mut buf = [0u8; KEY_SIZE];
        buf.copy_from_slice(data);
        Ok(Self(buf))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FileNonce {
    /// Generate a new random nonce using the system CSPRNG
    pub fn generate() -> Self {
        let mut buf = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut buf).expect("failed to generate random bytes");
        Self(buf)
    }

    /// Reconstruct a nonce from stored bytes, validating the length
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(data.len()));
        }
        let mut buf = [0u8; NONCE_SIZE];
        buf.copy_from_slice(data);
        Ok(Self(buf))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Ciphertext plus the key/nonce metadata needed to open it later
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub key: FileKey,
    pub nonce: FileNonce,
}

/// Encrypt a payload with AES-256-GCM.
///
/// A fresh key is generated when `key` is `None`; the nonce is always fresh,
/// so a reused key never sees a repeated nonce through this path. The caller
/// is responsible for persisting the returned key and nonce alongside the
/// file record.
pub fn encrypt(plaintext: &[u8], key: Option<FileKey>) -> Result<EncryptedBlob, CryptoError> {
    let key = key.unwrap_or_else(FileKey::generate);
    let nonce = FileNonce::generate();

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce.bytes()), plaintext)
        .map_err(|_| CryptoError::PayloadTooLarge)?;

    Ok(EncryptedBlob {
        ciphertext,
        key,
        nonce,
    })
}

/// Decrypt a payload, verifying the GCM authentication tag.
///
/// Any tampering with the ciphertext, or a key/nonce mismatch, yields
/// [`DecryptionError`] and no plaintext at all.
pub fn decrypt(
    ciphertext: &[u8],
    key: &FileKey,
    nonce: &FileNonce,
) -> Result<Vec<u8>, DecryptionError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce.bytes()), ciphertext)
        .map_err(|_| DecryptionError)
}
