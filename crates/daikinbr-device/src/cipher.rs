//! Payload sealing with the unit's pairing key

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{DeviceError, DeviceResult};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Decode the base64 pairing key stored in the configuration
pub fn decode_secret_key(secret_key: &str) -> DeviceResult<Vec<u8>> {
    STANDARD
        .decode(secret_key.trim())
        .map_err(|e| DeviceError::InvalidSecretKey(e.to_string()))
}

/// AES-256-GCM sealing of request and response payloads
///
/// Sealed form: base64(nonce || ciphertext || tag).
#[derive(Clone)]
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl PayloadCipher {
    /// Create a cipher from a 32-byte pairing key
    pub fn new(key: &[u8]) -> DeviceResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| {
            DeviceError::InvalidSecretKey(format!("expected 32 bytes, got {}", key.len()))
        })?;
        Ok(Self { cipher })
    }

    /// Encrypt a payload
    pub fn seal(&self, plaintext: &[u8]) -> DeviceResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| DeviceError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a sealed payload
    pub fn open(&self, sealed: &str) -> DeviceResult<Vec<u8>> {
        let raw = STANDARD
            .decode(sealed.trim())
            .map_err(|e| DeviceError::Malformed(format!("sealed payload is not base64: {}", e)))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(DeviceError::Malformed("sealed payload is too short".to_string()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DeviceError::Decrypt)
    }
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadCipher")
    }
}
