use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use rand::RngCore;

use crate::error::ApiError;

/// Handles AES-256-GCM encryption for refresh credentials stored in the
/// database. Access tokens are never persisted, so they are never encrypted
/// here.
pub struct CryptoEngine {
    cipher: Aes256Gcm,
}

impl CryptoEngine {
    /// Create a new CryptoEngine from a base64-encoded 32-byte key.
    pub fn new(master_key_b64: &str) -> Result<Self, ApiError> {
        let master_key = base64::engine::general_purpose::STANDARD
            .decode(master_key_b64)
            .map_err(|e| ApiError::Crypto(format!("Invalid MASTER_KEY base64: {e}")))?;

        if master_key.len() != 32 {
            return Err(ApiError::Crypto(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| ApiError::Crypto(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self { cipher })
    }

    /// Encrypt plaintext using AES-256-GCM. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, ApiError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| ApiError::Crypto(format!("Encryption failed: {e}")))?;

        // Prepend nonce to ciphertext
        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to plaintext.
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, ApiError> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|e| ApiError::Crypto(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(ApiError::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| ApiError::Crypto(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| ApiError::Crypto(format!("Invalid UTF-8 after decrypt: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn test_engine() -> CryptoEngine {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        CryptoEngine::new(&key).unwrap()
    }

    #[test]
    fn round_trips_and_randomizes_nonce() {
        let engine = test_engine();
        let a = engine.encrypt("refresh-credential").unwrap();
        let b = engine.encrypt("refresh-credential").unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.decrypt(&a).unwrap(), "refresh-credential");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let engine = test_engine();
        let enc = engine.encrypt("secret").unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD.decode(&enc).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&raw);
        assert!(engine.decrypt(&tampered).is_err());
    }

    #[test]
    fn rejects_short_key() {
        let key = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(CryptoEngine::new(&key).is_err());
    }
}
