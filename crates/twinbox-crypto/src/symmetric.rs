//! One-time message-body encryption.
//!
//! AES-256-GCM, 96-bit random nonce, 128-bit tag appended to the
//! ciphertext. No associated data.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// A symmetric key that encrypts exactly one message body.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Raw key as base64 text. This is the form that gets wrapped.
    pub fn export(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.0))
    }

    pub fn import(text: &str) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(
            STANDARD
                .decode(text)
                .map_err(|e| CryptoError::InvalidKey(format!("session key base64: {e}")))?,
        );
        let bytes: [u8; KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "session key length: expected {KEY_LEN}, got {}",
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

/// Fresh random nonce. Every call to [`encrypt`] must get its own.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn encrypt(
    key: &SessionKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Encryption)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt and verify. On tag mismatch nothing but `Authentication` comes
/// back; there is no partial plaintext.
pub fn decrypt(
    key: &SessionKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::Authentication);
    }
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Authentication)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let key = SessionKey::generate();
        let nonce = generate_nonce();
        let ct = encrypt(&key, &nonce, b"hello").unwrap();
        assert_eq!(ct.len(), 5 + TAG_LEN);

        let pt = decrypt(&key, &nonce, &ct).unwrap();
        assert_eq!(pt.as_slice(), b"hello");
    }

    #[test]
    fn test_empty_plaintext() {
        let key = SessionKey::generate();
        let nonce = generate_nonce();
        let ct = encrypt(&key, &nonce, b"").unwrap();
        assert_eq!(ct.len(), TAG_LEN);
        assert!(decrypt(&key, &nonce, &ct).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails() {
        let nonce = generate_nonce();
        let ct = encrypt(&SessionKey::generate(), &nonce, b"hello").unwrap();
        assert_eq!(
            decrypt(&SessionKey::generate(), &nonce, &ct),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = SessionKey::generate();
        let ct = encrypt(&key, &generate_nonce(), b"hello").unwrap();
        assert_eq!(
            decrypt(&key, &generate_nonce(), &ct),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_tampered_tag_fails() {
        let key = SessionKey::generate();
        let nonce = generate_nonce();
        let mut ct = encrypt(&key, &nonce, b"hello").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x80;
        assert_eq!(decrypt(&key, &nonce, &ct), Err(CryptoError::Authentication));
    }

    #[test]
    fn test_short_ciphertext_fails() {
        let key = SessionKey::generate();
        assert_eq!(
            decrypt(&key, &generate_nonce(), &[0u8; TAG_LEN - 1]),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_session_key_text_round_trip() {
        let key = SessionKey::generate();
        let text = key.export();
        // 32 bytes -> 44 base64 chars, the size browsers produce for AES-256 raw keys
        assert_eq!(text.len(), 44);
        let imported = SessionKey::import(&text).unwrap();
        assert_eq!(imported.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_session_key_import_rejects_wrong_length() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            SessionKey::import(&short),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn test_session_key_debug_is_redacted() {
        let key = SessionKey::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SessionKey(..)");
    }
}
