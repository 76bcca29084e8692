//! Asymmetric key wrapping.
//!
//! RSA-OAEP with SHA-256 as both the label hash and the MGF1 hash, empty
//! label. This is byte-compatible with WebCrypto's `RSA-OAEP` /
//! `hash: "SHA-256"`, so slots wrapped by browser clients unwrap here and
//! vice versa.
//!
//! Key text is standard base64 over DER: SubjectPublicKeyInfo for the public
//! half, PKCS#8 for the private half.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Modulus size used for new identities.
pub const DEFAULT_MODULUS_BITS: usize = 4096;
/// Smallest modulus `generate` will produce.
pub const MIN_GENERATED_MODULUS_BITS: usize = 3072;
/// Smallest modulus accepted from key text.
pub const MIN_IMPORTED_MODULUS_BITS: usize = 2048;

/// OAEP overhead for a 32-byte hash: 2 * hLen + 2.
const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Public half of an identity key pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

/// Private half of an identity key pair. Zeroized on drop by `rsa`.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("modulus_bits", &(self.0.size() * 8))
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Modulus size in bytes; also the length of every wrapped slot.
    pub fn modulus_len(&self) -> usize {
        self.0.size()
    }

    /// Largest secret `wrap` accepts under this key.
    pub fn max_wrap_len(&self) -> usize {
        self.modulus_len().saturating_sub(OAEP_SHA256_OVERHEAD)
    }

    /// DER SubjectPublicKeyInfo bytes.
    pub fn to_spki_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKey(format!("spki encoding: {e}")))
    }

    /// Portable text form: base64(SPKI DER).
    pub fn export(&self) -> Result<String, CryptoError> {
        Ok(STANDARD.encode(self.to_spki_der()?))
    }

    /// Inverse of [`PublicKey::export`].
    pub fn import(text: &str) -> Result<Self, CryptoError> {
        let der = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("public key base64: {e}")))?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::InvalidKey(format!("public key spki: {e}")))?;
        check_imported_size(key.size())?;
        Ok(Self(key))
    }
}

impl PrivateKey {
    /// Generate a fresh private key with the given modulus size.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        if bits < MIN_GENERATED_MODULUS_BITS {
            return Err(CryptoError::KeyGeneration(format!(
                "modulus of {bits} bits is below the {MIN_GENERATED_MODULUS_BITS}-bit minimum"
            )));
        }
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(Self)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    pub fn modulus_len(&self) -> usize {
        self.0.size()
    }

    /// Portable text form: base64(PKCS#8 DER).
    pub fn export(&self) -> Result<Zeroizing<String>, CryptoError> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(format!("pkcs8 encoding: {e}")))?;
        Ok(Zeroizing::new(STANDARD.encode(doc.as_bytes())))
    }

    /// Inverse of [`PrivateKey::export`].
    pub fn import(text: &str) -> Result<Self, CryptoError> {
        let der = Zeroizing::new(
            STANDARD
                .decode(text.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("private key base64: {e}")))?,
        );
        let key = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| CryptoError::InvalidKey(format!("private key pkcs8: {e}")))?;
        key.validate()
            .map_err(|e| CryptoError::InvalidKey(format!("private key check: {e}")))?;
        check_imported_size(key.size())?;
        Ok(Self(key))
    }
}

fn check_imported_size(modulus_len: usize) -> Result<(), CryptoError> {
    let bits = modulus_len * 8;
    if bits < MIN_IMPORTED_MODULUS_BITS {
        return Err(CryptoError::InvalidKey(format!(
            "modulus of {bits} bits is below the {MIN_IMPORTED_MODULUS_BITS}-bit minimum"
        )));
    }
    Ok(())
}

/// Encrypt a short secret to `public`.
///
/// `secret` must not exceed [`PublicKey::max_wrap_len`]; a longer input is
/// rejected before any encryption happens.
pub fn wrap(public: &PublicKey, secret: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let max = public.max_wrap_len();
    if secret.len() > max {
        return Err(CryptoError::WrapInputTooLong {
            len: secret.len(),
            max,
        });
    }
    public
        .0
        .encrypt(&mut OsRng, oaep(), secret)
        .map_err(|_| CryptoError::Encryption)
}

/// Recover a secret wrapped for `private`.
///
/// Any mismatch (foreign key, wrong length, tampered bytes) is `Unwrap`.
pub fn unwrap(private: &PrivateKey, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped.len() != private.modulus_len() {
        return Err(CryptoError::Unwrap);
    }
    private
        .0
        .decrypt(oaep(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Unwrap)
}

/// Legacy direct mode: encrypt a short text straight to `public` and return
/// base64 of the wrapped bytes. Only the recipient can ever read it.
pub fn seal_text(public: &PublicKey, text: &str) -> Result<String, CryptoError> {
    Ok(STANDARD.encode(wrap(public, text.as_bytes())?))
}

/// Inverse of [`seal_text`].
pub fn open_text(private: &PrivateKey, sealed_b64: &str) -> Result<Zeroizing<String>, CryptoError> {
    let wrapped = STANDARD
        .decode(sealed_b64.trim())
        .map_err(|_| CryptoError::Unwrap)?;
    let bytes = unwrap(private, &wrapped)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| CryptoError::Unwrap)?;
    Ok(Zeroizing::new(text.to_owned()))
}
