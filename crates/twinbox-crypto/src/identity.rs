//! Long-lived identity key pair.
//!
//! One pair per user. The private half never leaves the owning client; the
//! public half is published to the key directory as exported text.

use zeroize::Zeroizing;

use crate::asymmetric::{PrivateKey, PublicKey, DEFAULT_MODULUS_BITS};
use crate::error::CryptoError;
use crate::hash::key_fingerprint;
use crate::utils::constant_time_compare;

#[derive(Clone, Debug)]
pub struct IdentityKeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl IdentityKeyPair {
    /// Generate a new identity with the default 4096-bit modulus.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with_bits(DEFAULT_MODULUS_BITS)
    }

    pub fn generate_with_bits(bits: usize) -> Result<Self, CryptoError> {
        let private = PrivateKey::generate(bits)?;
        Ok(Self::from_private(private))
    }

    pub fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    /// Rebuild a pair from its two exported halves.
    ///
    /// The public text must describe the same key as the private text;
    /// a mismatched pair is rejected rather than half-trusted.
    pub fn import(public_text: &str, private_text: &str) -> Result<Self, CryptoError> {
        let private = PrivateKey::import(private_text)?;
        let claimed = PublicKey::import(public_text)?;
        let derived = private.public_key();
        if !constant_time_compare(&claimed.to_spki_der()?, &derived.to_spki_der()?) {
            return Err(CryptoError::InvalidKey(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(Self {
            public: derived,
            private,
        })
    }

    /// Both halves as portable text: (public, private).
    pub fn export(&self) -> Result<(String, Zeroizing<String>), CryptoError> {
        Ok((self.public.export()?, self.private.export()?))
    }

    /// SHA-256 of the public SPKI, for out-of-band comparison.
    pub fn fingerprint(&self) -> Result<[u8; 32], CryptoError> {
        Ok(key_fingerprint(&self.public.to_spki_der()?))
    }
}
