use thiserror::Error;

/// Errors produced by the cryptographic primitives and the envelope codec.
///
/// `Unwrap`, `Authentication` and `MalformedEnvelope` only ever concern a
/// single message; `KeyGeneration` is the one kind that should abort the
/// calling flow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("secret of {len} bytes exceeds the {max}-byte wrap limit of this key")]
    WrapInputTooLong { len: usize, max: usize },

    #[error("wrapped key does not belong to this private key")]
    Unwrap,

    #[error("authentication tag mismatch")]
    Authentication,

    #[error("encryption failed")]
    Encryption,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
