//! Error taxonomy for the send and read paths.

use thiserror::Error;
use twinbox_crypto::CryptoError;

use crate::identity::IdentityError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The directory has no key for the user; encrypted send is impossible.
    #[error("cannot send encrypted message to {0}: no public key published")]
    KeyNotFound(String),

    /// Timeouts or transport errors outlasted the retry budget.
    #[error("key directory unavailable after {attempts} attempt(s): {reason}")]
    DirectoryUnavailable { attempts: u32, reason: String },

    /// The directory answered but refused the request (bad input, not signed in).
    #[error("key directory rejected the request: {0}")]
    DirectoryRejected(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl CoreError {
    /// True when the failure only makes one stored message unreadable and
    /// the rest of the conversation should still render.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            CoreError::Crypto(
                CryptoError::Unwrap
                    | CryptoError::Authentication
                    | CryptoError::MalformedEnvelope(_)
            )
        )
    }

    /// True when no identity could be produced at all.
    pub fn is_key_generation_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Crypto(CryptoError::KeyGeneration(_))
                | CoreError::Identity(IdentityError::KeyGeneration(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_message_kinds() {
        assert!(CoreError::Crypto(CryptoError::Unwrap).is_per_message());
        assert!(CoreError::Crypto(CryptoError::Authentication).is_per_message());
        assert!(CoreError::Crypto(CryptoError::MalformedEnvelope("x".into())).is_per_message());

        assert!(!CoreError::KeyNotFound("bob".into()).is_per_message());
        assert!(!CoreError::DirectoryUnavailable {
            attempts: 3,
            reason: "timeout".into()
        }
        .is_per_message());
        assert!(!CoreError::Crypto(CryptoError::KeyGeneration("rng".into())).is_per_message());
    }

    #[test]
    fn test_key_generation_is_fatal_kind() {
        assert!(CoreError::Crypto(CryptoError::KeyGeneration("rng".into()))
            .is_key_generation_failure());
        assert!(CoreError::Identity(IdentityError::KeyGeneration("rng".into()))
            .is_key_generation_failure());
        assert!(!CoreError::Crypto(CryptoError::Unwrap).is_key_generation_failure());
    }

    #[test]
    fn test_key_not_found_message() {
        let err = CoreError::KeyNotFound("bob".into());
        assert_eq!(
            err.to_string(),
            "cannot send encrypted message to bob: no public key published"
        );
    }
}
