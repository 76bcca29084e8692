//! twinbox CLI
//!
//! This crate provides a command-line interface for:
//! - Creating, showing and clearing the local identity
//! - Publishing and fetching public keys
//! - Sealing messages for a contact and opening stored bodies
//! - Rendering a stored conversation

pub mod cli;

pub use cli::Cli;

use twinbox_core::config::ConfigError;
use twinbox_core::identity::IdentityError;
use twinbox_core::CoreError;
use twinbox_crypto::CryptoError;

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Invalid input
/// - 3: Recipient has no published key
/// - 4: Key directory unavailable
/// - 5: Message could not be decrypted
/// - 6: No local identity
/// - 7: Identity key pair could not be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidInput = 2,
    KeyNotFound = 3,
    DirectoryUnavailable = 4,
    DecryptionFailed = 5,
    NoIdentity = 6,
    KeyGenerationFailed = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Pick the exit code for an error returned by a command.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(IdentityError::KeyGeneration(_)) = err.downcast_ref::<IdentityError>() {
            return ExitCode::KeyGenerationFailed;
        }
        if err.downcast_ref::<ConfigError>().is_some() {
            return ExitCode::InvalidInput;
        }
        match err.downcast_ref::<CoreError>() {
            Some(e) if e.is_key_generation_failure() => ExitCode::KeyGenerationFailed,
            Some(CoreError::KeyNotFound(_)) => ExitCode::KeyNotFound,
            Some(CoreError::DirectoryUnavailable { .. }) => ExitCode::DirectoryUnavailable,
            Some(e) if e.is_per_message() => ExitCode::DecryptionFailed,
            Some(CoreError::Crypto(CryptoError::InvalidKey(_))) => ExitCode::InvalidInput,
            _ => ExitCode::GeneralError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::KeyNotFound => "KEY_NOT_FOUND",
            ExitCode::DirectoryUnavailable => "DIRECTORY_UNAVAILABLE",
            ExitCode::DecryptionFailed => "DECRYPTION_FAILED",
            ExitCode::NoIdentity => "NO_IDENTITY",
            ExitCode::KeyGenerationFailed => "KEY_GENERATION_FAILED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::InvalidInput => "Invalid arguments or data provided",
            ExitCode::KeyNotFound => "The recipient has not published a public key",
            ExitCode::DirectoryUnavailable => "The key directory could not be reached",
            ExitCode::DecryptionFailed => "The message could not be decrypted with this identity",
            ExitCode::NoIdentity => "No identity is stored; run `twinbox identity init`",
            ExitCode::KeyGenerationFailed => "An identity key pair could not be generated",
        }
    }
}
