//! twinbox core - everything around the envelope codec.
//!
//! This crate implements:
//! - Identity key store with file and memory backends
//! - Key directory trait, in-memory and HTTP implementations
//! - Retrying, time-bounded directory client
//! - Message-body classification and conversation history decryption
//! - Configuration

#![forbid(unsafe_code)]

// Identity and directory
pub mod identity;
pub mod directory;

// Conversation layer
pub mod message;
pub mod correspondent;

// Supporting modules
pub mod config;
pub mod error;

#[cfg(feature = "http-directory")]
pub mod http_directory;

#[cfg(test)]
pub(crate) mod test_keys;

pub use config::{CliOverrides, Config};
pub use correspondent::Correspondent;
pub use directory::{DirectoryClient, InMemoryKeyDirectory, KeyDirectory};
pub use error::CoreError;
pub use identity::{IdentityKeyStore, ProvisionedIdentity};
pub use message::{ChatKind, MessageBody, RenderedMessage, StoredMessage};

#[cfg(feature = "http-directory")]
pub use http_directory::HttpKeyDirectory;
