//! Public key directory abstraction.
//!
//! This module defines the `KeyDirectory` trait, an in-memory implementation
//! for tests and embedding, and `DirectoryClient`, which bounds every call
//! with a timeout and retries transient failures with exponential backoff.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use twinbox_crypto::PublicKey;

use crate::config::DirectoryConfig;
use crate::error::CoreError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors a directory backend can report for a single call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No key is published for this user.
    #[error("no public key for {0}")]
    NotFound(String),

    /// Transport failure or server error; worth retrying.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The directory refused the request; retrying will not help.
    #[error("directory rejected request: {0}")]
    Rejected(String),
}

// ============================================================================
// Directory Trait
// ============================================================================

/// Username to public-key-text mapping.
///
/// The directory is trusted to return the key the user published.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Publish (or replace) the public key text for `username`.
    async fn publish(&self, username: &str, public_key: &str) -> Result<(), DirectoryError>;

    /// Fetch the public key text for `username`.
    async fn fetch(&self, username: &str) -> Result<String, DirectoryError>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyDirectory {
    keys: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl KeyDirectory for InMemoryKeyDirectory {
    async fn publish(&self, username: &str, public_key: &str) -> Result<(), DirectoryError> {
        if username.is_empty() || public_key.is_empty() {
            return Err(DirectoryError::Rejected(
                "username and publicKey are required".to_string(),
            ));
        }
        self.keys
            .write()
            .await
            .insert(username.to_string(), public_key.to_string());
        Ok(())
    }

    async fn fetch(&self, username: &str) -> Result<String, DirectoryError> {
        self.keys
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(username.to_string()))
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Bound on each individual attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DirectoryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }

    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`,
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

// ============================================================================
// Client
// ============================================================================

enum CallFailure {
    /// Not worth retrying.
    Terminal(DirectoryError),
    Exhausted { attempts: u32, reason: String },
}

/// Time-bounded, retrying access to a [`KeyDirectory`].
#[derive(Clone)]
pub struct DirectoryClient {
    directory: Arc<dyn KeyDirectory>,
    policy: RetryPolicy,
}

impl DirectoryClient {
    pub fn new(directory: Arc<dyn KeyDirectory>, policy: RetryPolicy) -> Self {
        Self { directory, policy }
    }

    /// Publish our public key under `username`.
    pub async fn publish(&self, username: &str, public_key: &PublicKey) -> Result<(), CoreError> {
        let text = public_key.export()?;
        let directory = Arc::clone(&self.directory);
        self.call("publish", username, || {
            let directory = Arc::clone(&directory);
            let text = text.clone();
            let username = username.to_string();
            async move { directory.publish(&username, &text).await }
        })
        .await
        .map_err(|failure| match failure {
            CallFailure::Terminal(err) => CoreError::DirectoryRejected(err.to_string()),
            CallFailure::Exhausted { attempts, reason } => {
                CoreError::DirectoryUnavailable { attempts, reason }
            }
        })?;

        tracing::info!(username, "Published public key");
        Ok(())
    }

    /// Fetch and import `username`'s public key.
    pub async fn fetch_public_key(&self, username: &str) -> Result<PublicKey, CoreError> {
        let directory = Arc::clone(&self.directory);
        let text = self
            .call("fetch", username, || {
                let directory = Arc::clone(&directory);
                let username = username.to_string();
                async move { directory.fetch(&username).await }
            })
            .await
            .map_err(|failure| match failure {
                CallFailure::Terminal(DirectoryError::NotFound(_)) => {
                    CoreError::KeyNotFound(username.to_string())
                }
                CallFailure::Terminal(err) => CoreError::DirectoryRejected(err.to_string()),
                CallFailure::Exhausted { attempts, reason } => {
                    CoreError::DirectoryUnavailable { attempts, reason }
                }
            })?;

        Ok(PublicKey::import(&text)?)
    }

    async fn call<T, F, Fut>(
        &self,
        op: &'static str,
        username: &str,
        mut attempt_fn: F,
    ) -> Result<T, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        let attempts = self.policy.max_retries.saturating_add(1);
        let mut last_reason = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.backoff_for(attempt - 1);
                tracing::debug!(op, username, attempt, ?delay, "Retrying key directory call");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.policy.timeout, attempt_fn()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(DirectoryError::Unavailable(reason))) => last_reason = reason,
                Ok(Err(terminal)) => return Err(CallFailure::Terminal(terminal)),
                Err(_) => {
                    last_reason = format!("timed out after {:?}", self.policy.timeout);
                }
            }
        }

        tracing::warn!(op, username, attempts, reason = %last_reason, "Key directory unavailable");
        Err(CallFailure::Exhausted {
            attempts,
            reason: last_reason,
        })
    }
}
