//! Identity key store
//!
//! This module handles:
//! - RSA identity generation at the configured modulus size
//! - Persisting both halves as one record (file or memory backend)
//! - Reloading the identity across sessions and clearing it on sign-out

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use twinbox_crypto::asymmetric::DEFAULT_MODULUS_BITS;
use twinbox_crypto::{CryptoError, IdentityKeyPair};
use zeroize::Zeroize;

use crate::config::IdentityConfig;

/// Record field holding the exported public key.
pub const PUBLIC_KEY_SLOT: &str = "e2ee_publicKey";
/// Record field holding the exported private key.
pub const PRIVATE_KEY_SLOT: &str = "e2ee_privateKey";

/// Identity store errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to generate keypair: {0}")]
    KeyGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid key data: {0}")]
    InvalidKeyData(String),
}

/// Persisted identity record. Both halves are written and replaced together.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    version: u32,
    #[serde(rename = "e2ee_publicKey")]
    public_key: String,
    #[serde(rename = "e2ee_privateKey")]
    private_key: String,
    /// RFC3339
    created_at: String,
}

impl StoredIdentity {
    const CURRENT_VERSION: u32 = 1;

    fn from_pair(pair: &IdentityKeyPair) -> Result<Self, IdentityError> {
        let (public_key, private_key) = pair
            .export()
            .map_err(|e| IdentityError::InvalidKeyData(e.to_string()))?;
        Ok(Self {
            version: Self::CURRENT_VERSION,
            public_key,
            private_key: private_key.as_str().to_owned(),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn to_pair(&self) -> Result<IdentityKeyPair, IdentityError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(IdentityError::InvalidKeyData(format!(
                "unsupported identity record version {}",
                self.version
            )));
        }
        IdentityKeyPair::import(&self.public_key, &self.private_key)
            .map_err(|e| IdentityError::InvalidKeyData(e.to_string()))
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn created_at(&self) -> Result<chrono::DateTime<chrono::Utc>, IdentityError> {
        chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| IdentityError::Serialization(format!("Invalid timestamp: {e}")))
    }
}

impl std::fmt::Debug for StoredIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredIdentity")
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Drop for StoredIdentity {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Key storage backend
pub trait KeyStore: Send + Sync {
    /// Replace the stored identity
    fn store(&self, identity: &StoredIdentity) -> Result<(), IdentityError>;
    /// Load the stored identity, if any
    fn load(&self) -> Result<Option<StoredIdentity>, IdentityError>;
    /// Delete the stored identity
    fn delete(&self) -> Result<(), IdentityError>;
    /// Check if an identity exists
    fn exists(&self) -> bool;
}

/// File-based key storage
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl KeyStore for FileKeyStore {
    fn store(&self, identity: &StoredIdentity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut json = serde_json::to_string_pretty(identity)
            .map_err(|e| IdentityError::Serialization(e.to_string()))?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("tmp");
        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(json.as_bytes())?;
            file.sync_all()
        })();
        json.zeroize();
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    fn load(&self) -> Result<Option<StoredIdentity>, IdentityError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = fs::File::open(&self.path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let parsed = serde_json::from_str::<StoredIdentity>(&contents)
            .map_err(|e| IdentityError::Serialization(e.to_string()));
        contents.zeroize();

        parsed.map(Some)
    }

    fn delete(&self) -> Result<(), IdentityError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// In-process key storage, for tests and embedding
#[derive(Default)]
pub struct MemoryKeyStore {
    slot: Mutex<Option<StoredIdentity>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn store(&self, identity: &StoredIdentity) -> Result<(), IdentityError> {
        *self.slot.lock() = Some(identity.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredIdentity>, IdentityError> {
        Ok(self.slot.lock().clone())
    }

    fn delete(&self) -> Result<(), IdentityError> {
        self.slot.lock().take();
        Ok(())
    }

    fn exists(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Result of [`IdentityKeyStore::load_or_generate`].
#[derive(Debug, Clone)]
pub struct ProvisionedIdentity {
    pub pair: IdentityKeyPair,
    /// True when the pair was generated by this call and has not been
    /// published yet.
    pub fresh: bool,
}

/// The local user's identity key pair and the backend it lives in.
///
/// Every backend call happens under one lock, so a reader never sees a
/// half-replaced record and generate+save is a single unit of work.
pub struct IdentityKeyStore {
    backend: Mutex<Box<dyn KeyStore>>,
    key_bits: usize,
}

impl IdentityKeyStore {
    pub fn new(backend: Box<dyn KeyStore>) -> Self {
        Self {
            backend: Mutex::new(backend),
            key_bits: DEFAULT_MODULUS_BITS,
        }
    }

    /// Modulus size used by [`generate`](Self::generate).
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// File-backed store at the configured (or default) path.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let path = config.resolved_key_path();
        tracing::debug!(path = %path.display(), "Using file identity store");
        Self::new(Box::new(FileKeyStore::new(path))).with_key_bits(config.key_bits)
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryKeyStore::new()))
    }

    /// Generate a new pair and persist it, replacing any stored identity.
    pub fn generate(&self) -> Result<IdentityKeyPair, IdentityError> {
        let backend = self.backend.lock();
        self.generate_locked(&**backend)
    }

    /// Load the stored pair. Never generates.
    pub fn load(&self) -> Result<Option<IdentityKeyPair>, IdentityError> {
        let backend = self.backend.lock();
        let pair = backend.load()?.map(|stored| stored.to_pair()).transpose()?;
        if pair.is_some() {
            tracing::debug!("Loaded identity from key store");
        }
        Ok(pair)
    }

    /// Persist both halves of `pair`.
    pub fn save(&self, pair: &IdentityKeyPair) -> Result<(), IdentityError> {
        let stored = StoredIdentity::from_pair(pair)?;
        self.backend.lock().store(&stored)
    }

    /// Return the stored pair, or generate and persist a new one.
    pub fn load_or_generate(&self) -> Result<ProvisionedIdentity, IdentityError> {
        let backend = self.backend.lock();
        if let Some(stored) = backend.load()? {
            tracing::debug!("Loaded identity from key store");
            return Ok(ProvisionedIdentity {
                pair: stored.to_pair()?,
                fresh: false,
            });
        }
        let pair = self.generate_locked(&**backend)?;
        Ok(ProvisionedIdentity { pair, fresh: true })
    }

    /// Creation time of the stored record.
    pub fn created_at(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>, IdentityError> {
        let backend = self.backend.lock();
        backend.load()?.map(|stored| stored.created_at()).transpose()
    }

    /// Remove both halves (sign-out).
    pub fn clear(&self) -> Result<(), IdentityError> {
        self.backend.lock().delete()?;
        tracing::info!("Cleared stored identity");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.backend.lock().exists()
    }

    fn generate_locked(&self, backend: &dyn KeyStore) -> Result<IdentityKeyPair, IdentityError> {
        let pair = IdentityKeyPair::generate_with_bits(self.key_bits).map_err(|e| match e {
            CryptoError::KeyGeneration(reason) => IdentityError::KeyGeneration(reason),
            other => IdentityError::KeyGeneration(other.to_string()),
        })?;
        backend.store(&StoredIdentity::from_pair(&pair)?)?;

        tracing::info!(
            bits = self.key_bits,
            fingerprint = %short_fingerprint(&pair),
            "Generated new identity"
        );
        Ok(pair)
    }
}

/// First eight bytes of the key fingerprint, hex encoded, for logs.
pub fn short_fingerprint(pair: &IdentityKeyPair) -> String {
    match pair.fingerprint() {
        Ok(fp) => hex::encode(&fp[..8]),
        Err(_) => "unknown".to_string(),
    }
}
