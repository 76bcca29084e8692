//! A signed-in user: their identity plus the key directory.
//!
//! Sending fetches the recipient's key and seals a fresh envelope. Reading
//! classifies each stored body and opens only what is actually encrypted;
//! a message that cannot be opened is replaced by a placeholder and the
//! rest of the conversation still renders.

use std::sync::Arc;

use twinbox_crypto::asymmetric;
use twinbox_crypto::envelope::{self, Role};
use twinbox_crypto::{CryptoError, IdentityKeyPair};

use crate::directory::DirectoryClient;
use crate::error::CoreError;
use crate::identity::IdentityKeyStore;
use crate::message::{
    ChatKind, MessageBody, RenderStatus, RenderedMessage, StoredMessage,
    UNDECRYPTABLE_PLACEHOLDER,
};

/// Text recovered from one stored body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedBody {
    Decrypted(String),
    /// Body was never encrypted.
    Plain(String),
}

impl OpenedBody {
    pub fn into_text(self) -> String {
        match self {
            OpenedBody::Decrypted(text) | OpenedBody::Plain(text) => text,
        }
    }
}

#[derive(Clone)]
pub struct Correspondent {
    username: String,
    identity: Arc<IdentityKeyPair>,
    directory: DirectoryClient,
}

impl Correspondent {
    pub fn new(
        username: impl Into<String>,
        identity: IdentityKeyPair,
        directory: DirectoryClient,
    ) -> Self {
        Self {
            username: username.into(),
            identity: Arc::new(identity),
            directory,
        }
    }

    /// Sign-in bootstrap: load the stored identity or generate one, and
    /// publish the public key when it was just generated.
    pub async fn bootstrap(
        username: impl Into<String>,
        store: Arc<IdentityKeyStore>,
        directory: DirectoryClient,
    ) -> Result<Self, CoreError> {
        let username = username.into();
        let provisioned = tokio::task::spawn_blocking(move || store.load_or_generate())
            .await
            .map_err(|e| CoreError::Task(e.to_string()))??;

        if provisioned.fresh {
            directory.publish(&username, &provisioned.pair.public).await?;
        }

        Ok(Self::new(username, provisioned.pair, directory))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    pub fn directory(&self) -> &DirectoryClient {
        &self.directory
    }

    /// (Re)publish our public key.
    pub async fn publish(&self) -> Result<(), CoreError> {
        self.directory
            .publish(&self.username, &self.identity.public)
            .await
    }

    /// Seal `text` for `recipient`, returning the body to hand to the
    /// transport. Never falls back to plaintext.
    pub async fn seal_for(&self, recipient: &str, text: &str) -> Result<String, CoreError> {
        let recipient_key = self.directory.fetch_public_key(recipient).await?;
        let identity = Arc::clone(&self.identity);
        let plaintext = text.as_bytes().to_vec();

        let body = tokio::task::spawn_blocking(move || {
            envelope::compose(&identity.public, &recipient_key, &plaintext)?.encode()
        })
        .await
        .map_err(|e| CoreError::Task(e.to_string()))??;

        tracing::debug!(recipient, "Sealed message");
        Ok(body)
    }

    /// Replacement body for an edited message. Always a brand-new envelope.
    pub async fn seal_edit(&self, recipient: &str, new_text: &str) -> Result<String, CoreError> {
        self.seal_for(recipient, new_text).await
    }

    /// Recover the text of one stored body.
    ///
    /// Plain bodies are returned untouched and never reach the decryptor.
    pub fn open_body(&self, body: &str, is_original_sender: bool) -> Result<OpenedBody, CoreError> {
        let classified = MessageBody::classify_with_legacy(body, self.identity.private.modulus_len());
        match classified {
            MessageBody::Plain(text) => Ok(OpenedBody::Plain(text)),
            MessageBody::Sealed(env) => {
                let role = Role::from_is_sender(is_original_sender);
                let plaintext = envelope::open(&self.identity.private, &env, role)?;
                Ok(OpenedBody::Decrypted(
                    String::from_utf8_lossy(&plaintext).into_owned(),
                ))
            }
            // direct-mode bodies were encrypted only to the recipient
            MessageBody::Direct(_) if is_original_sender => Err(CryptoError::Unwrap.into()),
            MessageBody::Direct(_) => {
                let text = asymmetric::open_text(&self.identity.private, body)?;
                Ok(OpenedBody::Decrypted(text.as_str().to_owned()))
            }
        }
    }

    /// Render a stored conversation for display.
    pub fn render_history(&self, messages: &[StoredMessage], kind: ChatKind) -> Vec<RenderedMessage> {
        messages
            .iter()
            .enumerate()
            .map(|(index, stored)| self.render_one(index, stored, kind))
            .collect()
    }

    fn render_one(&self, index: usize, stored: &StoredMessage, kind: ChatKind) -> RenderedMessage {
        let Some(body) = stored.message.as_deref() else {
            return RenderedMessage::from_stored(stored, None, RenderStatus::Plain);
        };

        if kind == ChatKind::Group {
            return RenderedMessage::from_stored(stored, Some(body.to_string()), RenderStatus::Plain);
        }

        match self.open_body(body, stored.sender == self.username) {
            Ok(OpenedBody::Decrypted(text)) => {
                RenderedMessage::from_stored(stored, Some(text), RenderStatus::Decrypted)
            }
            Ok(OpenedBody::Plain(text)) => {
                RenderedMessage::from_stored(stored, Some(text), RenderStatus::Plain)
            }
            Err(e) => {
                tracing::warn!(index, sender = %stored.sender, error = %e, "Unable to decrypt message");
                RenderedMessage::from_stored(
                    stored,
                    Some(UNDECRYPTABLE_PLACEHOLDER.to_string()),
                    RenderStatus::Undecryptable,
                )
            }
        }
    }
}
