//! Stored message bodies and how they are told apart.
//!
//! The transport stores one opaque string per message. It is either a
//! serialized envelope, a legacy direct-mode ciphertext, or plain text
//! (messages from before encryption, and every group message).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use twinbox_crypto::Envelope;

/// Shown in place of a single message that cannot be decrypted.
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[Unable to decrypt]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one conversation; bodies may be encrypted.
    Contact,
    /// Group conversation; bodies are always plain.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Dual-recipient envelope.
    Sealed(Envelope),
    /// Legacy direct-mode ciphertext, readable only by its recipient.
    Direct(Vec<u8>),
    /// Not encrypted; shown as is.
    Plain(String),
}

impl MessageBody {
    /// Classify without legacy detection: envelope or plain text.
    pub fn classify(body: &str) -> Self {
        Self::classify_inner(body, None)
    }

    /// Classify, also recognising direct-mode ciphertexts sized for a
    /// `modulus_len`-byte key.
    pub fn classify_with_legacy(body: &str, modulus_len: usize) -> Self {
        Self::classify_inner(body, Some(modulus_len))
    }

    fn classify_inner(body: &str, modulus_len: Option<usize>) -> Self {
        let trimmed = body.trim();

        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            return match Envelope::parse(trimmed) {
                Ok(envelope) => MessageBody::Sealed(envelope),
                Err(e) => {
                    tracing::debug!(error = %e, "Object-shaped body is not an envelope, treating as plain text");
                    MessageBody::Plain(body.to_string())
                }
            };
        }

        if let Some(modulus_len) = modulus_len.filter(|len| *len > 0) {
            if let Ok(bytes) = STANDARD.decode(trimmed) {
                if bytes.len() == modulus_len {
                    return MessageBody::Direct(bytes);
                }
            }
        }

        MessageBody::Plain(body.to_string())
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self, MessageBody::Plain(_))
    }
}

/// One message as the transport returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub sender: String,
    /// Absent for file-only messages.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl StoredMessage {
    pub fn text(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            message: Some(message.into()),
            file: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Decrypted,
    Plain,
    Undecryptable,
}

/// One message ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub sender: String,
    pub text: Option<String>,
    pub file: Option<String>,
    pub created_at: Option<String>,
    pub status: RenderStatus,
}

impl RenderedMessage {
    pub(crate) fn from_stored(
        stored: &StoredMessage,
        text: Option<String>,
        status: RenderStatus,
    ) -> Self {
        Self {
            sender: stored.sender.clone(),
            text,
            file: stored.file.clone(),
            created_at: stored.created_at.clone(),
            status,
        }
    }
}
