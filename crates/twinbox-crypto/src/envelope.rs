//! Dual-recipient envelopes.
//!
//! A message body is encrypted once under a fresh session key, and that
//! session key is wrapped twice: once to the sender's own public key and
//! once to the recipient's. Either party can later open the stored envelope
//! with only their own private key; the server holding it can open neither
//! slot.
//!
//! Wire form is a JSON object with exactly four base64 string members:
//!
//! ```text
//! {"ciphertext":"..","iv":"..","keyForSender":"..","keyForRecipient":".."}
//! ```

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::asymmetric::{self, PrivateKey, PublicKey};
use crate::error::CryptoError;
use crate::symmetric::{self, SessionKey, NONCE_LEN, TAG_LEN};

/// Which wrapped-key slot the caller is entitled to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The party who composed the envelope.
    Sender,
    /// The party it was addressed to.
    Recipient,
}

impl Role {
    pub fn from_is_sender(is_original_sender: bool) -> Self {
        if is_original_sender {
            Role::Sender
        } else {
            Role::Recipient
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_LEN],
    key_for_sender: Vec<u8>,
    key_for_recipient: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireEnvelope {
    ciphertext: String,
    #[serde(rename = "iv")]
    nonce: String,
    key_for_sender: String,
    key_for_recipient: String,
}

fn malformed(reason: impl Into<String>) -> CryptoError {
    CryptoError::MalformedEnvelope(reason.into())
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| malformed(format!("{name}: {e}")))
}

impl Envelope {
    /// Assemble an envelope from raw parts, enforcing the same shape rules as
    /// [`Envelope::parse`].
    pub fn from_parts(
        ciphertext: Vec<u8>,
        nonce: &[u8],
        key_for_sender: Vec<u8>,
        key_for_recipient: Vec<u8>,
    ) -> Result<Self, CryptoError> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            malformed(format!("nonce must be {NONCE_LEN} bytes, got {}", nonce.len()))
        })?;
        if ciphertext.len() < TAG_LEN {
            return Err(malformed("ciphertext shorter than authentication tag"));
        }
        if key_for_sender.is_empty() || key_for_recipient.is_empty() {
            return Err(malformed("empty key slot"));
        }
        Ok(Self {
            ciphertext,
            nonce,
            key_for_sender,
            key_for_recipient,
        })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn key_for_sender(&self) -> &[u8] {
        &self.key_for_sender
    }

    pub fn key_for_recipient(&self) -> &[u8] {
        &self.key_for_recipient
    }

    pub fn slot(&self, role: Role) -> &[u8] {
        match role {
            Role::Sender => &self.key_for_sender,
            Role::Recipient => &self.key_for_recipient,
        }
    }

    /// Serialize to the four-field JSON wire form.
    pub fn encode(&self) -> Result<String, CryptoError> {
        let wire = WireEnvelope {
            ciphertext: STANDARD.encode(&self.ciphertext),
            nonce: STANDARD.encode(self.nonce),
            key_for_sender: STANDARD.encode(&self.key_for_sender),
            key_for_recipient: STANDARD.encode(&self.key_for_recipient),
        };
        serde_json::to_string(&wire).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Parse untrusted text. Anything other than the exact four-field shape
    /// is `MalformedEnvelope`.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let wire: WireEnvelope =
            serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        Self::from_parts(
            decode_field("ciphertext", &wire.ciphertext)?,
            &decode_field("iv", &wire.nonce)?,
            decode_field("keyForSender", &wire.key_for_sender)?,
            decode_field("keyForRecipient", &wire.key_for_recipient)?,
        )
    }
}

impl FromStr for Envelope {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Encrypt `plaintext` so that both `my_public` and `recipient_public` can
/// open it.
///
/// Both slots wrap the identical session key, so both parties recover the
/// same plaintext. A fresh session key and nonce are drawn per call.
pub fn compose(
    my_public: &PublicKey,
    recipient_public: &PublicKey,
    plaintext: &[u8],
) -> Result<Envelope, CryptoError> {
    let session_key = SessionKey::generate();
    let nonce = symmetric::generate_nonce();
    let ciphertext = symmetric::encrypt(&session_key, &nonce, plaintext)?;

    let raw_key = session_key.export();
    let key_for_sender = asymmetric::wrap(my_public, raw_key.as_bytes())?;
    let key_for_recipient = asymmetric::wrap(recipient_public, raw_key.as_bytes())?;

    Ok(Envelope {
        ciphertext,
        nonce,
        key_for_sender,
        key_for_recipient,
    })
}

/// Open `envelope` with the caller's private key from the slot selected by
/// `role`.
///
/// Only that one slot is tried. A slot that was not produced for
/// `my_private` is `Unwrap`; a body or nonce that fails verification is
/// `Authentication`.
pub fn open(
    my_private: &PrivateKey,
    envelope: &Envelope,
    role: Role,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let raw_key = asymmetric::unwrap(my_private, envelope.slot(role))?;
    let key_text = std::str::from_utf8(&raw_key).map_err(|_| CryptoError::Unwrap)?;
    let session_key = SessionKey::import(key_text).map_err(|_| CryptoError::Unwrap)?;
    symmetric::decrypt(&session_key, &envelope.nonce, &envelope.ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::{alice, bob, carol};

    fn hello_from_alice_to_bob() -> Envelope {
        compose(&alice().public, &bob().public, b"hello").unwrap()
    }

    #[test]
    fn test_scenario_alice_bob_carol() {
        let env = hello_from_alice_to_bob();

        let bob_reads = open(&bob().private, &env, Role::Recipient).unwrap();
        assert_eq!(bob_reads.as_slice(), b"hello");

        let alice_reads = open(&alice().private, &env, Role::Sender).unwrap();
        assert_eq!(alice_reads.as_slice(), b"hello");

        for role in [Role::Sender, Role::Recipient] {
            assert_eq!(open(&carol().private, &env, role), Err(CryptoError::Unwrap));
        }
    }

    #[test]
    fn test_role_isolation() {
        let env = hello_from_alice_to_bob();
        assert_eq!(
            open(&alice().private, &env, Role::Recipient),
            Err(CryptoError::Unwrap)
        );
        assert_eq!(
            open(&bob().private, &env, Role::Sender),
            Err(CryptoError::Unwrap)
        );
    }

    #[test]
    fn test_self_addressed_envelope_opens_in_both_roles() {
        let env = compose(&alice().public, &alice().public, b"note to self").unwrap();
        for role in [Role::Sender, Role::Recipient] {
            assert_eq!(
                open(&alice().private, &env, role).unwrap().as_slice(),
                b"note to self"
            );
        }
    }

    #[test]
    fn test_both_slots_wrap_the_same_key() {
        let env = hello_from_alice_to_bob();
        let from_sender = asymmetric::unwrap(&alice().private, env.key_for_sender()).unwrap();
        let from_recipient =
            asymmetric::unwrap(&bob().private, env.key_for_recipient()).unwrap();
        assert_eq!(from_sender, from_recipient);
    }

    #[test]
    fn test_tampered_ciphertext_is_authentication_failure() {
        let env = hello_from_alice_to_bob();
        let mut ct = env.ciphertext().to_vec();
        ct[0] ^= 0x01;
        let tampered = Envelope::from_parts(
            ct,
            env.nonce(),
            env.key_for_sender().to_vec(),
            env.key_for_recipient().to_vec(),
        )
        .unwrap();
        assert_eq!(
            open(&bob().private, &tampered, Role::Recipient),
            Err(CryptoError::Authentication)
        );
        assert_eq!(
            open(&alice().private, &tampered, Role::Sender),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_tampered_nonce_is_authentication_failure() {
        let env = hello_from_alice_to_bob();
        let mut nonce = *env.nonce();
        nonce[NONCE_LEN - 1] ^= 0x40;
        let tampered = Envelope::from_parts(
            env.ciphertext().to_vec(),
            &nonce,
            env.key_for_sender().to_vec(),
            env.key_for_recipient().to_vec(),
        )
        .unwrap();
        for (pair, role) in [(alice(), Role::Sender), (bob(), Role::Recipient)] {
            assert_eq!(
                open(&pair.private, &tampered, role),
                Err(CryptoError::Authentication)
            );
        }
    }

    #[test]
    fn test_tampered_slot_is_unwrap_failure() {
        let env = hello_from_alice_to_bob();
        let mut slot = env.key_for_recipient().to_vec();
        slot[3] ^= 0x10;
        let tampered = Envelope::from_parts(
            env.ciphertext().to_vec(),
            env.nonce(),
            env.key_for_sender().to_vec(),
            slot,
        )
        .unwrap();
        assert_eq!(
            open(&bob().private, &tampered, Role::Recipient),
            Err(CryptoError::Unwrap)
        );
        // the other slot is untouched
        assert_eq!(
            open(&alice().private, &tampered, Role::Sender).unwrap().as_slice(),
            b"hello"
        );
    }

    #[test]
    fn test_nonce_uniqueness() {
        let a = hello_from_alice_to_bob();
        let b = hello_from_alice_to_bob();
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a.ciphertext(), b.ciphertext());
    }

    #[test]
    fn test_wire_round_trip() {
        let env = hello_from_alice_to_bob();
        let text = env.encode().unwrap();
        let parsed: Envelope = text.parse().unwrap();
        assert_eq!(parsed, env);
        assert_eq!(
            open(&bob().private, &parsed, Role::Recipient).unwrap().as_slice(),
            b"hello"
        );
    }

    #[test]
    fn test_wire_uses_stored_field_names() {
        let text = hello_from_alice_to_bob().encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["ciphertext", "iv", "keyForRecipient", "keyForSender"]);
        assert!(object.values().all(|v| v.is_string()));
    }

    #[test]
    fn test_parse_rejects_wrong_shapes() {
        let good: serde_json::Value =
            serde_json::from_str(&hello_from_alice_to_bob().encode().unwrap()).unwrap();

        let mut missing = good.clone();
        missing.as_object_mut().unwrap().remove("keyForSender");

        let mut extra = good.clone();
        extra
            .as_object_mut()
            .unwrap()
            .insert("sender".into(), serde_json::Value::String("alice".into()));

        let mut non_string = good.clone();
        non_string.as_object_mut().unwrap()["iv"] = serde_json::json!(12);

        let mut bad_base64 = good.clone();
        bad_base64.as_object_mut().unwrap()["ciphertext"] = serde_json::json!("@@@");

        let mut short_nonce = good.clone();
        short_nonce.as_object_mut().unwrap()["iv"] =
            serde_json::json!(STANDARD.encode([0u8; 8]));

        let mut empty_slot = good.clone();
        empty_slot.as_object_mut().unwrap()["keyForRecipient"] = serde_json::json!("");

        for bad in [missing, extra, non_string, bad_base64, short_nonce, empty_slot] {
            let text = bad.to_string();
            assert!(
                matches!(Envelope::parse(&text), Err(CryptoError::MalformedEnvelope(_))),
                "accepted {text}"
            );
        }

        for text in ["hello", "", "[]", "{}", "null", "{\"ciphertext\":\"\"}"] {
            assert!(matches!(
                Envelope::parse(text),
                Err(CryptoError::MalformedEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_role_from_flag() {
        assert_eq!(Role::from_is_sender(true), Role::Sender);
        assert_eq!(Role::from_is_sender(false), Role::Recipient);
    }

    #[test]
    fn test_compose_and_open_from_many_threads() {
        std::thread::scope(|scope| {
            for i in 0..8u8 {
                scope.spawn(move || {
                    let body = vec![i; 64 + usize::from(i)];
                    let env = compose(&alice().public, &bob().public, &body).unwrap();
                    assert_eq!(
                        open(&bob().private, &env, Role::Recipient).unwrap().as_slice(),
                        body.as_slice()
                    );
                    assert_eq!(
                        open(&alice().private, &env, Role::Sender).unwrap().as_slice(),
                        body.as_slice()
                    );
                });
            }
        });
    }
}
