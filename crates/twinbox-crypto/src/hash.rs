use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Key fingerprint: sha256 over the DER SubjectPublicKeyInfo.
pub fn key_fingerprint(spki_der: &[u8]) -> [u8; 32] {
    sha256(spki_der)
}
