#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod utils;

pub mod asymmetric;
pub mod symmetric;
pub mod identity;

pub mod envelope;

pub use asymmetric::{PrivateKey, PublicKey};
pub use envelope::{Envelope, Role};
pub use error::CryptoError;
pub use identity::IdentityKeyPair;
pub use symmetric::SessionKey;

#[cfg(test)]
pub(crate) mod test_keys;

#[cfg(test)]
mod proptests;
