//! Shared identities for tests. RSA generation is slow, so each one is made
//! once per test binary.

use std::sync::OnceLock;

use crate::asymmetric::MIN_GENERATED_MODULUS_BITS;
use crate::identity::IdentityKeyPair;

fn fixture(cell: &'static OnceLock<IdentityKeyPair>) -> &'static IdentityKeyPair {
    cell.get_or_init(|| {
        IdentityKeyPair::generate_with_bits(MIN_GENERATED_MODULUS_BITS)
            .expect("test identity generation")
    })
}

pub fn alice() -> &'static IdentityKeyPair {
    static CELL: OnceLock<IdentityKeyPair> = OnceLock::new();
    fixture(&CELL)
}

pub fn bob() -> &'static IdentityKeyPair {
    static CELL: OnceLock<IdentityKeyPair> = OnceLock::new();
    fixture(&CELL)
}

pub fn carol() -> &'static IdentityKeyPair {
    static CELL: OnceLock<IdentityKeyPair> = OnceLock::new();
    fixture(&CELL)
}
