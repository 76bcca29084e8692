//! Constant-time helpers for comparing key material.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices without leaking where they first differ.
///
/// Used when checking that a persisted public key still matches the public
/// half derived from its private key.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}
