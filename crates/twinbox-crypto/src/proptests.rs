#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::envelope::{compose, open, Envelope, Role};
    use crate::error::CryptoError;
    use crate::symmetric::{self, SessionKey, NONCE_LEN};
    use crate::test_keys::{alice, bob, carol};

    proptest! {
        // RSA work per case is a few milliseconds; keep the case count modest.
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_envelope_round_trip_both_roles(plaintext in any::<Vec<u8>>()) {
            let env = compose(&alice().public, &bob().public, &plaintext).unwrap();

            let as_sender = open(&alice().private, &env, Role::Sender).unwrap();
            let as_recipient = open(&bob().private, &env, Role::Recipient).unwrap();
            prop_assert_eq!(as_sender.as_slice(), plaintext.as_slice());
            prop_assert_eq!(as_recipient.as_slice(), plaintext.as_slice());
        }

        #[test]
        fn test_envelope_survives_wire(plaintext in ".*") {
            let env = compose(&alice().public, &bob().public, plaintext.as_bytes()).unwrap();
            let parsed = Envelope::parse(&env.encode().unwrap()).unwrap();
            let opened = open(&bob().private, &parsed, Role::Recipient).unwrap();
            prop_assert_eq!(opened.as_slice(), plaintext.as_bytes());
        }

        #[test]
        fn test_any_ciphertext_bit_flip_fails_closed(
            plaintext in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let env = compose(&alice().public, &bob().public, &plaintext).unwrap();
            let mut ct = env.ciphertext().to_vec();
            let i = index.index(ct.len());
            ct[i] ^= 1 << bit;
            let tampered = Envelope::from_parts(
                ct,
                env.nonce(),
                env.key_for_sender().to_vec(),
                env.key_for_recipient().to_vec(),
            ).unwrap();

            prop_assert_eq!(
                open(&alice().private, &tampered, Role::Sender),
                Err(CryptoError::Authentication)
            );
            prop_assert_eq!(
                open(&bob().private, &tampered, Role::Recipient),
                Err(CryptoError::Authentication)
            );
        }

        #[test]
        fn test_any_nonce_bit_flip_fails_closed(
            index in 0usize..NONCE_LEN,
            bit in 0u8..8,
        ) {
            let env = compose(&alice().public, &bob().public, b"hello").unwrap();
            let mut nonce = *env.nonce();
            nonce[index] ^= 1 << bit;
            let tampered = Envelope::from_parts(
                env.ciphertext().to_vec(),
                &nonce,
                env.key_for_sender().to_vec(),
                env.key_for_recipient().to_vec(),
            ).unwrap();

            prop_assert_eq!(
                open(&alice().private, &tampered, Role::Sender),
                Err(CryptoError::Authentication)
            );
            prop_assert_eq!(
                open(&bob().private, &tampered, Role::Recipient),
                Err(CryptoError::Authentication)
            );
        }

        #[test]
        fn test_third_party_never_gets_plaintext(plaintext in any::<Vec<u8>>(), as_sender in any::<bool>()) {
            let env = compose(&alice().public, &bob().public, &plaintext).unwrap();
            prop_assert_eq!(
                open(&carol().private, &env, Role::from_is_sender(as_sender)),
                Err(CryptoError::Unwrap)
            );
        }

        #[test]
        fn test_parse_never_panics(text in ".*") {
            let _ = Envelope::parse(&text);
        }

        #[test]
        fn test_symmetric_round_trip(plaintext in any::<Vec<u8>>()) {
            let key = SessionKey::generate();
            let nonce = symmetric::generate_nonce();
            let ct = symmetric::encrypt(&key, &nonce, &plaintext).unwrap();
            let pt = symmetric::decrypt(&key, &nonce, &ct).unwrap();
            prop_assert_eq!(pt.as_slice(), plaintext.as_slice());
        }
    }
}
