#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Property tests for the payload ciphers

use lpk_crypto::{CryptoError, PayloadCipher, TeaCipher, XorCipher, XxteaCipher};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn ciphers() -> [&'static dyn PayloadCipher; 3] {
    [&XorCipher, &TeaCipher, &XxteaCipher]
}

#[test]
fn tea_zero_key_matches_reference_bytes() {
    let mut data = vec![0u8; 8];
    TeaCipher
        .encrypt(&mut data, &[0u8; 16], 0)
        .expect("encrypt should succeed");
    assert_eq!(hex::encode(&data), "0a3aea4140a9ba94");
}

#[test]
fn every_cipher_requires_a_key() {
    for cipher in ciphers() {
        let mut data = vec![0u8; 16];
        assert_eq!(
            cipher.decrypt(&mut data, &[], 1),
            Err(CryptoError::MissingKey),
            "{}",
            cipher.name()
        );
    }
}

proptest! {
    #[test]
    fn padded_round_trip(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        key in prop::collection::vec(any::<u8>(), 1..32),
        salt in any::<u32>(),
    ) {
        for cipher in ciphers() {
            let mut data = plaintext.clone();
            data.resize(cipher.padded_len(plaintext.len()), 0);

            cipher.encrypt(&mut data, &key, salt).map_err(|e| TestCaseError::fail(e.to_string()))?;
            cipher.decrypt(&mut data, &key, salt).map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(&data[..plaintext.len()], &plaintext[..]);
            prop_assert!(data[plaintext.len()..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn padded_len_is_accepted(len in 0usize..4096) {
        for cipher in ciphers() {
            let padded = cipher.padded_len(len);
            prop_assert!(padded >= len);
            prop_assert!(cipher.check_len(padded).is_ok());
        }
    }
}
