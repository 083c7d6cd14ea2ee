//! Tiny Encryption Algorithm (TEA) in ECB mode over 8-byte blocks

use crate::cipher::{PayloadCipher, derive_key128, load_words, store_words};
use crate::error::CryptoError;

/// TEA key schedule constant
pub const DELTA: u32 = 0x9E37_79B9;

const ROUNDS: u32 = 32;

/// TEA block cipher
#[derive(Debug, Clone, Copy, Default)]
pub struct TeaCipher;

fn encrypt_block(v: &mut [u32], k: &[u32; 4]) {
    let (mut v0, mut v1) = (v[0], v[1]);
    let mut sum = 0u32;

    for _ in 0..ROUNDS {
        sum = sum.wrapping_add(DELTA);
        v0 = v0.wrapping_add(
            (v1 << 4).wrapping_add(k[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k[1]),
        );
        v1 = v1.wrapping_add(
            (v0 << 4).wrapping_add(k[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k[3]),
        );
    }

    v[0] = v0;
    v[1] = v1;
}

fn decrypt_block(v: &mut [u32], k: &[u32; 4]) {
    let (mut v0, mut v1) = (v[0], v[1]);
    let mut sum = DELTA.wrapping_mul(ROUNDS);

    for _ in 0..ROUNDS {
        v1 = v1.wrapping_sub(
            (v0 << 4).wrapping_add(k[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k[3]),
        );
        v0 = v0.wrapping_sub(
            (v1 << 4).wrapping_add(k[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k[1]),
        );
        sum = sum.wrapping_sub(DELTA);
    }

    v[0] = v0;
    v[1] = v1;
}

impl TeaCipher {
    fn transform(
        &self,
        data: &mut [u8],
        key: &[u8],
        salt: u32,
        block: fn(&mut [u32], &[u32; 4]),
    ) -> Result<(), CryptoError> {
        let k = derive_key128(key, salt)?;
        self.check_len(data.len())?;

        let mut words = load_words(data);
        for pair in words.chunks_exact_mut(2) {
            block(pair, &k);
        }
        store_words(&words, data);
        Ok(())
    }
}

impl PayloadCipher for TeaCipher {
    fn name(&self) -> &'static str {
        "TEA"
    }

    fn granularity(&self) -> usize {
        8
    }

    fn encrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        self.transform(data, key, salt, encrypt_block)
    }

    fn decrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        self.transform(data, key, salt, decrypt_block)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tea_reference_vector() {
        // Zero key, zero plaintext
        let mut block = [0u32, 0u32];
        encrypt_block(&mut block, &[0; 4]);
        assert_eq!(block, [0x41EA_3A0A, 0x94BA_A940]);

        decrypt_block(&mut block, &[0; 4]);
        assert_eq!(block, [0, 0]);
    }

    #[test]
    fn test_tea_round_trip() {
        let plaintext: Vec<u8> = (0..64).collect();
        let mut data = plaintext.clone();

        TeaCipher.encrypt(&mut data, b"secret", 42).expect("encrypt");
        assert_ne!(data, plaintext);
        TeaCipher.decrypt(&mut data, b"secret", 42).expect("decrypt");
        assert_eq!(data, plaintext);
    }

    #[test]
    fn test_tea_salt_changes_ciphertext() {
        let mut first = vec![7u8; 16];
        let mut second = first.clone();
        TeaCipher.encrypt(&mut first, b"secret", 1).expect("encrypt");
        TeaCipher.encrypt(&mut second, b"secret", 2).expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn test_tea_rejects_partial_block() {
        let mut data = vec![0u8; 12];
        let err = TeaCipher
            .decrypt(&mut data, b"secret", 0)
            .expect_err("12 bytes is not a TEA block multiple");
        assert!(matches!(err, CryptoError::InvalidLength { len: 12, .. }));
    }

    #[test]
    fn test_tea_padding() {
        assert_eq!(TeaCipher.padded_len(0), 0);
        assert_eq!(TeaCipher.padded_len(1), 8);
        assert_eq!(TeaCipher.padded_len(16), 16);
        assert_eq!(TeaCipher.padded_len(17), 24);
    }
}
