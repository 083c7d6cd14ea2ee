//! Repeating-key XOR stream transform
//!
//! The weakest of the payload ciphers. It exists for assets that only need
//! to be unreadable to casual inspection and must not change length.

use crate::cipher::PayloadCipher;
use crate::error::CryptoError;

/// XOR cipher over the caller key and the entry salt
#[derive(Debug, Clone, Copy, Default)]
pub struct XorCipher;

impl XorCipher {
    fn apply(data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::MissingKey);
        }

        let salt = salt.to_le_bytes();
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= key[i % key.len()] ^ salt[i % 4];
        }
        Ok(())
    }
}

impl PayloadCipher for XorCipher {
    fn name(&self) -> &'static str {
        "XOR"
    }

    fn granularity(&self) -> usize {
        1
    }

    fn encrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        Self::apply(data, key, salt)
    }

    fn decrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        Self::apply(data, key, salt)
    }
}
