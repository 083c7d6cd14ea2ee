//! Common interface for payload ciphers
//!
//! Every cipher works in place on the packed payload of a single entry. The
//! caller-supplied key is combined with a per-entry salt so that identical
//! content stored under two different entries produces different ciphertext.

use crate::error::CryptoError;

/// Symmetric transform applied to an entry payload
pub trait PayloadCipher {
    /// Short cipher name used in diagnostics
    fn name(&self) -> &'static str;

    /// Block granularity in bytes (1 for stream ciphers)
    fn granularity(&self) -> usize;

    /// Smallest non-empty payload the cipher can process
    fn minimum_len(&self) -> usize {
        self.granularity()
    }

    /// Length of `len` plaintext bytes once padded for this cipher
    ///
    /// Empty payloads are never padded.
    fn padded_len(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        len.next_multiple_of(self.granularity())
            .max(self.minimum_len())
    }

    /// Reject payloads whose length the cipher cannot have produced
    fn check_len(&self, len: usize) -> Result<(), CryptoError> {
        if len == 0 || (len % self.granularity() == 0 && len >= self.minimum_len()) {
            Ok(())
        } else {
            Err(CryptoError::InvalidLength {
                cipher: self.name(),
                len,
                granularity: self.granularity(),
                minimum: self.minimum_len(),
            })
        }
    }

    /// Encrypt `data` in place
    fn encrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError>;

    /// Decrypt `data` in place
    fn decrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError>;
}

/// Expand a caller key into the salted 128-bit key used by the TEA family
///
/// Short keys are zero-padded, long keys truncated to 16 bytes.
pub fn derive_key128(key: &[u8], salt: u32) -> Result<[u32; 4], CryptoError> {
    if key.is_empty() {
        return Err(CryptoError::MissingKey);
    }

    let mut bytes = [0u8; 16];
    let len = key.len().min(16);
    bytes[..len].copy_from_slice(&key[..len]);

    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ salt;
    }
    Ok(words)
}

/// Load little-endian words from a byte slice whose length is a multiple of 4
pub(crate) fn load_words(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Store words back into the byte slice they were loaded from
pub(crate) fn store_words(words: &[u32], data: &mut [u8]) {
    for (chunk, word) in data.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_pads_and_salts() {
        let words = derive_key128(b"ab", 0).expect("key should derive");
        assert_eq!(words, [0x0000_6261, 0, 0, 0]);

        let salted = derive_key128(b"ab", 0x1111_1111).expect("key should derive");
        assert_eq!(salted, [0x1111_7370, 0x1111_1111, 0x1111_1111, 0x1111_1111]);
    }

    #[test]
    fn test_derive_key_truncates() {
        let long = [0xAAu8; 32];
        let words = derive_key128(&long, 0).expect("key should derive");
        assert_eq!(words, [0xAAAA_AAAA; 4]);
    }

    #[test]
    fn test_derive_key_rejects_empty() {
        assert_eq!(derive_key128(&[], 7), Err(CryptoError::MissingKey));
    }

    #[test]
    fn test_word_round_trip() {
        let mut data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let words = load_words(&data);
        assert_eq!(words, vec![0x0403_0201, 0x0807_0605]);
        store_words(&[0xDEAD_BEEF, 0], &mut data);
        assert_eq!(data, [0xEF, 0xBE, 0xAD, 0xDE, 0, 0, 0, 0]);
    }
}
