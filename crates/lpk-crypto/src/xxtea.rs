//! Corrected Block TEA (XXTEA) over the whole payload
//!
//! XXTEA treats the payload as a single variable-length block of 32-bit
//! words, so it needs at least two words and a length that is a multiple
//! of four bytes.

use crate::cipher::{PayloadCipher, derive_key128, load_words, store_words};
use crate::error::CryptoError;
use crate::tea::DELTA;

/// XXTEA block cipher
#[derive(Debug, Clone, Copy, Default)]
pub struct XxteaCipher;

#[inline]
fn mx(sum: u32, y: u32, z: u32, p: usize, e: usize, k: &[u32; 4]) -> u32 {
    (((z >> 5) ^ (y << 2)).wrapping_add((y >> 3) ^ (z << 4)))
        ^ ((sum ^ y).wrapping_add(k[(p & 3) ^ e] ^ z))
}

fn rounds(n: usize) -> u32 {
    // n >= 2 is guaranteed by the length check
    6 + 52 / u32::try_from(n).unwrap_or(u32::MAX)
}

fn encrypt_words(v: &mut [u32], k: &[u32; 4]) {
    let n = v.len();
    let mut sum = 0u32;
    let mut z = v[n - 1];

    for _ in 0..rounds(n) {
        sum = sum.wrapping_add(DELTA);
        let e = ((sum >> 2) & 3) as usize;
        for p in 0..n - 1 {
            let y = v[p + 1];
            v[p] = v[p].wrapping_add(mx(sum, y, z, p, e, k));
            z = v[p];
        }
        let y = v[0];
        v[n - 1] = v[n - 1].wrapping_add(mx(sum, y, z, n - 1, e, k));
        z = v[n - 1];
    }
}

fn decrypt_words(v: &mut [u32], k: &[u32; 4]) {
    let n = v.len();
    let rounds = rounds(n);
    let mut sum = DELTA.wrapping_mul(rounds);
    let mut y = v[0];

    for _ in 0..rounds {
        let e = ((sum >> 2) & 3) as usize;
        for p in (1..n).rev() {
            let z = v[p - 1];
            v[p] = v[p].wrapping_sub(mx(sum, y, z, p, e, k));
            y = v[p];
        }
        let z = v[n - 1];
        v[0] = v[0].wrapping_sub(mx(sum, y, z, 0, e, k));
        y = v[0];
        sum = sum.wrapping_sub(DELTA);
    }
}

impl XxteaCipher {
    fn transform(
        &self,
        data: &mut [u8],
        key: &[u8],
        salt: u32,
        op: fn(&mut [u32], &[u32; 4]),
    ) -> Result<(), CryptoError> {
        let k = derive_key128(key, salt)?;
        self.check_len(data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let mut words = load_words(data);
        op(&mut words, &k);
        store_words(&words, data);
        Ok(())
    }
}

impl PayloadCipher for XxteaCipher {
    fn name(&self) -> &'static str {
        "XXTEA"
    }

    fn granularity(&self) -> usize {
        4
    }

    fn minimum_len(&self) -> usize {
        8
    }

    fn encrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        self.transform(data, key, salt, encrypt_words)
    }

    fn decrypt(&self, data: &mut [u8], key: &[u8], salt: u32) -> Result<(), CryptoError> {
        self.transform(data, key, salt, decrypt_words)
    }
}
