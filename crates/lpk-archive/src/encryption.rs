//! Payload encryption dispatch
//!
//! Maps the encryption code stored in an entry's flags onto one of the
//! ciphers from `lpk-crypto` and derives the per-entry salt.

use crate::entry::HashEntry;
use crate::error::{ArchiveError, ArchiveResult};
use lpk_crypto::{CryptoError, PayloadCipher, TeaCipher, XorCipher, XxteaCipher};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encryption algorithm stored in bits 8..15 of the entry flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EncryptionAlgorithm {
    /// Use the archive's configured default
    Default = 0,
    /// Plaintext
    None = 1,
    /// Repeating-key XOR
    Xor = 2,
    /// TEA, 8-byte blocks
    Tea = 3,
    /// XXTEA (corrected block TEA)
    Xxtea = 4,
}

impl EncryptionAlgorithm {
    /// Parse from the flag code
    pub fn from_code(code: u8) -> ArchiveResult<Self> {
        match code {
            0 => Ok(Self::Default),
            1 => Ok(Self::None),
            2 => Ok(Self::Xor),
            3 => Ok(Self::Tea),
            4 => Ok(Self::Xxtea),
            other => Err(ArchiveError::UnknownEncryption(other)),
        }
    }

    /// Flag code
    pub const fn as_code(self) -> u8 {
        self as u8
    }

    /// Cipher implementing this algorithm, `None` for plaintext
    ///
    /// `Default` must be resolved through the archive configuration first.
    pub fn cipher(self) -> Option<&'static dyn PayloadCipher> {
        match self {
            Self::Default | Self::None => None,
            Self::Xor => Some(&XorCipher),
            Self::Tea => Some(&TeaCipher),
            Self::Xxtea => Some(&XxteaCipher),
        }
    }

    /// Stored length of `len` plaintext bytes under this algorithm
    pub fn padded_len(self, len: usize) -> usize {
        self.cipher().map_or(len, |c| c.padded_len(len))
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::None => "none",
            Self::Xor => "xor",
            Self::Tea => "tea",
            Self::Xxtea => "xxtea",
        };
        f.write_str(name)
    }
}

/// Per-entry salt mixed into the caller key
///
/// Built only from the entry's identity and size. The block offset is left
/// out because patching relocates blocks without re-encrypting them.
pub fn entry_salt(entry: &HashEntry) -> u32 {
    let variant = (u32::from(entry.locale) << 16) | u32::from(u16::from(entry.platform));
    entry.hash_a ^ entry.file_size.rotate_left(16) ^ variant
}

fn require_key(key: Option<&[u8]>) -> ArchiveResult<&[u8]> {
    match key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(ArchiveError::Crypto(CryptoError::MissingKey)),
    }
}

/// Encrypt an already padded payload in place
pub fn encrypt_payload(
    algorithm: EncryptionAlgorithm,
    data: &mut [u8],
    key: Option<&[u8]>,
    salt: u32,
) -> ArchiveResult<()> {
    let Some(cipher) = algorithm.cipher() else {
        return Ok(());
    };
    let key = require_key(key)?;
    cipher.check_len(data.len())?;
    cipher.encrypt(data, key, salt)?;
    Ok(())
}

/// Decrypt a stored payload in place
pub fn decrypt_payload(
    algorithm: EncryptionAlgorithm,
    data: &mut [u8],
    key: Option<&[u8]>,
    salt: u32,
) -> ArchiveResult<()> {
    let Some(cipher) = algorithm.cipher() else {
        return Ok(());
    };
    let key = require_key(key)?;
    cipher.check_len(data.len())?;
    cipher.decrypt(data, key, salt)?;
    Ok(())
}
