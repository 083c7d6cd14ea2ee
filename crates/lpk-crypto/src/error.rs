//! Error types for cryptographic operations

use thiserror::Error;

/// Errors that can occur during payload encryption or decryption
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The entry is encrypted but no key was supplied
    #[error("encryption key is missing or empty")]
    MissingKey,

    /// Payload length does not fit the cipher's block granularity
    #[error("invalid {cipher} payload length {len}: must be a multiple of {granularity} bytes (minimum {minimum})")]
    InvalidLength {
        /// Cipher name
        cipher: &'static str,
        /// Actual payload length in bytes
        len: usize,
        /// Required block granularity in bytes
        granularity: usize,
        /// Smallest non-empty payload the cipher accepts
        minimum: usize,
    },
}
