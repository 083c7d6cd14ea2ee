//! Archive error types

use crate::entry::Platform;
use lpk_crypto::CryptoError;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse error classification
///
/// Every [`ArchiveError`] belongs to exactly one kind. The kinds mirror the
/// numeric error space of existing LPK readers, see [`ErrorKind::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Opening the archive file failed
    Open,
    /// Closing or flushing the archive file failed
    Close,
    /// Seeking inside the archive failed
    Seek,
    /// Reading from the archive failed or returned short
    Read,
    /// Writing to the archive failed, or the archive is read-only
    Write,
    /// An in-memory table could not be allocated
    Alloc,
    /// Bad magic, header or table contents
    Format,
    /// Buffer or length invariant violated
    Size,
    /// No matching entry
    Exist,
    /// Missing or wrong key, or malformed ciphertext
    Decrypt,
    /// Decompression failure or size mismatch
    Unpack,
}

impl ErrorKind {
    /// Numeric error code used by other LPK implementations
    pub const fn code(self) -> i32 {
        match self {
            Self::Open => -1,
            Self::Close => -2,
            Self::Seek => -3,
            Self::Read => -4,
            Self::Write => -5,
            Self::Alloc => -6,
            Self::Format => -7,
            Self::Size => -9,
            Self::Exist => -10,
            Self::Decrypt => -11,
            Self::Unpack => -12,
        }
    }
}

/// LPK archive error type
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive file could not be opened
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// Archive path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Flushing the archive on close failed
    #[error("failed to close archive: {0}")]
    Close(#[source] std::io::Error),

    /// Seek failed
    #[error("seek to offset {offset} failed: {source}")]
    Seek {
        /// Target byte offset
        offset: u64,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Read failed or was short
    #[error("read of {len} bytes at offset {offset} failed: {source}")]
    Read {
        /// Byte offset of the read
        offset: u64,
        /// Requested length
        len: usize,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Write failed
    #[error("write of {len} bytes at offset {offset} failed: {source}")]
    Write {
        /// Byte offset of the write
        offset: u64,
        /// Length of the write
        len: usize,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Modification attempted on a read-only handle
    #[error("archive is opened read-only")]
    ReadOnly,

    /// Table allocation failed
    #[error("cannot allocate hash table with {count} entries")]
    Alloc {
        /// Requested slot count
        count: u32,
    },

    /// Payload buffer allocation failed
    #[error("cannot allocate a {len}-byte payload buffer")]
    OutOfMemory {
        /// Requested byte count
        len: u64,
    },

    /// Invalid LPK magic
    #[error("invalid LPK magic: expected 0x1A4B504C, got 0x{0:08X}")]
    InvalidMagic(u32),

    /// Invalid header field
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Invalid hash entry
    #[error("invalid entry in slot {slot}: {reason}")]
    InvalidEntry {
        /// Slot index
        slot: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// Length invariant violated
    #[error("size error: {0}")]
    Size(String),

    /// No active entry matches the query
    #[error("file not found: {name} (locale {locale}, platform {platform})")]
    NotFound {
        /// Requested path
        name: String,
        /// Requested locale
        locale: u16,
        /// Requested platform
        platform: Platform,
    },

    /// Cipher failure
    #[error("decryption failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Unknown encryption algorithm code in entry flags
    #[error("unknown encryption algorithm code {0}")]
    UnknownEncryption(u8),

    /// Unknown compression algorithm code in entry flags
    #[error("unknown compression algorithm code {0}")]
    UnknownCompression(u8),

    /// Decompression failed
    #[error("decompression failed: {0}")]
    Unpack(String),

    /// CRC trailer does not match the unpacked contents
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored CRC-32
        expected: u32,
        /// CRC-32 of the extracted data
        actual: u32,
    },
}

impl ArchiveError {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::Open,
            Self::Close(_) => ErrorKind::Close,
            Self::Seek { .. } => ErrorKind::Seek,
            Self::Read { .. } => ErrorKind::Read,
            Self::Write { .. } | Self::ReadOnly => ErrorKind::Write,
            Self::Alloc { .. } | Self::OutOfMemory { .. } => ErrorKind::Alloc,
            Self::InvalidMagic(_)
            | Self::InvalidHeader(_)
            | Self::InvalidEntry { .. }
            | Self::BinRw(_) => ErrorKind::Format,
            Self::Size(_) => ErrorKind::Size,
            Self::NotFound { .. } => ErrorKind::Exist,
            Self::Crypto(_) | Self::UnknownEncryption(_) => ErrorKind::Decrypt,
            Self::UnknownCompression(_) | Self::Unpack(_) | Self::ChecksumMismatch { .. } => {
                ErrorKind::Unpack
            }
        }
    }

    /// Numeric error code, see [`ErrorKind::code`]
    pub const fn code(&self) -> i32 {
        self.kind().code()
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(ArchiveError::InvalidMagic(0).code(), -7);
        assert_eq!(ArchiveError::ReadOnly.kind(), ErrorKind::Write);
        assert_eq!(
            ArchiveError::Crypto(CryptoError::MissingKey).kind(),
            ErrorKind::Decrypt
        );
        assert_eq!(
            ArchiveError::NotFound {
                name: "a".into(),
                locale: 0,
                platform: Platform::Ios,
            }
            .code(),
            -10
        );
        assert_eq!(ErrorKind::Size.code(), -9);
    }

    #[test]
    fn test_display() {
        let err = ArchiveError::ChecksumMismatch {
            expected: 0xDEAD_BEEF,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected deadbeef, got 00000001"
        );
    }
}
