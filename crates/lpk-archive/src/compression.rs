//! Payload compression

use crate::error::{ArchiveError, ArchiveResult};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

/// Compression algorithm stored in the low bits of the entry flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionAlgorithm {
    /// Use the archive's configured default
    Default = 0,
    /// Stored as-is
    None = 1,
    /// zlib stream
    Zlib = 2,
}

impl CompressionAlgorithm {
    /// Parse from the flag code
    pub fn from_code(code: u8) -> ArchiveResult<Self> {
        match code {
            0 => Ok(Self::Default),
            1 => Ok(Self::None),
            2 => Ok(Self::Zlib),
            other => Err(ArchiveError::UnknownCompression(other)),
        }
    }

    /// Flag code
    pub const fn as_code(self) -> u8 {
        self as u8
    }

    /// Codec implementing this algorithm
    ///
    /// `Default` must be resolved before calling this; it maps to the stored
    /// codec here.
    pub fn codec(self) -> &'static dyn Codec {
        match self {
            Self::Zlib => &ZlibCodec,
            Self::Default | Self::None => &StoredCodec,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::None => f.write_str("none"),
            Self::Zlib => f.write_str("zlib"),
        }
    }
}

/// A payload codec
pub trait Codec: Send + Sync {
    /// Compress `data`
    fn compress(&self, data: &[u8]) -> ArchiveResult<Vec<u8>>;

    /// Decompress `data` into exactly `expected` bytes
    ///
    /// Bytes after the end of the compressed stream are ignored so cipher
    /// padding does not need to be stripped first.
    fn decompress(&self, data: &[u8], expected: usize) -> ArchiveResult<Vec<u8>>;
}

/// Identity codec
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredCodec;

impl Codec for StoredCodec {
    fn compress(&self, data: &[u8]) -> ArchiveResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected: usize) -> ArchiveResult<Vec<u8>> {
        if data.len() < expected {
            return Err(ArchiveError::Unpack(format!(
                "stored payload holds {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(data[..expected].to_vec())
    }
}

/// zlib codec backed by flate2
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn compress(&self, data: &[u8]) -> ArchiveResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(data, Compression::default());
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| ArchiveError::Unpack(format!("zlib compression failed: {e}")))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected: usize) -> ArchiveResult<Vec<u8>> {
        let mut decompressed = Vec::new();
        decompressed
            .try_reserve_exact(expected)
            .map_err(|_| ArchiveError::Unpack(format!("cannot reserve {expected} bytes")))?;

        // one extra byte so an overlong stream is detected without inflating it all
        let limit = expected as u64 + 1;
        ZlibDecoder::new(data)
            .take(limit)
            .read_to_end(&mut decompressed)
            .map_err(|e| ArchiveError::Unpack(format!("zlib decompression failed: {e}")))?;

        if decompressed.len() != expected {
            return Err(ArchiveError::Unpack(format!(
                "zlib stream inflated to {}{} bytes, expected {expected}",
                if decompressed.len() > expected { "more than " } else { "" },
                decompressed.len().min(expected)
            )));
        }

        Ok(decompressed)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_codes() {
        assert_eq!(CompressionAlgorithm::from_code(2).unwrap(), CompressionAlgorithm::Zlib);
        assert_eq!(CompressionAlgorithm::None.as_code(), 1);
        assert!(matches!(
            CompressionAlgorithm::from_code(9),
            Err(ArchiveError::UnknownCompression(9))
        ));
    }

    #[test]
    fn test_zlib_round_trip_with_padding() {
        let data = b"abcabcabcabcabcabcabcabcabcabc".repeat(20);
        let mut packed = ZlibCodec.compress(&data).expect("compress should succeed");
        packed.extend_from_slice(&[0u8; 7]);

        let unpacked = ZlibCodec
            .decompress(&packed, data.len())
            .expect("decompress should succeed");
        assert_eq!(unpacked, data);
    }

    #[test]
    fn test_zlib_length_mismatch() {
        let data = vec![7u8; 64];
        let packed = ZlibCodec.compress(&data).expect("compress should succeed");

        assert!(matches!(
            ZlibCodec.decompress(&packed, 63),
            Err(ArchiveError::Unpack(_))
        ));
        assert!(matches!(
            ZlibCodec.decompress(&packed, 65),
            Err(ArchiveError::Unpack(_))
        ));
    }

    #[test]
    fn test_zlib_rejects_garbage() {
        let err = ZlibCodec
            .decompress(&[0xDE, 0xAD, 0xBE, 0xEF], 16)
            .expect_err("garbage should not inflate");
        assert_eq!(err.kind(), crate::ErrorKind::Unpack);
    }

    #[test]
    fn test_stored_truncates_padding() {
        let out = StoredCodec
            .decompress(b"hello\0\0\0", 5)
            .expect("stored payload should be long enough");
        assert_eq!(out, b"hello");
        assert!(StoredCodec.decompress(b"hi", 5).is_err());
    }
}
