//! Configuration for opening archives

use crate::compression::CompressionAlgorithm;
use crate::encryption::EncryptionAlgorithm;
use serde::{Deserialize, Serialize};

/// How the archive file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Lookups and extraction only
    #[default]
    ReadOnly,
    /// Also allows applying patches
    ReadWrite,
}

impl AccessMode {
    /// Check if this mode allows modification.
    pub const fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Configuration for an archive handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// File access mode
    pub access: AccessMode,

    /// Algorithm used for entries flagged with the DEFAULT compression code
    pub default_compression: CompressionAlgorithm,

    /// Algorithm used for entries flagged with the DEFAULT encryption code
    pub default_encryption: EncryptionAlgorithm,

    /// Check CRC trailers on extraction
    pub verify_checksums: bool,

    /// Largest `file_size` accepted by extraction (in bytes)
    pub max_file_size: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            access: AccessMode::ReadOnly,
            default_compression: CompressionAlgorithm::Zlib,
            default_encryption: EncryptionAlgorithm::Xxtea,
            verify_checksums: true,
            max_file_size: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

impl ArchiveConfig {
    /// Read-write configuration with all other settings at their defaults
    pub fn read_write() -> Self {
        Self::default().with_access(AccessMode::ReadWrite)
    }

    /// Set the access mode
    #[must_use]
    pub const fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Set the algorithm behind the DEFAULT compression code
    #[must_use]
    pub const fn with_default_compression(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.default_compression = algorithm;
        self
    }

    /// Set the algorithm behind the DEFAULT encryption code
    #[must_use]
    pub const fn with_default_encryption(mut self, algorithm: EncryptionAlgorithm) -> Self {
        self.default_encryption = algorithm;
        self
    }

    /// Enable or disable CRC verification
    #[must_use]
    pub const fn with_verify_checksums(mut self, enable: bool) -> Self {
        self.verify_checksums = enable;
        self
    }

    /// Set the maximum extracted file size
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Replace a DEFAULT compression code with the configured algorithm
    pub fn resolve_compression(&self, algorithm: CompressionAlgorithm) -> CompressionAlgorithm {
        match (algorithm, self.default_compression) {
            (CompressionAlgorithm::Default, CompressionAlgorithm::Default) => {
                CompressionAlgorithm::Zlib
            }
            (CompressionAlgorithm::Default, configured) => configured,
            (explicit, _) => explicit,
        }
    }

    /// Replace a DEFAULT encryption code with the configured algorithm
    pub fn resolve_encryption(&self, algorithm: EncryptionAlgorithm) -> EncryptionAlgorithm {
        match (algorithm, self.default_encryption) {
            (EncryptionAlgorithm::Default, EncryptionAlgorithm::Default) => {
                EncryptionAlgorithm::Xxtea
            }
            (EncryptionAlgorithm::Default, configured) => configured,
            (explicit, _) => explicit,
        }
    }
}
