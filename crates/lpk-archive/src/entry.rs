//! Hash entry records and their flag bits

use crate::error::ArchiveResult;
use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinWrite};
use lpk_crypto::NameHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire value for "no slot" in chain links and the deleted list head
pub const INDEX_INVALID: u32 = 0xFFFF_FFFF;

/// Size of the fixed part of a hash entry
pub const ENTRY_CORE_SIZE: usize = 40;

/// Size of the stored debug file name
pub const DEBUG_NAME_SIZE: usize = 128;

/// On-disk size of one hash entry
pub const ENTRY_SIZE: usize = if cfg!(feature = "debug-names") {
    ENTRY_CORE_SIZE + DEBUG_NAME_SIZE
} else {
    ENTRY_CORE_SIZE
};

/// Entry flag bits
pub mod flags {
    /// Slot holds (or held) an entry
    pub const USED: u32 = 0x8000_0000;
    /// Entry is deleted (tombstone)
    pub const DELETED: u32 = 0x4000_0000;
    /// A CRC-32 of the unpacked data follows the packed payload
    pub const HAS_CRC: u32 = 0x2000_0000;
    /// Payload is encrypted
    pub const ENCRYPTED: u32 = 0x0000_8000;
    /// Payload is compressed
    pub const COMPRESSED: u32 = 0x0000_0080;

    /// Compression algorithm sub-field
    pub const COMPRESSION_MASK: u32 = 0x0000_007F;
    /// Compression algorithm shift
    pub const COMPRESSION_SHIFT: u32 = 0;
    /// Encryption algorithm sub-field
    pub const ENCRYPTION_MASK: u32 = 0x0000_7F00;
    /// Encryption algorithm shift
    pub const ENCRYPTION_SHIFT: u32 = 8;
}

pub(crate) fn decode_link(raw: u32) -> Option<u32> {
    (raw != INDEX_INVALID).then_some(raw)
}

pub(crate) fn encode_link(link: Option<u32>) -> u32 {
    link.unwrap_or(INDEX_INVALID)
}

/// Target platform of an entry variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Platform-neutral
    #[default]
    Default,
    /// iOS
    Ios,
    /// Android
    Android,
    /// Any other platform code, preserved as-is
    Other(u16),
}

impl From<u16> for Platform {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::Default,
            1 => Self::Ios,
            2 => Self::Android,
            other => Self::Other(other),
        }
    }
}

impl From<Platform> for u16 {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Default => 0,
            Platform::Ios => 1,
            Platform::Android => 2,
            Platform::Other(code) => code,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Ios => f.write_str("ios"),
            Self::Android => f.write_str("android"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            other => other
                .parse::<u16>()
                .map(Self::from)
                .map_err(|_| format!("unknown platform: {s}")),
        }
    }
}

/// State of a hash table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used; terminates a probe
    Empty,
    /// Holds a live entry
    Active,
    /// Deleted entry kept so probes continue past it
    Tombstone,
}

/// One slot of the hash table
#[derive(Debug, Clone, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct HashEntry {
    /// Table-index hash
    pub hash_i: u32,
    /// Verifier A
    pub hash_a: u32,
    /// Verifier B
    pub hash_b: u32,
    /// Locale (Windows LCID, 0 = neutral)
    pub locale: u16,
    /// Platform
    #[br(map = |code: u16| Platform::from(code))]
    #[bw(map = |p: &Platform| u16::from(*p))]
    pub platform: Platform,
    /// Payload offset in blocks
    pub offset: u32,
    /// Stored payload size (after compression, padding and encryption)
    pub packed_size: u32,
    /// Unpacked file size
    pub file_size: u32,
    /// Flag bits, see [`flags`]
    pub flags: u32,
    /// Next variant of the same name, or next deleted slot for tombstones
    #[br(map = decode_link)]
    #[bw(map = |l: &Option<u32>| encode_link(*l))]
    pub next: Option<u32>,
    /// Previous variant of the same name
    #[br(map = decode_link)]
    #[bw(map = |l: &Option<u32>| encode_link(*l))]
    pub prev: Option<u32>,
    /// Original path, when the archive retains debug names
    #[brw(ignore)]
    pub name: Option<String>,
}

impl HashEntry {
    /// Create an active entry for `path`
    pub fn new(path: &str, locale: u16, platform: Platform) -> Self {
        let hash = NameHash::of(path);
        Self {
            hash_i: hash.slot,
            hash_a: hash.a,
            hash_b: hash.b,
            locale,
            platform,
            flags: flags::USED,
            name: Some(path.to_string()),
            ..Self::default()
        }
    }

    /// Create an active entry from a precomputed hash triple
    pub fn from_hash(hash: NameHash, locale: u16, platform: Platform) -> Self {
        Self {
            hash_i: hash.slot,
            hash_a: hash.a,
            hash_b: hash.b,
            locale,
            platform,
            flags: flags::USED,
            ..Self::default()
        }
    }

    /// Hash triple of this entry
    pub const fn name_hash(&self) -> NameHash {
        NameHash::from_parts(self.hash_i, self.hash_a, self.hash_b)
    }

    /// Slot state derived from the flags
    pub const fn state(&self) -> SlotState {
        if self.flags & flags::DELETED != 0 {
            SlotState::Tombstone
        } else if self.flags & flags::USED != 0 {
            SlotState::Active
        } else {
            SlotState::Empty
        }
    }

    /// USED set and DELETED clear
    pub const fn is_active(&self) -> bool {
        matches!(self.state(), SlotState::Active)
    }

    /// DELETED set
    pub const fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    /// Slot was ever used (active or tombstone)
    pub const fn is_occupied(&self) -> bool {
        !matches!(self.state(), SlotState::Empty)
    }

    /// COMPRESSED set
    pub const fn is_compressed(&self) -> bool {
        self.flags & flags::COMPRESSED != 0
    }

    /// ENCRYPTED set
    pub const fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// HAS_CRC set
    pub const fn has_crc(&self) -> bool {
        self.flags & flags::HAS_CRC != 0
    }

    /// Raw compression algorithm code
    pub const fn compression_code(&self) -> u8 {
        ((self.flags & flags::COMPRESSION_MASK) >> flags::COMPRESSION_SHIFT) as u8
    }

    /// Raw encryption algorithm code
    pub const fn encryption_code(&self) -> u8 {
        ((self.flags & flags::ENCRYPTION_MASK) >> flags::ENCRYPTION_SHIFT) as u8
    }

    /// Mark compressed with the given algorithm code
    pub fn set_compression(&mut self, code: u8) {
        self.flags &= !flags::COMPRESSION_MASK;
        self.flags |=
            flags::COMPRESSED | ((u32::from(code) << flags::COMPRESSION_SHIFT) & flags::COMPRESSION_MASK);
    }

    /// Mark encrypted with the given algorithm code
    pub fn set_encryption(&mut self, code: u8) {
        self.flags &= !flags::ENCRYPTION_MASK;
        self.flags |=
            flags::ENCRYPTED | ((u32::from(code) << flags::ENCRYPTION_SHIFT) & flags::ENCRYPTION_MASK);
    }

    /// Matches the requested variant discriminators
    pub fn matches_variant(&self, locale: u16, platform: Platform) -> bool {
        self.locale == locale && self.platform == platform
    }

    /// Bytes occupied on disk by the payload, including a CRC trailer
    pub fn stored_len(&self) -> u64 {
        u64::from(self.packed_size) + if self.has_crc() { 4 } else { 0 }
    }

    /// Read one on-disk record
    pub fn read_record<R: Read + Seek>(reader: &mut R) -> ArchiveResult<Self> {
        #[allow(unused_mut)]
        let mut entry = Self::read(reader)?;

        #[cfg(feature = "debug-names")]
        {
            let mut raw = [0u8; DEBUG_NAME_SIZE];
            reader
                .read_exact(&mut raw)
                .map_err(|e| crate::error::ArchiveError::BinRw(binrw::Error::Io(e)))?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(DEBUG_NAME_SIZE);
            entry.name = (end > 0).then(|| String::from_utf8_lossy(&raw[..end]).into_owned());
        }

        Ok(entry)
    }

    /// Write one on-disk record
    pub fn write_record<W: Write + Seek>(&self, writer: &mut W) -> ArchiveResult<()> {
        self.write(writer)?;

        #[cfg(feature = "debug-names")]
        {
            let mut raw = [0u8; DEBUG_NAME_SIZE];
            if let Some(name) = &self.name {
                // keep a terminating NUL
                let len = name.len().min(DEBUG_NAME_SIZE - 1);
                raw[..len].copy_from_slice(&name.as_bytes()[..len]);
            }
            writer
                .write_all(&raw)
                .map_err(|e| crate::error::ArchiveError::BinRw(binrw::Error::Io(e)))?;
        }

        Ok(())
    }
}
