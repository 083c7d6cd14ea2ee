//! LPK archive header

use crate::entry::{ENTRY_SIZE, decode_link, encode_link};
use crate::error::{ArchiveError, ArchiveResult};
use binrw::{BinRead, BinWrite};

/// `"LPK\x1A"` read as a little-endian u32
pub const LPK_MAGIC: u32 = 0x1A4B_504C;

/// Serialized header size for format version 0
pub const HEADER_SIZE: usize = 28;

/// Current format version
pub const FORMAT_VERSION: u16 = 0;

/// Largest accepted block size code (16 MiB blocks)
pub const MAX_BLOCK_SIZE_CODE: u16 = 15;

/// Archive header (28 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ArchiveHeader {
    /// Format signature, [`LPK_MAGIC`]
    pub magic: u32,

    /// Header size in bytes
    pub header_size: u32,

    /// Total archive size in bytes
    pub archive_size: u32,

    /// Format revision
    pub version: u16,

    /// Block size code; a block is `512 << block_size` bytes
    pub block_size: u16,

    /// Byte offset of the hash table
    pub hash_table_offset: u32,

    /// Number of hash table slots (power of two)
    pub hash_table_count: u32,

    /// First slot of the deleted-entry list
    #[br(map = decode_link)]
    #[bw(map = |l: &Option<u32>| encode_link(*l))]
    pub deleted_hash: Option<u32>,
}

impl ArchiveHeader {
    /// Create a header for an archive whose table holds `hash_table_count` slots
    pub fn new(block_size: u16, hash_table_count: u32) -> Self {
        Self {
            magic: LPK_MAGIC,
            header_size: HEADER_SIZE as u32,
            archive_size: HEADER_SIZE as u32,
            version: FORMAT_VERSION,
            block_size,
            hash_table_offset: HEADER_SIZE as u32,
            hash_table_count,
            deleted_hash: None,
        }
    }

    /// Block size in bytes
    pub fn block_bytes(&self) -> u64 {
        512u64 << self.block_size.min(MAX_BLOCK_SIZE_CODE)
    }

    /// On-disk size of the hash table in bytes
    pub fn hash_table_bytes(&self) -> u64 {
        u64::from(self.hash_table_count) * ENTRY_SIZE as u64
    }

    /// Validate header fields against each other
    pub fn validate(&self) -> ArchiveResult<()> {
        if self.magic != LPK_MAGIC {
            return Err(ArchiveError::InvalidMagic(self.magic));
        }

        if (self.header_size as usize) < HEADER_SIZE {
            return Err(ArchiveError::InvalidHeader(format!(
                "header size {} is smaller than {HEADER_SIZE}",
                self.header_size
            )));
        }

        if self.header_size > self.archive_size {
            return Err(ArchiveError::InvalidHeader(format!(
                "header size {} exceeds archive size {}",
                self.header_size, self.archive_size
            )));
        }

        if self.block_size > MAX_BLOCK_SIZE_CODE {
            return Err(ArchiveError::InvalidHeader(format!(
                "block size code {} exceeds {MAX_BLOCK_SIZE_CODE}",
                self.block_size
            )));
        }

        if !self.hash_table_count.is_power_of_two() {
            return Err(ArchiveError::InvalidHeader(format!(
                "hash table count {} is not a power of two",
                self.hash_table_count
            )));
        }

        if self.hash_table_offset < self.header_size {
            return Err(ArchiveError::InvalidHeader(format!(
                "hash table offset {} overlaps the header",
                self.hash_table_offset
            )));
        }

        let table_end = u64::from(self.hash_table_offset) + self.hash_table_bytes();
        if table_end > u64::from(self.archive_size) {
            return Err(ArchiveError::InvalidHeader(format!(
                "hash table ends at {table_end}, beyond archive size {}",
                self.archive_size
            )));
        }

        if let Some(head) = self.deleted_hash
            && head >= self.hash_table_count
        {
            return Err(ArchiveError::InvalidHeader(format!(
                "deleted list head {head} is outside the table"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    fn valid_header() -> ArchiveHeader {
        let mut header = ArchiveHeader::new(0, 16);
        header.hash_table_offset = 512;
        header.archive_size = 512 + (16 * ENTRY_SIZE) as u32;
        header
    }

    #[test]
    fn test_header_round_trip() {
        let header = valid_header();

        let mut writer = Vec::new();
        header
            .write(&mut Cursor::new(&mut writer))
            .expect("Operation should succeed");
        assert_eq!(writer.len(), HEADER_SIZE);
        assert_eq!(&writer[..4], b"LPK\x1A");
        assert_eq!(&writer[24..28], &[0xFF; 4]);

        let parsed = ArchiveHeader::read(&mut Cursor::new(&writer)).expect("Operation should succeed");
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_block_bytes() {
        let mut header = valid_header();
        assert_eq!(header.block_bytes(), 512);
        header.block_size = 3;
        assert_eq!(header.block_bytes(), 4096);
    }

    #[test]
    fn test_header_validation() {
        assert!(valid_header().validate().is_ok());

        let mut header = valid_header();
        header.magic = 0x1234_5678;
        assert!(matches!(
            header.validate(),
            Err(ArchiveError::InvalidMagic(0x1234_5678))
        ));

        let mut header = valid_header();
        header.hash_table_count = 12;
        assert!(header.validate().is_err());

        let mut header = valid_header();
        header.hash_table_count = 0;
        assert!(header.validate().is_err());

        let mut header = valid_header();
        header.archive_size -= 1;
        assert!(header.validate().is_err());

        let mut header = valid_header();
        header.block_size = MAX_BLOCK_SIZE_CODE + 1;
        assert!(header.validate().is_err());

        let mut header = valid_header();
        header.header_size = 20;
        assert!(header.validate().is_err());

        let mut header = valid_header();
        header.deleted_hash = Some(16);
        assert!(header.validate().is_err());
        header.deleted_hash = Some(15);
        assert!(header.validate().is_ok());
    }
}
