//! In-memory archive construction
//!
//! [`ArchiveBuilder`] lays out byte buffers that are already in memory into
//! a complete archive image. It is used for fixtures and to produce patch
//! archives, where [`ArchiveBuilder::remove`] records a deletion.

use crate::compression::CompressionAlgorithm;
use crate::config::ArchiveConfig;
use crate::encryption::{EncryptionAlgorithm, encrypt_payload, entry_salt};
use crate::entry::{HashEntry, Platform, flags};
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::{ArchiveHeader, HEADER_SIZE, MAX_BLOCK_SIZE_CODE};
use crate::index::HashIndex;
use binrw::BinWrite;
use binrw::io::Cursor;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// A file to store in a built archive
#[derive(Debug, Clone)]
pub struct FileSpec {
    name: String,
    data: Vec<u8>,
    locale: u16,
    platform: Platform,
    compression: Option<CompressionAlgorithm>,
    encryption: Option<(EncryptionAlgorithm, Vec<u8>)>,
    crc: bool,
}

impl FileSpec {
    /// Plain, uncompressed file with neutral locale and platform
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            locale: 0,
            platform: Platform::Default,
            compression: None,
            encryption: None,
            crc: false,
        }
    }

    /// Set the locale
    #[must_use]
    pub const fn locale(mut self, locale: u16) -> Self {
        self.locale = locale;
        self
    }

    /// Set the platform
    #[must_use]
    pub const fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Compress with `algorithm`
    #[must_use]
    pub const fn compressed(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.compression = Some(algorithm);
        self
    }

    /// Encrypt with `algorithm` under `key`
    #[must_use]
    pub fn encrypted(mut self, algorithm: EncryptionAlgorithm, key: impl Into<Vec<u8>>) -> Self {
        self.encryption = Some((algorithm, key.into()));
        self
    }

    /// Append a CRC-32 of the contents
    #[must_use]
    pub const fn with_crc(mut self) -> Self {
        self.crc = true;
        self
    }
}

#[derive(Debug, Clone)]
enum Operation {
    Add(FileSpec),
    Remove {
        name: String,
        locale: u16,
        platform: Platform,
    },
}

/// Builds archive images from in-memory files
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    capacity: u32,
    block_size_code: u16,
    config: ArchiveConfig,
    operations: Vec<Operation>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    /// 16-slot table with 512-byte blocks
    pub fn new() -> Self {
        Self {
            capacity: 16,
            block_size_code: 0,
            config: ArchiveConfig::default(),
            operations: Vec::new(),
        }
    }

    /// Initial hash table capacity (power of two); the table grows as needed
    #[must_use]
    pub const fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Block size code (`512 << code` bytes)
    #[must_use]
    pub const fn block_size_code(mut self, code: u16) -> Self {
        self.block_size_code = code;
        self
    }

    /// Configuration used to resolve DEFAULT algorithm codes while packing
    #[must_use]
    pub const fn config(mut self, config: ArchiveConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a file, replacing an earlier one with the same variant
    #[must_use]
    pub fn add(mut self, file: FileSpec) -> Self {
        self.operations.push(Operation::Add(file));
        self
    }

    /// Record the removal of a variant
    ///
    /// The built archive keeps a tombstone for it, which is what a patch
    /// uses to delete the variant from its base. A later [`add`](Self::add)
    /// of the same variant cancels the removal.
    #[must_use]
    pub fn remove(mut self, name: impl Into<String>, locale: u16, platform: Platform) -> Self {
        self.operations.push(Operation::Remove {
            name: name.into(),
            locale,
            platform,
        });
        self
    }

    fn pack(&self, file: &FileSpec, entry: &mut HashEntry) -> ArchiveResult<Vec<u8>> {
        let mut packed = match file.compression {
            Some(algorithm) => {
                entry.set_compression(algorithm.as_code());
                self.config
                    .resolve_compression(algorithm)
                    .codec()
                    .compress(&file.data)?
            }
            None => file.data.clone(),
        };

        if let Some((algorithm, key)) = &file.encryption {
            entry.set_encryption(algorithm.as_code());
            let resolved = self.config.resolve_encryption(*algorithm);
            packed.resize(resolved.padded_len(packed.len()), 0);
            encrypt_payload(resolved, &mut packed, Some(key.as_slice()), entry_salt(entry))?;
        }

        Ok(packed)
    }

    /// Final files in insertion order and the removal markers to record
    ///
    /// A later add replaces an earlier one for the same variant. A removal
    /// drops an earlier add and is itself dropped by a later add, which
    /// replaces the base variant anyway.
    fn resolve_operations(&self) -> (Vec<&FileSpec>, Vec<(&str, u16, Platform)>) {
        let variant = |name: &str, locale: u16, platform: Platform| {
            (HashEntry::new(name, locale, platform).name_hash(), locale, platform)
        };

        let mut files: Vec<&FileSpec> = Vec::new();
        let mut removals: Vec<(&str, u16, Platform)> = Vec::new();
        for operation in &self.operations {
            let (name, locale, platform) = match operation {
                Operation::Add(file) => (file.name.as_str(), file.locale, file.platform),
                Operation::Remove {
                    name,
                    locale,
                    platform,
                } => (name.as_str(), *locale, *platform),
            };
            let key = variant(name, locale, platform);
            files.retain(|f| variant(&f.name, f.locale, f.platform) != key);
            removals.retain(|&(n, l, p)| variant(n, l, p) != key);

            match operation {
                Operation::Add(file) => files.push(file),
                Operation::Remove { .. } => removals.push((name, locale, platform)),
            }
        }
        (files, removals)
    }

    /// Produce the archive image
    pub fn build(&self) -> ArchiveResult<Vec<u8>> {
        if self.block_size_code > MAX_BLOCK_SIZE_CODE {
            return Err(ArchiveError::InvalidHeader(format!(
                "block size code {} exceeds {MAX_BLOCK_SIZE_CODE}",
                self.block_size_code
            )));
        }

        let (files, removals) = self.resolve_operations();
        let capacity = sized_capacity(self.capacity, files.len() + removals.len())?;
        let mut index = HashIndex::with_capacity(capacity)?;
        let mut header = ArchiveHeader::new(self.block_size_code, capacity);
        let block = header.block_bytes() as usize;
        let mut image = vec![0u8; HEADER_SIZE];

        for file in files {
            let mut entry = HashEntry::new(&file.name, file.locale, file.platform);
            entry.file_size = to_u32(file.data.len(), "file size")?;
            let packed = self.pack(file, &mut entry)?;

            image.resize(image.len().next_multiple_of(block), 0);
            entry.offset = to_u32(image.len() / block, "block offset")?;
            entry.packed_size = to_u32(packed.len(), "packed size")?;
            image.extend_from_slice(&packed);
            if file.crc {
                entry.flags |= flags::HAS_CRC;
                image.extend_from_slice(&crc32fast::hash(&file.data).to_le_bytes());
            }

            debug!(
                "packed {} ({} -> {} bytes) at block {}",
                file.name, entry.file_size, entry.packed_size, entry.offset
            );
            index.insert(entry)?;
        }

        // markers last: inserts reuse tombstones and growth drops them
        for (name, locale, platform) in removals {
            let slot = index.insert_tombstone(HashEntry::new(name, locale, platform))?;
            debug!("removal marker for {name} at slot {slot}");
        }

        header.hash_table_offset = to_u32(image.len(), "hash table offset")?;
        header.hash_table_count = index.capacity();
        header.deleted_hash = index.deleted_head();
        image.extend_from_slice(&index.to_bytes()?);
        header.archive_size = to_u32(image.len(), "archive size")?;
        header.validate()?;

        let mut raw = Vec::with_capacity(HEADER_SIZE);
        header.write(&mut Cursor::new(&mut raw))?;
        image[..HEADER_SIZE].copy_from_slice(&raw);

        Ok(image)
    }

    /// Build and write the archive to `path`
    pub fn write_to(&self, path: impl AsRef<Path>) -> ArchiveResult<()> {
        let path = path.as_ref();
        let image = self.build()?;
        let mut file = File::create(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        file.write_all(&image).map_err(|source| ArchiveError::Write {
            offset: 0,
            len: image.len(),
            source,
        })?;
        file.sync_all().map_err(ArchiveError::Close)
    }
}

/// Smallest doubling of `capacity` that holds `slots` entries at most three
/// quarters full
fn sized_capacity(capacity: u32, slots: usize) -> ArchiveResult<u32> {
    let mut sized = capacity;
    while sized > 0 && slots * 4 > sized as usize * 3 {
        sized = sized
            .checked_mul(2)
            .ok_or(ArchiveError::Alloc { count: u32::MAX })?;
    }
    Ok(sized)
}

fn to_u32(value: usize, what: &str) -> ArchiveResult<u32> {
    u32::try_from(value)
        .map_err(|_| ArchiveError::Size(format!("{what} {value} does not fit in 32 bits")))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entry::ENTRY_SIZE;
    use binrw::BinRead;

    fn parse(image: &[u8]) -> (ArchiveHeader, HashIndex) {
        let header = ArchiveHeader::read(&mut Cursor::new(image)).unwrap();
        let table = &image[header.hash_table_offset as usize..];
        let index =
            HashIndex::from_bytes(table, header.hash_table_count, header.deleted_hash).unwrap();
        (header, index)
    }

    #[test]
    fn test_empty_archive() {
        let image = ArchiveBuilder::new().build().unwrap();
        let (header, index) = parse(&image);
        assert_eq!(header.hash_table_offset as usize, HEADER_SIZE);
        assert_eq!(image.len(), HEADER_SIZE + 16 * ENTRY_SIZE);
        assert_eq!(index.count_used(), 0);
    }

    #[test]
    fn test_payloads_are_block_aligned() {
        let image = ArchiveBuilder::new()
            .block_size_code(1)
            .add(FileSpec::new("a.bin", vec![1u8; 100]))
            .add(FileSpec::new("b.bin", vec![2u8; 2000]).with_crc())
            .build()
            .unwrap();
        let (header, index) = parse(&image);
        assert_eq!(header.block_bytes(), 1024);

        let a = index.get(index.lookup("a.bin", 0, Platform::Default).unwrap()).unwrap();
        let b = index.get(index.lookup("b.bin", 0, Platform::Default).unwrap()).unwrap();
        assert_eq!(a.offset, 1);
        assert_eq!(b.offset, 2);
        assert!(b.has_crc());
        let start = 2048;
        assert_eq!(&image[start..start + 4], &[2, 2, 2, 2]);
        assert_eq!(
            header.hash_table_offset as usize,
            start + 2000 + 4
        );
    }

    #[test]
    fn test_encrypted_payload_is_padded() {
        let image = ArchiveBuilder::new()
            .add(FileSpec::new("s.bin", b"hello".to_vec()).encrypted(EncryptionAlgorithm::Tea, "k"))
            .build()
            .unwrap();
        let (_, index) = parse(&image);
        let entry = index.get(index.lookup("s.bin", 0, Platform::Default).unwrap()).unwrap();
        assert_eq!(entry.packed_size, 8);
        assert_eq!(entry.file_size, 5);
        assert_eq!(entry.encryption_code(), EncryptionAlgorithm::Tea.as_code());
    }

    #[test]
    fn test_remove_leaves_tombstone() {
        let image = ArchiveBuilder::new()
            .remove("gone.txt", 0, Platform::Ios)
            .build()
            .unwrap();
        let (header, index) = parse(&image);
        assert_eq!(index.count_used(), 0);
        assert_eq!(index.count_deleted(), 1);
        assert!(header.deleted_hash.is_some());
    }

    #[test]
    fn test_remove_marker_outlives_later_adds() {
        let image = ArchiveBuilder::new()
            .capacity(4)
            .remove("gone.txt", 0, Platform::Default)
            .add(FileSpec::new("a.txt", b"a".to_vec()))
            .add(FileSpec::new("b.txt", b"b".to_vec()))
            .add(FileSpec::new("c.txt", b"c".to_vec()))
            .build()
            .unwrap();
        let (header, index) = parse(&image);
        assert_eq!(header.hash_table_count, 8);
        assert_eq!(index.count_used(), 3);
        assert_eq!(index.count_deleted(), 1);

        let marker = header.deleted_hash.unwrap() as usize;
        let hash = HashEntry::new("gone.txt", 0, Platform::Default).name_hash();
        assert_eq!(index.get(marker).unwrap().name_hash(), hash);
    }

    #[test]
    fn test_last_operation_per_variant_wins() {
        let image = ArchiveBuilder::new()
            .add(FileSpec::new("x.txt", b"first".to_vec()))
            .remove("x.txt", 0, Platform::Default)
            .remove("y.txt", 0, Platform::Default)
            .add(FileSpec::new("y.txt", b"back".to_vec()))
            .build()
            .unwrap();
        let (_, index) = parse(&image);
        assert_eq!(index.count_used(), 1);
        assert_eq!(index.count_deleted(), 1);
        assert!(index.lookup("y.txt", 0, Platform::Default).is_some());
        assert!(index.lookup("x.txt", 0, Platform::Default).is_none());
        assert_eq!(image.len(), 512 + 4 + 16 * ENTRY_SIZE);
    }

    #[test]
    fn test_rejects_bad_block_code() {
        assert!(ArchiveBuilder::new().block_size_code(16).build().is_err());
        assert!(ArchiveBuilder::new().capacity(10).build().is_err());
    }
}
