//! Archive handle
//!
//! An [`LpkArchive`] owns the open file, the parsed header and the whole hash
//! index. The index is loaded once at open time; lookups never touch the
//! file. Extraction reads one payload under the file mutex, so concurrent
//! callers sharing a handle never interleave a seek with another read.

use crate::compression::CompressionAlgorithm;
use crate::config::ArchiveConfig;
use crate::encryption::{EncryptionAlgorithm, decrypt_payload, entry_salt};
use crate::entry::{ENTRY_SIZE, HashEntry, Platform};
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::{ArchiveHeader, HEADER_SIZE, LPK_MAGIC};
use crate::index::{DebugEntry, HashIndex};
use crate::patch::{ArchiveLayout, PatchStats, plan_patch};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An open LPK archive
#[derive(Debug)]
pub struct LpkArchive {
    path: PathBuf,
    file: Mutex<File>,
    header: ArchiveHeader,
    index: HashIndex,
    config: ArchiveConfig,
}

fn payload_buffer(len: u64) -> ArchiveResult<Vec<u8>> {
    let size = usize::try_from(len).map_err(|_| ArchiveError::OutOfMemory { len })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| ArchiveError::OutOfMemory { len })?;
    buf.resize(size, 0);
    Ok(buf)
}

fn read_exact_at(file: &mut File, offset: u64, buf: &mut [u8]) -> ArchiveResult<()> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|source| ArchiveError::Seek { offset, source })?;
    file.read_exact(buf).map_err(|source| ArchiveError::Read {
        offset,
        len: buf.len(),
        source,
    })
}

fn write_all_at(file: &mut File, offset: u64, data: &[u8]) -> ArchiveResult<()> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|source| ArchiveError::Seek { offset, source })?;
    file.write_all(data).map_err(|source| ArchiveError::Write {
        offset,
        len: data.len(),
        source,
    })
}

fn sync(file: &File) -> ArchiveResult<()> {
    file.sync_all().map_err(|source| ArchiveError::Write {
        offset: 0,
        len: 0,
        source,
    })
}

impl LpkArchive {
    /// Open an archive read-only with the default configuration
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::open_with(path, ArchiveConfig::default())
    }

    /// Open an archive with an explicit configuration
    pub fn open_with(path: impl AsRef<Path>, config: ArchiveConfig) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(config.access.can_write())
            .open(&path)
            .map_err(|source| ArchiveError::Open {
                path: path.clone(),
                source,
            })?;

        let mut magic = [0u8; 4];
        read_exact_at(&mut file, 0, &mut magic)?;
        let magic = u32::from_le_bytes(magic);
        if magic != LPK_MAGIC {
            return Err(ArchiveError::InvalidMagic(magic));
        }

        let mut raw = [0u8; HEADER_SIZE];
        read_exact_at(&mut file, 0, &mut raw)?;
        let header = ArchiveHeader::read(&mut Cursor::new(&raw[..]))?;
        header.validate()?;

        let table_len = header.hash_table_count as usize * ENTRY_SIZE;
        let mut table = Vec::new();
        table
            .try_reserve_exact(table_len)
            .map_err(|_| ArchiveError::Alloc {
                count: header.hash_table_count,
            })?;
        table.resize(table_len, 0);
        read_exact_at(&mut file, u64::from(header.hash_table_offset), &mut table)?;

        let index =
            HashIndex::from_bytes(&table, header.hash_table_count, header.deleted_hash)?;

        info!(
            "Opened {} ({} slots, {} active, block size {})",
            path.display(),
            header.hash_table_count,
            index.count_used(),
            header.block_bytes()
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            header,
            index,
            config,
        })
    }

    /// Release the handle, flushing it first when it was opened writable
    pub fn close(self) -> ArchiveResult<()> {
        let file = self.file.into_inner();
        if self.config.access.can_write() {
            file.sync_all().map_err(ArchiveError::Close)?;
        }
        debug!("Closed {}", self.path.display());
        Ok(())
    }

    /// Parsed header
    pub const fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Loaded hash index
    pub const fn index(&self) -> &HashIndex {
        &self.index
    }

    /// Handle configuration
    pub const fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Archive path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block size in bytes
    pub fn block_size(&self) -> u64 {
        self.header.block_bytes()
    }

    /// Placement facts used when planning a patch onto this archive
    pub fn layout(&self) -> ArchiveLayout {
        ArchiveLayout {
            block_size: self.block_size(),
            archive_size: self.header.archive_size,
        }
    }

    /// Slot of the active entry matching a path and variant
    pub fn lookup_index(
        &self,
        name: &str,
        locale: u16,
        platform: Platform,
    ) -> ArchiveResult<usize> {
        self.index
            .lookup(name, locale, platform)
            .ok_or_else(|| ArchiveError::NotFound {
                name: name.to_string(),
                locale,
                platform,
            })
    }

    /// Slot of any active variant of a path
    pub fn find_any(&self, name: &str) -> Option<usize> {
        self.index.find_any(name)
    }

    /// Slots of all active variants of a path
    pub fn variants(&self, name: &str) -> Vec<usize> {
        self.index.variants(name)
    }

    /// Entry stored in a slot
    pub fn entry(&self, slot: usize) -> Option<&HashEntry> {
        self.index.get(slot)
    }

    /// Unpacked size of a file
    pub fn file_size(&self, name: &str, locale: u16, platform: Platform) -> ArchiveResult<u32> {
        let slot = self.lookup_index(name, locale, platform)?;
        Ok(self.index.entries()[slot].file_size)
    }

    /// Number of active entries
    pub fn count_used(&self) -> usize {
        self.index.count_used()
    }

    /// Describe every active entry
    pub fn debug_dump(&self) -> Vec<DebugEntry> {
        self.index.debug_dump()
    }

    /// Read, decrypt and decompress a file
    ///
    /// `key` is only needed for encrypted entries.
    pub fn extract(
        &self,
        name: &str,
        key: Option<&[u8]>,
        locale: u16,
        platform: Platform,
    ) -> ArchiveResult<Vec<u8>> {
        let slot = self.lookup_index(name, locale, platform)?;
        self.extract_slot(slot, key)
    }

    /// Extract the entry in a known slot
    pub fn extract_slot(&self, slot: usize, key: Option<&[u8]>) -> ArchiveResult<Vec<u8>> {
        let entry = self
            .index
            .get(slot)
            .filter(|e| e.is_active())
            .ok_or_else(|| ArchiveError::InvalidEntry {
                slot,
                reason: "slot is not active".to_string(),
            })?;

        if u64::from(entry.file_size) > self.config.max_file_size {
            return Err(ArchiveError::Size(format!(
                "file size {} exceeds the configured maximum of {}",
                entry.file_size, self.config.max_file_size
            )));
        }

        let start = u64::from(entry.offset) * self.block_size();
        let stored_len = entry.stored_len();
        self.check_payload_bounds(slot, start, stored_len)?;

        let mut stored = payload_buffer(stored_len)?;
        read_exact_at(&mut self.file.lock(), start, &mut stored)?;

        let stored_crc = if entry.has_crc() {
            let trailer = stored.split_off(entry.packed_size as usize);
            Some(u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]))
        } else {
            None
        };
        let mut packed = stored;

        let encryption = if entry.is_encrypted() {
            self.config
                .resolve_encryption(EncryptionAlgorithm::from_code(entry.encryption_code())?)
        } else {
            EncryptionAlgorithm::None
        };
        decrypt_payload(encryption, &mut packed, key, entry_salt(entry))?;

        let expected = entry.file_size as usize;
        let data = if entry.is_compressed() {
            let compression = self
                .config
                .resolve_compression(CompressionAlgorithm::from_code(entry.compression_code())?);
            compression.codec().decompress(&packed, expected)?
        } else {
            let padded = encryption.padded_len(expected);
            if packed.len() != padded {
                return Err(ArchiveError::Size(format!(
                    "slot {slot} stores {} bytes for a {expected}-byte file, expected {padded}",
                    packed.len()
                )));
            }
            packed.truncate(expected);
            packed
        };

        if data.len() != expected {
            return Err(ArchiveError::Size(format!(
                "slot {slot} unpacked to {} bytes, expected {expected}",
                data.len()
            )));
        }

        if let Some(expected_crc) = stored_crc
            && self.config.verify_checksums
        {
            let actual = crc32fast::hash(&data);
            if actual != expected_crc {
                warn!("checksum mismatch in slot {slot}");
                return Err(ArchiveError::ChecksumMismatch {
                    expected: expected_crc,
                    actual,
                });
            }
        }

        debug!(
            "Extracted slot {slot}: {} stored bytes -> {} bytes ({encryption})",
            entry.packed_size,
            data.len()
        );
        Ok(data)
    }

    fn check_payload_bounds(&self, slot: usize, start: u64, len: u64) -> ArchiveResult<()> {
        let header = &self.header;
        let end = start + len;
        let table_start = u64::from(header.hash_table_offset);
        let table_end = table_start + header.hash_table_bytes();

        let reason = if start < u64::from(header.header_size) {
            Some("payload overlaps the header")
        } else if end > u64::from(header.archive_size) {
            Some("payload extends past the end of the archive")
        } else if len > 0 && start < table_end && end > table_start {
            Some("payload overlaps the hash table")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!("slot {slot}: {reason} ({start}..{end})");
                Err(ArchiveError::InvalidEntry {
                    slot,
                    reason: reason.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Merge a patch archive into this archive
    ///
    /// Patch payloads and the merged table are appended; the header is
    /// rewritten last, after the appended data has been synced, so an
    /// interrupted patch leaves the previous state readable.
    pub fn apply_patch(&mut self, patch: &Self) -> ArchiveResult<PatchStats> {
        if !self.config.access.can_write() {
            return Err(ArchiveError::ReadOnly);
        }

        info!(
            "Applying patch {} to {}",
            patch.path.display(),
            self.path.display()
        );

        for (slot, entry) in patch.index.iter_active() {
            let start = u64::from(entry.offset) * patch.block_size();
            patch.check_payload_bounds(slot, start, entry.stored_len())?;
        }

        let plan = plan_patch(&self.index, self.layout(), &patch.index, patch.block_size())?;
        let file = self.file.get_mut();

        for copy in &plan.copies {
            let mut block = payload_buffer(copy.len)?;
            read_exact_at(&mut patch.file.lock(), copy.source, &mut block)?;
            write_all_at(file, copy.dest, &block)?;
        }

        let table = plan.index.to_bytes()?;
        write_all_at(file, u64::from(plan.hash_table_offset), &table)?;
        sync(file)?;

        let header = ArchiveHeader {
            archive_size: plan.archive_size,
            hash_table_offset: plan.hash_table_offset,
            hash_table_count: plan.index.capacity(),
            deleted_hash: plan.index.deleted_head(),
            ..self.header.clone()
        };
        let mut raw = Vec::with_capacity(HEADER_SIZE);
        header.write(&mut Cursor::new(&mut raw))?;
        write_all_at(file, 0, &raw)?;
        sync(file)?;

        info!(
            "Patched {}: {} inserted, {} replaced, {} removed, {} active",
            self.path.display(),
            plan.stats.inserted,
            plan.stats.replaced,
            plan.stats.removed,
            plan.index.count_used()
        );
        if plan.stats.missing_removals > 0 {
            warn!(
                "{} patch removals matched no entry",
                plan.stats.missing_removals
            );
        }

        self.header = header;
        self.index = plan.index;
        Ok(plan.stats)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_oversized_payload_buffer_is_an_error() {
        let err = payload_buffer(u64::MAX).expect_err("allocation cannot succeed");
        assert!(matches!(err, ArchiveError::OutOfMemory { .. }));
        assert_eq!(err.kind(), ErrorKind::Alloc);
        assert_eq!(payload_buffer(3).ok(), Some(vec![0u8; 3]));
    }
}
