//! Patch planning
//!
//! A patch is itself an LPK archive. Its active entries add or replace
//! variants in the base archive; its tombstones remove them. Planning is a
//! pure function over the two indexes: it decides where every patch payload
//! lands in the base file and produces the merged index. Executing the plan
//! is left to [`LpkArchive::apply_patch`](crate::LpkArchive::apply_patch).
//!
//! Payloads are appended after the current end of the base archive, each
//! aligned to the base block size, followed by the merged hash table. The
//! old payloads and table stay where they are, so only the header is ever
//! rewritten in place.

use crate::entry::{ENTRY_SIZE, HashEntry};
use crate::error::{ArchiveError, ArchiveResult};
use crate::index::HashIndex;
use serde::Serialize;
use tracing::debug;

/// Placement facts about the base archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLayout {
    /// Base block size in bytes
    pub block_size: u64,
    /// Current end of the base archive
    pub archive_size: u32,
}

/// One payload to copy from the patch file into the base file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCopy {
    /// Byte offset in the patch archive
    pub source: u64,
    /// Byte offset in the base archive
    pub dest: u64,
    /// Bytes to copy, including any CRC trailer
    pub len: u64,
}

/// What a patch changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchStats {
    /// Variants that did not exist before
    pub inserted: usize,
    /// Variants whose previous version was replaced
    pub replaced: usize,
    /// Variants removed by patch tombstones
    pub removed: usize,
    /// Patch tombstones with no matching variant in the base
    pub missing_removals: usize,
}

/// Result of merging a patch index into a base index
#[derive(Debug, Clone)]
pub struct PatchPlan {
    /// Merged index
    pub index: HashIndex,
    /// Payload copies, in destination order
    pub copies: Vec<BlockCopy>,
    /// Where the merged table is written
    pub hash_table_offset: u32,
    /// Archive size once the merged table is written
    pub archive_size: u32,
    /// Change summary
    pub stats: PatchStats,
}

fn to_u32(value: u64, what: &str) -> ArchiveResult<u32> {
    u32::try_from(value)
        .map_err(|_| ArchiveError::Size(format!("{what} {value} does not fit in 32 bits")))
}

/// Merge `patch` into a copy of `base`
///
/// Removals are applied before additions, so a patch that deletes and
/// re-adds the same variant leaves the new version in place.
pub fn plan_patch(
    base: &HashIndex,
    layout: ArchiveLayout,
    patch: &HashIndex,
    patch_block_size: u64,
) -> ArchiveResult<PatchPlan> {
    if layout.block_size == 0 || patch_block_size == 0 {
        return Err(ArchiveError::Size("block size must be non-zero".to_string()));
    }

    let mut index = base.clone();
    let mut stats = PatchStats::default();
    let mut copies = Vec::new();

    for (slot, entry) in patch.entries().iter().enumerate() {
        if !entry.is_deleted() {
            continue;
        }
        match index.find(entry.name_hash(), entry.locale, entry.platform) {
            Some(existing) => {
                debug!("patch slot {slot} removes base slot {existing}");
                index.remove(existing)?;
                stats.removed += 1;
            }
            None => stats.missing_removals += 1,
        }
    }

    let mut cursor = u64::from(layout.archive_size);
    for (slot, entry) in patch.iter_active() {
        let dest = cursor.next_multiple_of(layout.block_size);
        let len = entry.stored_len();
        let offset = to_u32(dest / layout.block_size, "block offset")?;

        copies.push(BlockCopy {
            source: u64::from(entry.offset) * patch_block_size,
            dest,
            len,
        });
        cursor = dest + len;

        if index
            .find(entry.name_hash(), entry.locale, entry.platform)
            .is_some()
        {
            stats.replaced += 1;
        } else {
            stats.inserted += 1;
        }

        let merged = HashEntry {
            offset,
            next: None,
            prev: None,
            ..entry.clone()
        };
        let placed = index.insert(merged)?;
        debug!("patch slot {slot} placed at slot {placed}, block {offset}");
    }

    let hash_table_offset = to_u32(cursor, "hash table offset")?;
    let archive_size = to_u32(
        cursor + u64::from(index.capacity()) * ENTRY_SIZE as u64,
        "archive size",
    )?;

    Ok(PatchPlan {
        index,
        copies,
        hash_table_offset,
        archive_size,
        stats,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entry::Platform;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, platform: Platform, offset: u32, packed_size: u32) -> HashEntry {
        let mut entry = HashEntry::new(name, 0, platform);
        entry.offset = offset;
        entry.packed_size = packed_size;
        entry.file_size = packed_size;
        entry
    }

    fn base_index() -> HashIndex {
        let mut index = HashIndex::with_capacity(16).unwrap();
        index.insert(entry("keep.txt", Platform::Default, 1, 10)).unwrap();
        index.insert(entry("swap.txt", Platform::Default, 2, 10)).unwrap();
        index.insert(entry("drop.txt", Platform::Android, 3, 10)).unwrap();
        index.insert(entry("drop.txt", Platform::Ios, 4, 10)).unwrap();
        index
    }

    const LAYOUT: ArchiveLayout = ArchiveLayout {
        block_size: 512,
        archive_size: 5000,
    };

    #[test]
    fn test_plan_insert_replace_remove() {
        let base = base_index();

        let mut patch = HashIndex::with_capacity(8).unwrap();
        patch.insert(entry("swap.txt", Platform::Default, 1, 20)).unwrap();
        patch.insert(entry("new.txt", Platform::Default, 2, 700)).unwrap();
        let marker = patch.insert(entry("drop.txt", Platform::Android, 0, 0)).unwrap();
        patch.remove(marker).unwrap();
        let ghost = patch.insert(entry("ghost.txt", Platform::Default, 0, 0)).unwrap();
        patch.remove(ghost).unwrap();

        let plan = plan_patch(&base, LAYOUT, &patch, 1024).unwrap();

        assert_eq!(
            plan.stats,
            PatchStats {
                inserted: 1,
                replaced: 1,
                removed: 1,
                missing_removals: 1,
            }
        );
        assert_eq!(plan.copies.len(), 2);
        for copy in &plan.copies {
            assert_eq!(copy.dest % 512, 0);
            assert!(copy.dest >= 5000);
            assert_eq!(copy.source % 1024, 0);
        }

        let index = &plan.index;
        assert!(index.lookup("drop.txt", 0, Platform::Android).is_none());
        assert!(index.lookup("drop.txt", 0, Platform::Ios).is_some());
        assert!(index.lookup("keep.txt", 0, Platform::Default).is_some());
        let swap = index.lookup("swap.txt", 0, Platform::Default).unwrap();
        assert_eq!(index.get(swap).unwrap().packed_size, 20);
        assert!(u64::from(index.get(swap).unwrap().offset) * 512 >= 5000);
        assert_eq!(index.count_used(), 4);
    }

    #[test]
    fn test_table_follows_last_payload() {
        let base = base_index();
        let mut patch = HashIndex::with_capacity(4).unwrap();
        patch.insert(entry("new.txt", Platform::Default, 1, 100)).unwrap();

        let plan = plan_patch(&base, LAYOUT, &patch, 512).unwrap();
        let last = plan.copies.last().unwrap();
        assert_eq!(u64::from(plan.hash_table_offset), last.dest + last.len);
        assert_eq!(
            plan.archive_size,
            plan.hash_table_offset + plan.index.capacity() * ENTRY_SIZE as u32
        );
    }

    #[test]
    fn test_empty_patch_keeps_entries() {
        let base = base_index();
        let patch = HashIndex::with_capacity(4).unwrap();
        let plan = plan_patch(&base, LAYOUT, &patch, 512).unwrap();

        assert!(plan.copies.is_empty());
        assert_eq!(plan.hash_table_offset, 5000);
        assert_eq!(plan.index.count_used(), base.count_used());
    }

    #[test]
    fn test_offset_overflow_is_size_error() {
        let base = base_index();
        let mut patch = HashIndex::with_capacity(4).unwrap();
        patch
            .insert(entry("big.bin", Platform::Default, 1, u32::MAX))
            .unwrap();

        let err = plan_patch(&base, LAYOUT, &patch, 512).expect_err("table offset overflows");
        assert_eq!(err.kind(), crate::ErrorKind::Size);
    }

    #[test]
    fn test_readd_after_remove_in_same_patch() {
        let base = base_index();
        let mut patch = HashIndex::with_capacity(8).unwrap();
        let old = patch.insert(entry("swap.txt", Platform::Default, 1, 5)).unwrap();
        patch.remove(old).unwrap();
        patch.insert(entry("swap.txt", Platform::Default, 2, 6)).unwrap();

        let plan = plan_patch(&base, LAYOUT, &patch, 512).unwrap();
        let swap = plan.index.lookup("swap.txt", 0, Platform::Default).unwrap();
        assert_eq!(plan.index.get(swap).unwrap().packed_size, 6);
    }
}
