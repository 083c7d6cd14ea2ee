//! Open-addressed hash index of archive entries
//!
//! The table has a power-of-two number of slots. A name is placed at the
//! first free slot found by linear probing from `slot_hash & (capacity - 1)`,
//! wrapping at most once around the table. Probes stop at a never-used slot
//! and step over tombstones, so deleting an entry never hides the entries
//! placed after it.
//!
//! All variants (locale/platform pairs) of one name are linked into a doubly
//! linked chain through their `next`/`prev` fields. Tombstones reuse `next`
//! as the link of the deleted-entry list whose head lives in the header.
//!
//! Every chain walk is capped at `capacity` steps so corrupt links cannot
//! loop forever; a truncated walk is logged and degrades to "not found".

use crate::entry::{ENTRY_SIZE, HashEntry, Platform, SlotState, flags};
use crate::error::{ArchiveError, ArchiveResult};
use binrw::io::Cursor;
use lpk_crypto::NameHash;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// In-memory copy of an archive's hash table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashIndex {
    entries: Vec<HashEntry>,
    deleted_head: Option<u32>,
}

#[derive(Clone, Copy)]
enum Direction {
    Next,
    Prev,
}

impl HashIndex {
    /// Create an empty index with `capacity` slots
    pub fn with_capacity(capacity: u32) -> ArchiveResult<Self> {
        if !capacity.is_power_of_two() {
            return Err(ArchiveError::Size(format!(
                "hash table capacity {capacity} is not a power of two"
            )));
        }

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity as usize)
            .map_err(|_| ArchiveError::Alloc { count: capacity })?;
        entries.resize(capacity as usize, HashEntry::default());

        Ok(Self {
            entries,
            deleted_head: None,
        })
    }

    /// Wrap entries loaded from disk
    pub fn from_parts(entries: Vec<HashEntry>, deleted_head: Option<u32>) -> ArchiveResult<Self> {
        if !entries.len().is_power_of_two() {
            return Err(ArchiveError::InvalidHeader(format!(
                "hash table holds {} entries, not a power of two",
                entries.len()
            )));
        }
        if let Some(head) = deleted_head
            && head as usize >= entries.len()
        {
            return Err(ArchiveError::InvalidHeader(format!(
                "deleted list head {head} is outside the table"
            )));
        }

        Ok(Self {
            entries,
            deleted_head,
        })
    }

    /// Parse `count` consecutive records
    pub fn from_bytes(data: &[u8], count: u32, deleted_head: Option<u32>) -> ArchiveResult<Self> {
        let expected = count as usize * ENTRY_SIZE;
        if data.len() < expected {
            return Err(ArchiveError::Size(format!(
                "hash table needs {expected} bytes, got {}",
                data.len()
            )));
        }

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(count as usize)
            .map_err(|_| ArchiveError::Alloc { count })?;

        let mut cursor = Cursor::new(data);
        for _ in 0..count {
            entries.push(HashEntry::read_record(&mut cursor)?);
        }

        Self::from_parts(entries, deleted_head)
    }

    /// Serialize the whole table
    pub fn to_bytes(&self) -> ArchiveResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.entries.len() * ENTRY_SIZE);
        let mut cursor = Cursor::new(&mut buf);
        for entry in &self.entries {
            entry.write_record(&mut cursor)?;
        }
        Ok(buf)
    }

    /// Number of slots
    pub fn capacity(&self) -> u32 {
        self.entries.len() as u32
    }

    /// All slots in table order
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Slot contents
    pub fn get(&self, slot: usize) -> Option<&HashEntry> {
        self.entries.get(slot)
    }

    /// Head of the deleted-entry list
    pub const fn deleted_head(&self) -> Option<u32> {
        self.deleted_head
    }

    fn mask(&self) -> usize {
        self.entries.len() - 1
    }

    fn probe(&self, hash: NameHash) -> impl Iterator<Item = usize> + '_ {
        let start = hash.slot as usize & self.mask();
        let mask = self.mask();
        (0..self.entries.len()).map(move |step| (start + step) & mask)
    }

    /// Resolve a hash triple and variant to an active slot
    pub fn find(&self, hash: NameHash, locale: u16, platform: Platform) -> Option<usize> {
        for slot in self.probe(hash) {
            let entry = &self.entries[slot];
            match entry.state() {
                SlotState::Empty => return None,
                SlotState::Tombstone => {}
                SlotState::Active => {
                    if !entry.name_hash().same_name(&hash) {
                        continue;
                    }
                    if entry.matches_variant(locale, platform) {
                        return Some(slot);
                    }
                    if let Some(found) = self
                        .chain_slots(slot)
                        .into_iter()
                        .find(|&s| self.entries[s].matches_variant(locale, platform))
                    {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Resolve a path and variant to an active slot
    pub fn lookup(&self, name: &str, locale: u16, platform: Platform) -> Option<usize> {
        let hash = NameHash::of(name);
        let slot = self.find(hash, locale, platform);
        debug!("lookup {name} ({hash}) locale {locale} platform {platform}: {slot:?}");
        slot
    }

    /// First active variant of a hash triple on its probe path
    pub fn find_any_hash(&self, hash: NameHash) -> Option<usize> {
        for slot in self.probe(hash) {
            let entry = &self.entries[slot];
            match entry.state() {
                SlotState::Empty => return None,
                SlotState::Active if entry.name_hash().same_name(&hash) => return Some(slot),
                _ => {}
            }
        }
        None
    }

    /// First active variant of a path, whatever its locale and platform
    pub fn find_any(&self, name: &str) -> Option<usize> {
        self.find_any_hash(NameHash::of(name))
    }

    /// All active variants of a path, in slot order
    pub fn variants(&self, name: &str) -> Vec<usize> {
        self.find_any(name)
            .map(|slot| {
                let mut slots = self.chain_slots(slot);
                slots.sort_unstable();
                slots.dedup();
                slots
            })
            .unwrap_or_default()
    }

    fn link(&self, slot: usize, direction: Direction) -> Option<u32> {
        let entry = &self.entries[slot];
        match direction {
            Direction::Next => entry.next,
            Direction::Prev => entry.prev,
        }
    }

    /// Slots of the name chain containing `start`, `start` first
    ///
    /// Walks `next` then `prev`. Links leaving the table, reaching an entry
    /// that is not an active variant of the same name, or exceeding the
    /// visit budget end the walk.
    fn chain_slots(&self, start: usize) -> Vec<usize> {
        let hash = self.entries[start].name_hash();
        let capacity = self.entries.len();
        let mut slots = vec![start];
        let mut budget = capacity;

        for direction in [Direction::Next, Direction::Prev] {
            let mut cursor = self.link(start, direction);
            while let Some(raw) = cursor {
                let slot = raw as usize;
                if slot >= capacity {
                    warn!("chain link from slot {start} points outside the table: {raw}");
                    break;
                }
                if slot == start || budget == 0 {
                    warn!("cycle in name chain through slot {start}");
                    break;
                }
                let entry = &self.entries[slot];
                if !entry.is_active() || !entry.name_hash().same_name(&hash) {
                    warn!("name chain through slot {start} reaches foreign slot {slot}");
                    break;
                }
                budget -= 1;
                slots.push(slot);
                cursor = self.link(slot, direction);
            }
        }

        slots
    }

    fn chain_tail(&self, start: usize) -> usize {
        let hash = self.entries[start].name_hash();
        let mut tail = start;
        for _ in 0..self.entries.len() {
            match self.entries[tail].next {
                Some(raw)
                    if (raw as usize) < self.entries.len()
                        && raw as usize != start
                        && self.entries[raw as usize].is_active()
                        && self.entries[raw as usize].name_hash().same_name(&hash) =>
                {
                    tail = raw as usize;
                }
                _ => break,
            }
        }
        tail
    }

    /// Number of active entries
    pub fn count_used(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active()).count()
    }

    /// Number of tombstones
    pub fn count_deleted(&self) -> usize {
        self.entries.iter().filter(|e| e.is_deleted()).count()
    }

    /// Active entries with their slots
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &HashEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_active())
    }

    /// Insert an active entry, replacing an existing variant with the same
    /// name, locale and platform
    ///
    /// Returns the slot the entry landed in. The table doubles when it would
    /// become more than three quarters full.
    pub fn insert(&mut self, entry: HashEntry) -> ArchiveResult<usize> {
        let hash = entry.name_hash();
        if let Some(existing) = self.find(hash, entry.locale, entry.platform) {
            debug!("replacing slot {existing} ({hash})");
            self.remove(existing)?;
        }

        if (self.count_used() + 1) * 4 > self.entries.len() * 3 {
            self.grow()?;
        }

        self.place(entry)
    }

    fn place(&mut self, mut entry: HashEntry) -> ArchiveResult<usize> {
        let hash = entry.name_hash();
        let slot = match self.free_slot(hash) {
            Some(slot) => slot,
            None => {
                self.grow()?;
                self.free_slot(hash).ok_or(ArchiveError::Alloc {
                    count: self.capacity(),
                })?
            }
        };

        if self.entries[slot].is_deleted() {
            self.unlink_deleted(slot);
        }

        let tail = self.find_any_hash(hash).map(|s| self.chain_tail(s));
        entry.flags = (entry.flags | flags::USED) & !flags::DELETED;
        entry.next = None;
        entry.prev = tail.map(|t| t as u32);
        if let Some(tail) = tail {
            self.entries[tail].next = Some(slot as u32);
        }

        self.entries[slot] = entry;
        Ok(slot)
    }

    /// First empty or tombstone slot on the probe path of `hash`
    pub fn free_slot(&self, hash: NameHash) -> Option<usize> {
        self.probe(hash).find(|&slot| !self.entries[slot].is_active())
    }

    /// Remove a tombstone from the deleted-entry list before reusing it
    fn unlink_deleted(&mut self, slot: usize) {
        let target = Some(slot as u32);
        let after = self.entries[slot].next;

        if self.deleted_head == target {
            self.deleted_head = after;
            return;
        }

        let mut cursor = self.deleted_head;
        for _ in 0..self.entries.len() {
            let Some(raw) = cursor else { break };
            let Some(node) = self.entries.get_mut(raw as usize) else {
                break;
            };
            if node.next == target {
                node.next = after;
                return;
            }
            cursor = node.next;
        }
        warn!("reused tombstone {slot} was not on the deleted list");
    }

    /// Tombstone an active entry
    ///
    /// Its chain neighbours are linked to each other, so sibling variants
    /// stay resolvable.
    pub fn remove(&mut self, slot: usize) -> ArchiveResult<()> {
        let Some(entry) = self.entries.get(slot) else {
            return Err(ArchiveError::InvalidEntry {
                slot,
                reason: "slot is outside the table".to_string(),
            });
        };
        if !entry.is_active() {
            return Err(ArchiveError::InvalidEntry {
                slot,
                reason: "slot is not active".to_string(),
            });
        }

        let (prev, next) = (entry.prev, entry.next);
        let this = Some(slot as u32);

        if let Some(p) = prev.and_then(|p| self.entries.get_mut(p as usize))
            && p.next == this
        {
            p.next = next;
        }
        if let Some(n) = next.and_then(|n| self.entries.get_mut(n as usize))
            && n.prev == this
        {
            n.prev = prev;
        }

        let deleted_head = self.deleted_head;
        let entry = &mut self.entries[slot];
        entry.flags |= flags::DELETED;
        entry.prev = None;
        entry.next = deleted_head;
        self.deleted_head = this;
        Ok(())
    }

    /// Record a removal marker for a variant that has no active entry
    ///
    /// The marker goes into the first never-used slot from its hash, so it
    /// neither takes over an existing tombstone nor shadows an active
    /// entry. The table is not grown; callers size it beforehand, since
    /// growing would drop the marker again.
    pub fn insert_tombstone(&mut self, mut entry: HashEntry) -> ArchiveResult<usize> {
        let hash = entry.name_hash();
        let slot = self
            .probe(hash)
            .find(|&slot| !self.entries[slot].is_occupied())
            .ok_or(ArchiveError::Alloc {
                count: self.capacity(),
            })?;

        entry.flags |= flags::USED | flags::DELETED;
        entry.prev = None;
        entry.next = self.deleted_head;
        self.entries[slot] = entry;
        self.deleted_head = Some(slot as u32);
        Ok(slot)
    }

    /// Double the table and rehash every active entry
    ///
    /// Tombstones are dropped, which empties the deleted list.
    pub fn grow(&mut self) -> ArchiveResult<()> {
        let old = self.capacity();
        let capacity = old
            .checked_mul(2)
            .ok_or(ArchiveError::Alloc { count: u32::MAX })?;
        debug!("growing hash table from {old} to {capacity} slots");

        let mut grown = Self::with_capacity(capacity)?;
        for (_, entry) in self.iter_active() {
            grown.place(entry.clone())?;
        }
        *self = grown;
        Ok(())
    }

    /// Describe every active entry
    pub fn debug_dump(&self) -> Vec<DebugEntry> {
        self.iter_active()
            .map(|(slot, entry)| DebugEntry {
                slot,
                name: entry.name.clone(),
                hash_a: entry.hash_a,
                hash_b: entry.hash_b,
                locale: entry.locale,
                platform: entry.platform,
                offset: entry.offset,
                packed_size: entry.packed_size,
                file_size: entry.file_size,
                flags: entry.flags,
            })
            .collect()
    }
}

/// One line of [`HashIndex::debug_dump`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugEntry {
    /// Slot index
    pub slot: usize,
    /// Stored path, when the archive retains names
    pub name: Option<String>,
    /// Verifier A
    pub hash_a: u32,
    /// Verifier B
    pub hash_b: u32,
    /// Locale
    pub locale: u16,
    /// Platform
    pub platform: Platform,
    /// Offset in blocks
    pub offset: u32,
    /// Stored size
    pub packed_size: u32,
    /// Unpacked size
    pub file_size: u32,
    /// Raw flags
    pub flags: u32,
}

impl fmt::Display for DebugEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6} {:08x}{:08x} {:>5} {:<8} {:>8} {:>10} {:>10} {:08x} {}",
            self.slot,
            self.hash_a,
            self.hash_b,
            self.locale,
            self.platform,
            self.offset,
            self.packed_size,
            self.file_size,
            self.flags,
            self.name.as_deref().unwrap_or("-"),
        )
    }
}
