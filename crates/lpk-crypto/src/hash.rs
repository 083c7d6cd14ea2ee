//! Crypt-table name hashing for LPK hash tables
//!
//! Archive entries never store their path. Instead the normalised path is
//! hashed three times with the same rolling function, each run starting from
//! a different region of a 1280-word substitution table:
//!
//! - the table-index hash picks the first probe slot
//! - verifier A and verifier B confirm identity once a slot is reached
//!
//! The table is derived from a fixed linear congruential sequence and is
//! generated at compile time. This is a fingerprint, not a cryptographic hash.

use std::fmt;

/// Seed classes selecting a region of the crypt table
pub mod hash_tag {
    /// Table index (probe start)
    pub const TABLE_INDEX: u32 = 0x000;
    /// First verifier hash
    pub const NAME_A: u32 = 0x100;
    /// Second verifier hash
    pub const NAME_B: u32 = 0x200;
}

const CRYPT_TABLE_LEN: usize = 0x500;

const fn generate_crypt_table() -> [u32; CRYPT_TABLE_LEN] {
    let mut table = [0u32; CRYPT_TABLE_LEN];
    let mut seed: u32 = 0x0010_0001;

    let mut index1 = 0;
    while index1 < 0x100 {
        let mut index2 = index1;
        let mut i = 0;
        while i < 5 {
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let high = (seed & 0xFFFF) << 16;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let low = seed & 0xFFFF;

            table[index2] = high | low;

            i += 1;
            index2 += 0x100;
        }
        index1 += 1;
    }

    table
}

static CRYPT_TABLE: [u32; CRYPT_TABLE_LEN] = generate_crypt_table();

/// Normalise a lookup path: ASCII upper-case with `\` separators
pub fn normalize_path(path: &str) -> String {
    path.bytes()
        .map(|b| match b {
            b'/' => '\\',
            other => char::from(other.to_ascii_uppercase()),
        })
        .collect()
}

#[inline]
fn normalize_byte(b: u8) -> u8 {
    if b == b'/' { b'\\' } else { b.to_ascii_uppercase() }
}

/// Hash `path` using the crypt-table region selected by `tag`
///
/// Normalisation is applied on the fly, so `"a/b.png"` and `"A\\B.PNG"`
/// hash identically.
///
/// # Examples
///
/// ```
/// use lpk_crypto::hash::{hash_string, hash_tag};
///
/// assert_eq!(hash_string("arr\\units.dat", hash_tag::TABLE_INDEX), 0xF4E6_C69D);
/// ```
pub fn hash_string(path: &str, tag: u32) -> u32 {
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for b in path.bytes() {
        let ch = u32::from(normalize_byte(b));
        seed1 = CRYPT_TABLE[(tag + ch) as usize] ^ seed1.wrapping_add(seed2);
        seed2 = ch
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// The three hash projections of a normalised path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameHash {
    /// Table-index hash, determines the first probe slot
    pub slot: u32,
    /// Verifier A
    pub a: u32,
    /// Verifier B
    pub b: u32,
}

impl NameHash {
    /// Hash a path
    pub fn of(path: &str) -> Self {
        Self {
            slot: hash_string(path, hash_tag::TABLE_INDEX),
            a: hash_string(path, hash_tag::NAME_A),
            b: hash_string(path, hash_tag::NAME_B),
        }
    }

    /// Create from raw components
    pub const fn from_parts(slot: u32, a: u32, b: u32) -> Self {
        Self { slot, a, b }
    }

    /// Whether both verifiers match
    pub const fn same_name(&self, other: &Self) -> bool {
        self.a == other.a && self.b == other.b
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}:{:08x}", self.slot, self.a, self.b)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_crypt_table_first_words() {
        assert_eq!(CRYPT_TABLE[0], 0x55C6_36E2);
        assert_eq!(CRYPT_TABLE[1], 0x02BE_0170);
    }

    #[test]
    fn test_known_table_index_hashes() {
        assert_eq!(
            hash_string("arr\\units.dat", hash_tag::TABLE_INDEX),
            0xF4E6_C69D
        );
        assert_eq!(
            hash_string("unit\\neutral\\acritter.grp", hash_tag::TABLE_INDEX),
            0xA260_67F3
        );
    }

    #[test]
    fn test_normalization_is_applied() {
        assert_eq!(
            NameHash::of("sprites/hero.png"),
            NameHash::of("SPRITES\\HERO.PNG")
        );
        assert_eq!(normalize_path("Sprites/Hero.png"), "SPRITES\\HERO.PNG");
    }

    #[test]
    fn test_tags_are_independent() {
        let hash = NameHash::of("sprites/hero.png");
        assert_ne!(hash.slot, hash.a);
        assert_ne!(hash.a, hash.b);
    }

    #[test]
    fn test_different_names_differ() {
        let a = NameHash::of("sprites/hero.png");
        let b = NameHash::of("sprites/hero2.png");
        assert!(!a.same_name(&b));
    }

    #[test]
    fn test_empty_path_hash_is_seed() {
        assert_eq!(hash_string("", hash_tag::NAME_A), 0x7FED_7FED);
    }
}
