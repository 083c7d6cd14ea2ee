//! Reader and patcher for LPK packaged-asset archives
//!
#![allow(clippy::cast_possible_truncation)] // On-disk fields are 32-bit
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! An LPK archive is a single file holding many named resources. Every
//! resource is addressed by a hashed path plus a locale and platform, and
//! may be compressed, encrypted, or both. Archives are upgraded in place by
//! merging patch archives into them.
//!
//! # File Layout
//!
//! - **Header**: 28 bytes at offset 0 ([`ArchiveHeader`])
//! - **Payloads**: block-aligned, one per entry
//! - **Hash table**: power-of-two array of [`HashEntry`] records
//!
//! After each patch the file also holds the superseded payloads and tables;
//! only the header points at the current table.
//!
//! # Example
//!
//! ```no_run
//! use lpk_archive::{LpkArchive, Platform};
//!
//! let archive = LpkArchive::open("assets.lpk")?;
//! let size = archive.file_size("sprites/hero.png", 0, Platform::Android)?;
//! let data = archive.extract("sprites/hero.png", None, 0, Platform::Android)?;
//! assert_eq!(data.len(), size as usize);
//! archive.close()?;
//! # Ok::<(), lpk_archive::ArchiveError>(())
//! ```

#![warn(missing_docs)]

pub mod archive;
pub mod builder;
pub mod compression;
pub mod config;
pub mod encryption;
pub mod entry;
pub mod error;
pub mod header;
pub mod index;
pub mod patch;

pub use archive::LpkArchive;
pub use builder::{ArchiveBuilder, FileSpec};
pub use compression::{Codec, CompressionAlgorithm, StoredCodec, ZlibCodec};
pub use config::{AccessMode, ArchiveConfig};
pub use encryption::EncryptionAlgorithm;
pub use entry::{ENTRY_SIZE, HashEntry, Platform, SlotState, flags};
pub use error::{ArchiveError, ArchiveResult, ErrorKind};
pub use header::{ArchiveHeader, HEADER_SIZE, LPK_MAGIC};
pub use index::{DebugEntry, HashIndex};
pub use patch::{ArchiveLayout, BlockCopy, PatchPlan, PatchStats, plan_patch};
