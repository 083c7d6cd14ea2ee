use crate::OutputFormat;
use anyhow::{Context, Result};
use lpk_archive::{ArchiveConfig, LpkArchive};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ArchiveInfo {
    path: String,
    version: u16,
    archive_size: u32,
    block_size: u64,
    hash_table_offset: u32,
    hash_table_count: u32,
    deleted_head: Option<u32>,
    active: usize,
    deleted: usize,
}

pub fn handle(path: &Path, config: ArchiveConfig, format: OutputFormat) -> Result<()> {
    let archive = LpkArchive::open_with(path, config)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let header = archive.header();

    let info = ArchiveInfo {
        path: path.display().to_string(),
        version: header.version,
        archive_size: header.archive_size,
        block_size: header.block_bytes(),
        hash_table_offset: header.hash_table_offset,
        hash_table_count: header.hash_table_count,
        deleted_head: header.deleted_hash,
        active: archive.count_used(),
        deleted: archive.index().count_deleted(),
    };

    if let Some(json) = format.render_json(&info)? {
        println!("{json}");
    } else {
        println!("Archive:        {}", info.path);
        println!("Version:        {}", info.version);
        println!("Size:           {} bytes", info.archive_size);
        println!("Block size:     {} bytes", info.block_size);
        println!(
            "Hash table:     {} slots at offset {}",
            info.hash_table_count, info.hash_table_offset
        );
        println!("Active entries: {}", info.active);
        println!("Tombstones:     {}", info.deleted);
    }

    archive.close()?;
    Ok(())
}
