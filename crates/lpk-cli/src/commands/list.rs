use crate::OutputFormat;
use anyhow::{Context, Result};
use lpk_archive::{ArchiveConfig, LpkArchive};
use std::path::Path;

pub fn handle(path: &Path, config: ArchiveConfig, format: OutputFormat) -> Result<()> {
    let archive = LpkArchive::open_with(path, config)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let entries = archive.debug_dump();

    if let Some(json) = format.render_json(&entries)? {
        println!("{json}");
    } else {
        println!(
            "{:>6} {:<16} {:>5} {:<8} {:>8} {:>10} {:>10} {:<8} name",
            "slot", "hash", "lcid", "platform", "block", "packed", "size", "flags"
        );
        for entry in &entries {
            println!("{entry}");
        }
        println!("{} entries", entries.len());
    }

    archive.close()?;
    Ok(())
}
