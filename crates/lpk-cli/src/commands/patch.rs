use crate::OutputFormat;
use anyhow::{Context, Result};
use lpk_archive::{AccessMode, ArchiveConfig, LpkArchive};
use std::path::Path;

pub fn handle(
    path: &Path,
    patch_path: &Path,
    config: ArchiveConfig,
    format: OutputFormat,
) -> Result<()> {
    let patch = LpkArchive::open_with(patch_path, config.clone())
        .with_context(|| format!("cannot open patch {}", patch_path.display()))?;
    let mut archive = LpkArchive::open_with(path, config.with_access(AccessMode::ReadWrite))
        .with_context(|| format!("cannot open {} for writing", path.display()))?;

    let stats = archive
        .apply_patch(&patch)
        .with_context(|| format!("cannot apply {}", patch_path.display()))?;

    match format.render_json(&stats)? {
        Some(json) => println!("{json}"),
        None => println!(
            "{} inserted, {} replaced, {} removed, {} removals without a match",
            stats.inserted, stats.replaced, stats.removed, stats.missing_removals
        ),
    }

    archive.close()?;
    patch.close()?;
    Ok(())
}
