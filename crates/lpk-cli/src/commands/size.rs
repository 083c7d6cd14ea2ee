use crate::{OutputFormat, VariantArgs};
use anyhow::{Context, Result};
use lpk_archive::{ArchiveConfig, LpkArchive};
use std::path::Path;

pub fn handle(
    path: &Path,
    variant: &VariantArgs,
    config: ArchiveConfig,
    format: OutputFormat,
) -> Result<()> {
    let archive = LpkArchive::open_with(path, config)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let size = archive.file_size(&variant.name, variant.locale, variant.platform)?;

    let json = serde_json::json!({
        "name": variant.name,
        "locale": variant.locale,
        "platform": variant.platform,
        "size": size,
    });
    match format.render_json(&json)? {
        Some(json) => println!("{json}"),
        None => println!("{size}"),
    }

    archive.close()?;
    Ok(())
}
