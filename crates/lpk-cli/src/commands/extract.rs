use crate::{KeyArgs, VariantArgs};
use anyhow::{Context, Result};
use lpk_archive::{ArchiveConfig, LpkArchive};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub fn handle(
    path: &Path,
    variant: &VariantArgs,
    key: &KeyArgs,
    output: Option<&Path>,
    config: ArchiveConfig,
) -> Result<()> {
    let key = key.bytes()?;
    let archive = LpkArchive::open_with(path, config)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let data = archive
        .extract(
            &variant.name,
            key.as_deref(),
            variant.locale,
            variant.platform,
        )
        .with_context(|| format!("cannot extract {}", variant.name))?;

    match output {
        Some(out) => {
            std::fs::write(out, &data)
                .with_context(|| format!("cannot write {}", out.display()))?;
            info!("Wrote {} bytes to {}", data.len(), out.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }

    archive.close()?;
    Ok(())
}
