//! Archive configuration loading
//!
//! The configuration file is TOML holding the fields of
//! [`ArchiveConfig`]; missing fields keep their defaults.
//!
//! ```toml
//! verify_checksums = true
//! default_encryption = "xxtea"
//! max_file_size = 268435456
//! ```

use anyhow::{Context, Result};
use lpk_archive::ArchiveConfig;
use std::path::Path;
use tracing::debug;

/// Parse a configuration document
pub fn parse_config(text: &str) -> Result<ArchiveConfig> {
    toml::from_str(text).context("invalid archive configuration")
}

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<ArchiveConfig> {
    let Some(path) = path else {
        return Ok(ArchiveConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse_config(&text).with_context(|| format!("in {}", path.display()))?;
    debug!("Loaded configuration from {}: {config:?}", path.display());
    Ok(config)
}
