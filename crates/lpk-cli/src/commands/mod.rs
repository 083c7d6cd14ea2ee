//! Command handlers

pub mod extract;
pub mod info;
pub mod list;
pub mod patch;
pub mod size;

use crate::{Command, OutputFormat};
use anyhow::Result;
use lpk_archive::ArchiveConfig;

/// Run one subcommand
pub fn handle(command: Command, config: ArchiveConfig, format: OutputFormat) -> Result<()> {
    match command {
        Command::Info { archive } => info::handle(&archive, config, format),
        Command::List { archive } => list::handle(&archive, config, format),
        Command::Size { archive, variant } => size::handle(&archive, &variant, config, format),
        Command::Extract {
            archive,
            variant,
            key,
            output,
        } => extract::handle(&archive, &variant, &key, output.as_deref(), config),
        Command::Patch { archive, patch } => patch::handle(&archive, &patch, config, format),
    }
}
