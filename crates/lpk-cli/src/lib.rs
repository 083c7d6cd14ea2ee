//! LPK command-line library
//!
//! This library provides the argument types and command handlers for the
//! `lpk` binary.

pub mod commands;
pub mod config;

use anyhow::{Context, Result, bail};
use clap::Args;
use lpk_archive::Platform;
use std::path::PathBuf;

/// Output format options for the CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl OutputFormat {
    /// Render a serializable value as JSON, or `None` for text output
    pub fn render_json<T: serde::Serialize>(self, value: &T) -> Result<Option<String>> {
        Ok(match self {
            Self::Text => None,
            Self::Json => Some(serde_json::to_string(value)?),
            Self::JsonPretty => Some(serde_json::to_string_pretty(value)?),
        })
    }
}

/// Selects one variant of a file
#[derive(Args, Clone, Debug)]
pub struct VariantArgs {
    /// Path of the file inside the archive
    pub name: String,

    /// Locale (Windows LCID, 0 = neutral)
    #[arg(short, long, default_value_t = 0)]
    pub locale: u16,

    /// Platform: default, ios, android, or a numeric code
    #[arg(short, long, default_value = "default")]
    pub platform: Platform,
}

/// Decryption key
#[derive(Args, Clone, Debug, Default)]
pub struct KeyArgs {
    /// Key as text
    #[arg(short, long, env = "LPK_KEY", conflicts_with = "key_hex")]
    pub key: Option<String>,

    /// Key as hex bytes
    #[arg(long)]
    pub key_hex: Option<String>,
}

impl KeyArgs {
    /// Key bytes, if one was given
    pub fn bytes(&self) -> Result<Option<Vec<u8>>> {
        match (&self.key, &self.key_hex) {
            (Some(_), Some(_)) => bail!("--key and --key-hex are mutually exclusive"),
            (Some(text), None) => Ok(Some(text.as_bytes().to_vec())),
            (None, Some(encoded)) => hex::decode(encoded.trim())
                .map(Some)
                .context("--key-hex is not valid hex"),
            (None, None) => Ok(None),
        }
    }
}

/// Subcommands of the `lpk` binary
#[derive(clap::Subcommand, Clone, Debug)]
pub enum Command {
    /// Show header fields and entry counts
    Info {
        /// Archive path
        archive: PathBuf,
    },

    /// List active entries
    List {
        /// Archive path
        archive: PathBuf,
    },

    /// Print the unpacked size of a file
    Size {
        /// Archive path
        archive: PathBuf,

        #[command(flatten)]
        variant: VariantArgs,
    },

    /// Extract a file
    Extract {
        /// Archive path
        archive: PathBuf,

        #[command(flatten)]
        variant: VariantArgs,

        #[command(flatten)]
        key: KeyArgs,

        /// Destination file (stdout when omitted)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },

    /// Merge a patch archive into an archive
    Patch {
        /// Archive to modify
        archive: PathBuf,

        /// Patch archive
        patch: PathBuf,
    },
}
