use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use lpk_cli::{Command, OutputFormat, commands, config::load_config};

#[derive(Parser)]
#[command(
    name = "lpk",
    about = "Inspect, extract from and patch LPK asset archives",
    version,
    author,
    long_about = "A command-line tool for LPK packaged-asset archives: show header and index details, extract files by name, locale and platform, and merge patch archives."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true, env = "LPK_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so extracted data on stdout stays clean
    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    commands::handle(cli.command, config, cli.format)
}
