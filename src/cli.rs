use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use encoding_rs::Encoding;

use crate::resolve::{Channel, Game};
use crate::zip::ExtractOptions;

#[derive(Parser, Debug)]
#[command(name = "streamzip")]
#[command(version)]
#[command(about = "Extract a multi-volume ZIP archive while it streams", long_about = None)]
#[command(after_help = "Examples:\n  \
  streamzip -d game https://cdn.example.com/game.zip.001 https://cdn.example.com/game.zip.002\n  \
  streamzip --preset genshin --type major -d \"Genshin Impact Game\"\n  \
  streamzip part1.zip.001 part1.zip.002 --no-verify")]
pub struct Cli {
    /// Volume URLs or paths, in archive order
    #[arg(value_name = "VOLUMES", required_unless_present = "preset")]
    pub volumes: Vec<String>,

    /// Resolve volumes from the launcher package API instead
    #[arg(long, value_enum, conflicts_with = "volumes")]
    pub preset: Option<Game>,

    /// Package to resolve with --preset
    #[arg(long = "type", value_enum, default_value_t = Channel::Major)]
    pub channel: Channel,

    /// Extract files into DIR
    #[arg(short = 'd', long, value_name = "DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Codepage for entry names not flagged as UTF-8
    #[arg(long, value_name = "LABEL", default_value = "gbk")]
    pub codepage: String,

    /// Skip CRC-32 verification
    #[arg(long)]
    pub no_verify: bool,

    /// Stop at the first entry that fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Retries when opening an HTTP volume fails
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub open_retries: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// The effective log filter: `-q` and `-qq` override `--log-level`.
    pub fn log_filter(&self) -> &str {
        match self.quiet {
            0 => &self.log_level,
            1 => "warn",
            _ => "error",
        }
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.codepage.as_bytes())
            .ok_or_else(|| anyhow!("Unknown codepage: {}", self.codepage))
    }

    pub fn extract_options(&self) -> Result<ExtractOptions> {
        Ok(ExtractOptions {
            output_dir: self.output_dir.clone(),
            codepage: self.encoding()?,
            verify: !self.no_verify,
            fail_fast: self.fail_fast,
        })
    }
}
