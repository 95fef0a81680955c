use std::path::PathBuf;

use clap::Parser;

/// relaymux request router
#[derive(Debug, Parser)]
#[command(name = "relaymux", about = "Multi-provider LLM request router and protocol gateway")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relaymux.toml", env = "RELAYMUX_CONFIG")]
    pub config: PathBuf,
}
