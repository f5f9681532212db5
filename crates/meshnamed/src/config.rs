//! Configuration for meshnamed

use clap::Parser;
use meshname_core::PeerName;
use std::path::PathBuf;

/// meshnamed - gossip-replicated nameserver daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "meshnamed")]
#[command(about = "Gossip-replicated authoritative nameserver for the meshname overlay")]
pub struct Config {
    /// Stable peer name in MAC form, e.g. 00:00:00:02:00:00
    #[arg(short, long, env = "MESHNAME_PEER_NAME")]
    pub peer_name: PeerName,

    /// Data directory for the journal
    #[arg(short, long, default_value = "./data/meshnamed")]
    pub data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.log_format != "json" && self.log_format != "pretty" {
            anyhow::bail!("log format must be \"json\" or \"pretty\"");
        }
        Ok(())
    }
}
