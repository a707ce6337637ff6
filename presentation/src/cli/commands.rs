//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for consensus-server
#[derive(Parser, Debug)]
#[command(name = "consensus-server")]
#[command(author, version, about = "Metered multi-provider consensus generation service")]
#[command(long_about = r#"
consensus-server fans a topic out to several language-model providers and
merges their answers through three phases:
1. Drafting: every provider answers independently
2. Review: each draft is critiqued by another provider
3. Arbitration: one provider writes the final text

Each job is estimated and admitted against the account's token allowance
before it starts, and charged by actual usage when it finishes.

Configuration files are loaded from (in priority order):
1. CONSENSUS_<SECTION>__<KEY>   Environment variables
2. --config <path>              Explicit config file
3. ./consensus.toml             Project-level config
4. ~/.config/consensus-server/config.toml   Global config

Example:
  consensus-server --config ./consensus.toml
  consensus-server --bind 0.0.0.0:8080 -vv --json-logs
"#)]
pub struct Cli {
    /// Address to listen on (overrides server.bind)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit diagnostic logs as JSON (overrides logging.json)
    #[arg(long)]
    pub json_logs: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `tracing` filter derived from `-v`, if any was given
    pub fn verbosity_filter(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
