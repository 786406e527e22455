use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cache-warmer",
    about = "Keeps a shared cache warm in front of a rate-limited HTTP API",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CACHE_WARMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Redis connection URL, overrides the configuration file
    #[arg(long, global = true, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Use an in-process store instead of Redis (single instance only)
    #[arg(long, global = true)]
    pub memory: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run warming cycles until interrupted
    Run,

    /// Run a single warming cycle and exit
    Once,

    /// Resolve one key through the cache, printing the body to stdout
    Resolve {
        /// Cache key, e.g. standings:2025-11-23
        key: String,

        /// Upstream URL for the key
        url: String,

        /// Read the cache first and retry throttled fetches with the refill backoff
        #[arg(long)]
        cached: bool,

        /// Do not require the body to be JSON
        #[arg(long)]
        raw: bool,
    },

    /// Configuration management
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}
