use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// End-to-end contract probe for the EduShareQA API
#[derive(Parser, Debug)]
#[command(name = "eduprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file to load instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, e.g. http://localhost:8080/api
    #[arg(long, global = true, env = "EDUPROBE_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "EDUPROBE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run scenarios (all of them when none are named)
    Run {
        /// Scenario names, see `eduprobe list`
        scenarios: Vec<String>,

        /// Fixed run suffix instead of a random one; needs exactly one scenario
        #[arg(long)]
        suffix: Option<String>,

        /// Skip the readiness probe
        #[arg(long)]
        no_wait: bool,
    },
    /// List built-in scenarios
    List,
    /// Wait until the service accepts connections
    Wait {
        /// Maximum probe attempts
        #[arg(long)]
        attempts: Option<u32>,

        /// Seconds between attempts
        #[arg(long)]
        interval: Option<u64>,
    },
}
