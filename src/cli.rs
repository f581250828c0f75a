//! Command-line surface.
//!
//! Flags override the layered configuration; anything left unset keeps the
//! value from the config file, the environment or the built-in defaults.

use clap::{Args, Parser, Subcommand};
use rdstail_core::config::{self, Config};
use std::path::PathBuf;
use std::time::Duration;

/// Follow a managed database's rotating log files as one continuous stream.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "rdstail", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/rdstail/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Database instance identifier.
    #[arg(short, long, global = true)]
    pub instance: Option<String>,

    /// Base URL of the log API.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Retry budget for each log API call.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Follow the logs and print them.
    Watch(WatchArgs),
    /// Follow the logs and forward them to a syslog collector.
    #[command(name = "papertrail", alias = "forward")]
    Papertrail(ForwardArgs),
    /// Print the end of the current log file and exit.
    Tail(TailArgs),
}

/// Options shared by the follow modes.
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct FollowArgs {
    /// Poll interval, e.g. `3s` or `500ms`.
    #[arg(short, long, value_parser = parse_rate)]
    pub rate: Option<Duration>,

    /// Regex marking the first line of each entry. Lines that do not match
    /// continue the previous entry.
    #[arg(short, long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct WatchArgs {
    #[command(flatten)]
    pub follow: FollowArgs,

    /// Show the last N lines of the current file before following.
    #[arg(long)]
    pub backfill: Option<u64>,

    /// Read the current file from its beginning.
    #[arg(long)]
    pub from_start: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ForwardArgs {
    /// Collector address, HOST:PORT.
    #[arg(short = 'd', long = "collector")]
    pub collector: String,

    /// APP-NAME written into each syslog message.
    #[arg(short, long)]
    pub app: Option<String>,

    /// HOSTNAME written into each syslog message.
    #[arg(long)]
    pub hostname: Option<String>,

    #[command(flatten)]
    pub follow: FollowArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TailArgs {
    /// Number of lines to print; 0 prints the whole file.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub lines: u64,
}

fn parse_rate(s: &str) -> Result<Duration, String> {
    config::parse_duration(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Layer the flags over `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(instance) = &self.instance {
            config.instance = Some(instance.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            config.source.endpoint = endpoint.clone();
        }
        if let Some(max_retries) = self.max_retries {
            config.source.max_retries = max_retries;
        }

        match &self.command {
            Command::Watch(args) => {
                args.follow.apply(config);
                if let Some(backfill) = args.backfill {
                    config.poll.backfill_lines = backfill;
                }
                if args.from_start {
                    config.poll.from_start = true;
                }
            }
            Command::Papertrail(args) => {
                args.follow.apply(config);
                config.collector.address = Some(args.collector.clone());
                if let Some(app) = &args.app {
                    config.collector.app_name = app.clone();
                }
                if let Some(hostname) = &args.hostname {
                    config.collector.hostname = Some(hostname.clone());
                }
            }
            Command::Tail(_) => {}
        }
    }
}

impl FollowArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(rate) = self.rate {
            config.poll.rate = rate;
        }
        if let Some(prefix) = &self.prefix {
            config.poll.prefix = prefix.clone();
        }
    }
}
