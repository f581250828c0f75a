//! Mode dispatch: turn a parsed [`Cli`] into a running tail.

use crate::cli::{Cli, Command};
use crate::error::TailError;
use crate::scheduler::PollScheduler;
use crate::shutdown::{self, Shutdown};
use crate::snapshot::snapshot;
use crate::tracker::{MarkerTracker, TrackerConfig};
use rdstail_core::config::Config;
use rdstail_core::Reassembler;
use rdstail_sinks::{ConsoleSink, Sink, SyslogSink, SyslogSinkConfig};
use rdstail_source::{HttpLogSource, LogSource};
use tracing::info;

/// Load configuration, apply flags and validate. Every configuration error
/// surfaces here, before any network traffic.
pub fn resolve_config(cli: &Cli) -> Result<Config, TailError> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    match &cli.command {
        Command::Tail(_) => {
            config.instance()?;
        }
        Command::Watch(_) => {
            config.validate_poll()?;
            Reassembler::new(&config.poll.prefix)?;
        }
        Command::Papertrail(_) => {
            config.validate_poll()?;
            config.collector_address()?;
            Reassembler::new(&config.poll.prefix)?;
        }
    }
    Ok(config)
}

pub async fn run(cli: Cli) -> Result<(), TailError> {
    let config = resolve_config(&cli)?;
    let source = HttpLogSource::new(&config.source);

    match &cli.command {
        Command::Tail(args) => {
            let mut out = ConsoleSink::stdout();
            snapshot(&source, config.instance()?, args.lines, &mut out).await?;
            Ok(())
        }
        Command::Watch(_) => follow(source, &config, ConsoleSink::stdout()).await,
        Command::Papertrail(_) => {
            let address = config.collector_address()?;
            let sink = SyslogSink::connect(SyslogSinkConfig::resolve(&config.collector, address)).await?;
            follow(source, &config, sink).await
        }
    }
}

/// Run the poll scheduler on a background task until it stops or the user
/// interrupts twice.
pub async fn follow<S, K>(source: S, config: &Config, sink: K) -> Result<(), TailError>
where
    S: LogSource + 'static,
    K: Sink + 'static,
{
    let instance = config.instance()?.to_string();
    let tracker = MarkerTracker::new(source, instance, TrackerConfig::from_config(&config.source, &config.poll));
    let reassembler = Reassembler::new(&config.poll.prefix)?;
    let scheduler = PollScheduler::new(tracker, reassembler, sink, config.poll.rate);

    let shutdown = Shutdown::new();
    let interrupts = shutdown::forward_interrupts();
    let task = tokio::spawn(scheduler.run(shutdown.token()));

    let summary = shutdown::supervise(task, shutdown, interrupts).await?;
    info!(
        entries = summary.entries,
        rotations = summary.rotations,
        transient_failures = summary.transient_failures,
        "done"
    );
    Ok(())
}
