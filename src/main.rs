use clap::Parser;
use rdstail::cli::Cli;
use rdstail::exit::{codes, exit_code};
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    // stdout carries the tail itself; diagnostics go to stderr.
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    if let Err(e) = rdstail::app::run(cli).await {
        let code = exit_code(&e);
        if code != codes::ABORTED {
            eprintln!("rdstail: {e}");
        }
        std::process::exit(code);
    }
    Ok(())
}
