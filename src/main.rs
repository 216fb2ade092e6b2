mod cli;
mod console;
mod error;
mod kubectl;
mod resolver;
mod streamer;
mod types;
mod utils;

use anyhow::Context;
use clap::Parser;
use std::io::IsTerminal;
use tracing::{error, info, warn};

use cli::Cli;
use console::{Console, print_messages};
use kubectl::Kubectl;
use streamer::Streamer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let kubectl = Kubectl::new(cli.kubectl.clone(), cli.context.clone(), cli.log_flags());

    let pods = resolver::resolve(
        &kubectl,
        &cli.patterns,
        cli.container_filter(),
        &cli.namespace,
    )
    .await
    .with_context(|| format!("Failed to resolve pods in namespace {}", cli.namespace))?;

    info!("kubelogs for {} pod(s)", pods.len());

    let color = !cli.no_color && std::io::stdout().is_terminal();
    let (console, log_rx) = Console::channel(cli.buffer_size);
    let printer = tokio::spawn(print_messages(log_rx, std::io::stdout(), color));

    let mut streamer = Streamer::new(&kubectl, cli.namespace.clone(), console);
    if let Some(max) = cli.max_concurrent {
        streamer = streamer.with_max_concurrent(max as usize);
    }
    let summary = streamer.stream(&pods).await;
    // Closes the console so the printer drains and finishes.
    drop(streamer);

    match printer.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("Failed to write log output: {}", e),
        Err(e) => warn!("Log printer stopped: {}", e),
    }

    info!(
        "{} of {} log streams exited cleanly",
        summary.exited(),
        summary.total()
    );
    let failed: Vec<String> = summary
        .failed()
        .map(|r| format!("{}/{}", r.pod_name, r.container_name))
        .collect();
    if !failed.is_empty() {
        warn!("Log streams that failed: {}", failed.join(", "));
    }
    Ok(())
}
