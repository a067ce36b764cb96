use anyhow::Context;
use clap::Parser;
use fanout_worker::config::{Cli, WorkerConfig};
use fanout_worker::{HttpCoordinator, Interrupts, StdinPrompt, Worker};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = WorkerConfig::from(Cli::parse());
    let link = HttpCoordinator::new(config.url()).context("cannot build HTTP client")?;

    // Ctrl-C goes through the worker: it stops an idle worker and asks the
    // operator what to do while a command runs
    let worker = Worker::new(Arc::new(link), &config)
        .with_interrupts(Interrupts::from_ctrl_c(), Box::new(StdinPrompt));

    info!("Worker starting");
    worker.run().await;
    Ok(())
}
