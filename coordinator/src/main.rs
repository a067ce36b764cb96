use anyhow::Context;
use clap::Parser;
use fanout_coordinator::config::{Cli, CoordinatorConfig};
use fanout_coordinator::console::ConsoleExit;
use fanout_coordinator::{console, dispatch, CommandDispatcher, CommandStore, ConsoleDisplay, DataDir};
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = CoordinatorConfig::from(Cli::parse());

    let data_dir = DataDir::open(&config.data_dir)
        .with_context(|| format!("cannot open data directory {}", config.data_dir.display()))?;
    let mut store = CommandStore::open(data_dir, Box::new(ConsoleDisplay::new()))
        .context("cannot load the command queue")?;

    if let Some(path) = &config.load {
        let added = store.add_from_file(path);
        info!("Queued {} command(s) from {}", added.len(), path.display());
    }

    let dispatcher = CommandDispatcher::new(store);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("cannot listen on {}", config.bind_addr()))?;
    info!("Coordinator listening on http://{}", listener.local_addr()?);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Ctrl-C stops the coordinator
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = ctrl_c_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    // So does "quit" on the operator console; closed stdin only ends the console
    if config.console {
        let store = dispatcher.store();
        let console_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            match console::run(BufReader::new(tokio::io::stdin()), store).await {
                ConsoleExit::Quit => {
                    let _ = console_tx.send(true);
                }
                ConsoleExit::InputClosed => info!("Console input closed; still serving"),
            }
        });
    }

    let shutdown = async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        info!("Shutting down...");
    };

    dispatch::serve(listener, dispatcher.clone(), shutdown)
        .await
        .context("dispatch server failed")?;

    let counts = dispatcher.store().lock().await.counts();
    if counts.running > 0 {
        warn!(
            "{} command(s) still running; they stay marked running until restarted",
            counts.running
        );
    }
    info!("Coordinator stopped");
    Ok(())
}
