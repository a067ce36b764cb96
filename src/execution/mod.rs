//! Execution pipeline: spawn, collect output, report progress

mod reader;
mod runner;
mod sender;

pub use reader::{read_output, OutputDecoder};
pub use runner::{CommandRunner, RunOutcome, SPAWN_FAILURE_EXIT_CODE};
pub use sender::send_partial_reports;

use tokio::sync::watch;

/// Resolves once `stop` is raised or its sender is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    // The borrow guard must not outlive this call
    let _ = stop.wait_for(|stop| *stop).await.map(|_| ());
}
