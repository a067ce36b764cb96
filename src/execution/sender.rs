//! Periodic progress reports of a running command

use super::stop_requested;
use crate::client::{CoordinatorLink, ReportResponse};
use fanout_shared::{Command, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Report `command` every `every` while it is running.
///
/// Connection failures are retried on the next tick. A rejection is
/// forwarded on `rejected` and ends the task.
pub async fn send_partial_reports(
    link: Arc<dyn CoordinatorLink>,
    command: Arc<Mutex<Command>>,
    every: Duration,
    mut stop: watch::Receiver<bool>,
    rejected: mpsc::Sender<ReportResponse>,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_requested(&mut stop) => break,
        }

        let snapshot = {
            let cmd = command.lock().await;
            if !cmd.is_running() {
                break;
            }
            Snapshot::report(&cmd)
        };

        let reply = tokio::select! {
            reply = link.report(&snapshot) => reply,
            _ = stop_requested(&mut stop) => break,
        };

        match reply {
            Ok(ReportResponse::Accepted) => {}
            Ok(rejection) => {
                warn!(id = snapshot.id, "Progress report {}", rejection);
                let _ = rejected.send(rejection).await;
                break;
            }
            Err(e) => debug!(id = snapshot.id, "Progress report not delivered: {}", e),
        }
    }
}
