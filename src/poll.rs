//! Worker poll loop

use crate::client::{ClientError, CoordinatorLink, PollResponse};
use crate::config::WorkerConfig;
use crate::execution::CommandRunner;
use crate::interrupt::{InterruptPrompt, Interrupts, ScriptedPrompt};
use crate::progress::Spinner;
use fanout_shared::{Command, Outcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

/// What the loop is doing between commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollState {
    Idle,
    /// The coordinator cannot be reached
    Retrying,
    /// The coordinator has nothing to run
    Waiting,
}

impl PollState {
    fn label(&self) -> &'static str {
        match self {
            PollState::Idle => "",
            PollState::Retrying => "Retrying",
            PollState::Waiting => "Waiting for commands",
        }
    }
}

/// Tally of the commands a worker ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkerSummary {
    fn record(&mut self, command: &Command) {
        self.executed += 1;
        match command.outcome() {
            Some(Outcome::Succeeded) => self.succeeded += 1,
            _ => self.failed += 1,
        }
    }
}

/// Polls the coordinator and runs what it hands out, one command at a time
pub struct Worker {
    link: Arc<dyn CoordinatorLink>,
    runner: CommandRunner,
    request_delay: Duration,
    once: bool,
    interrupts: Interrupts,
    prompt: Box<dyn InterruptPrompt>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    /// Worker with no interrupt or shutdown source attached
    pub fn new(link: Arc<dyn CoordinatorLink>, config: &WorkerConfig) -> Self {
        let (_, interrupts) = Interrupts::channel();
        let (_, shutdown) = watch::channel(false);
        Self {
            runner: CommandRunner::new(link.clone(), config),
            link,
            request_delay: config.request_delay,
            once: config.once,
            interrupts,
            prompt: Box::new(ScriptedPrompt::default()),
            shutdown,
        }
    }

    /// Route operator interruptions to `prompt`
    pub fn with_interrupts(mut self, interrupts: Interrupts, prompt: Box<dyn InterruptPrompt>) -> Self {
        self.interrupts = interrupts;
        self.prompt = prompt;
        self
    }

    /// Stop polling once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Poll until told to stop
    pub async fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();
        let mut state = PollState::Idle;
        let mut spinner: Option<Spinner> = None;

        info!("Polling coordinator at {}", self.link.url());

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let response = tokio::select! {
                response = self.link.poll() => response,
                _ = self.interrupts.recv() => {
                    info!("Interrupted while idle");
                    break;
                }
                _ = shutdown_requested(&mut self.shutdown) => break,
            };

            let next = match response {
                Ok(PollResponse::Assigned(command)) => {
                    state = PollState::Idle;
                    spinner = None;

                    let outcome = self
                        .runner
                        .run(command, &mut self.interrupts, self.prompt.as_mut())
                        .await;
                    summary.record(&outcome.command);

                    if !outcome.continue_polling {
                        info!("Stopping at operator request");
                        break;
                    }
                    if self.once {
                        break;
                    }
                    continue;
                }
                Ok(PollResponse::NoWork) => PollState::Waiting,
                Ok(PollResponse::Unexpected { status, body }) => {
                    warn!(status, "Unexpected poll answer: {}", body);
                    PollState::Waiting
                }
                Err(ClientError::Decode(e)) => {
                    warn!("Malformed assignment: {}", e);
                    PollState::Waiting
                }
                Err(ClientError::Unreachable(e)) => {
                    if state != PollState::Retrying {
                        warn!("Coordinator at {} unreachable: {}", self.link.url(), e);
                    }
                    PollState::Retrying
                }
            };

            if next != state {
                if next == PollState::Waiting {
                    info!("No commands available");
                }
                state = next;
                spinner = Some(Spinner::new(state.label()));
            }
            if let Some(spinner) = &spinner {
                spinner.tick();
            }

            tokio::select! {
                _ = sleep(self.request_delay) => {}
                _ = self.interrupts.recv() => {
                    info!("Interrupted while idle");
                    break;
                }
                _ = shutdown_requested(&mut self.shutdown) => break,
            }
        }

        info!(
            executed = summary.executed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Worker stopped"
        );
        summary
    }
}

/// Resolves once `shutdown` is true; never if its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ReportResponse;
    use async_trait::async_trait;
    use fanout_shared::Snapshot;

    struct IdleLink;

    #[async_trait]
    impl CoordinatorLink for IdleLink {
        async fn poll(&self) -> Result<PollResponse, ClientError> {
            Ok(PollResponse::NoWork)
        }

        async fn report(&self, _snapshot: &Snapshot) -> Result<ReportResponse, ClientError> {
            Ok(ReportResponse::Accepted)
        }

        fn url(&self) -> &str {
            "idle"
        }
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            request_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = WorkerSummary::default();
        let mut ok = Command::new(0, "true");
        ok.start(1.0);
        ok.finish(0, 2.0);
        let mut bad = Command::new(1, "false");
        bad.start(1.0);
        bad.finish(1, 2.0);

        summary.record(&ok);
        summary.record(&bad);
        assert_eq!(
            summary,
            WorkerSummary {
                executed: 2,
                succeeded: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_ends_idle_loop() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Worker::new(Arc::new(IdleLink), &fast_config()).with_shutdown(shutdown_rx);
        let running = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("worker should stop")
            .unwrap();
        assert_eq!(summary.executed, 0);
    }

    #[tokio::test]
    async fn test_interrupt_while_idle_stops() {
        let (interrupt_tx, interrupts) = Interrupts::channel();
        let worker = Worker::new(Arc::new(IdleLink), &fast_config())
            .with_interrupts(interrupts, Box::new(ScriptedPrompt::default()));
        let running = tokio::spawn(worker.run());

        interrupt_tx.send(()).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("worker should stop")
            .unwrap();
        assert_eq!(summary, WorkerSummary::default());
    }
}
