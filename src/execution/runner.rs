//! Runs one assigned command from spawn to final report

use super::reader::read_output;
use super::sender::send_partial_reports;
use crate::client::{CoordinatorLink, ReportResponse};
use crate::config::WorkerConfig;
use crate::interrupt::{InterruptPrompt, Interrupts};
use crate::progress::Spinner;
use fanout_shared::{now_secs, Command, Snapshot};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Exit code reported when the shell itself cannot be started
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Result of running one command
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The command as last reported
    pub command: Command,
    /// False when the operator asked the worker to stop
    pub continue_polling: bool,
}

/// Executes assigned commands and reports their progress
pub struct CommandRunner {
    link: Arc<dyn CoordinatorLink>,
    report_interval: Duration,
    read_poll: Duration,
    request_delay: Duration,
}

impl CommandRunner {
    pub fn new(link: Arc<dyn CoordinatorLink>, config: &WorkerConfig) -> Self {
        Self {
            link,
            report_interval: config.report_interval,
            read_poll: config.read_poll,
            request_delay: config.request_delay,
        }
    }

    /// Run `assigned` to completion and deliver its final report
    pub async fn run(
        &self,
        assigned: Command,
        interrupts: &mut Interrupts,
        prompt: &mut dyn InterruptPrompt,
    ) -> RunOutcome {
        let mut command = assigned;
        // Assignments carry no timestamps; the run starts here
        if !command.start(now_secs()).is_success() {
            warn!(id = command.id, "Assigned command is not pending ({})", command.state());
        }
        info!(id = command.id, "Running: {}", command.text);

        let mut child = match spawn_shell(&command.text) {
            Ok(child) => child,
            Err(e) => {
                error!(id = command.id, "Failed to start command: {}", e);
                command.stderr = format!("Failed to start command: {}\n", e);
                command.finish(SPAWN_FAILURE_EXIT_CODE, now_secs());
                self.send_final(&command).await;
                return RunOutcome {
                    command,
                    continue_polling: true,
                };
            }
        };

        let stdout: Box<dyn AsyncRead + Unpin + Send> = match child.stdout.take() {
            Some(pipe) => Box::new(pipe),
            None => Box::new(tokio::io::empty()),
        };
        let stderr: Box<dyn AsyncRead + Unpin + Send> = match child.stderr.take() {
            Some(pipe) => Box::new(pipe),
            None => Box::new(tokio::io::empty()),
        };

        let id = command.id;
        let shared = Arc::new(Mutex::new(command));
        let (stop_tx, stop_rx) = watch::channel(false);
        let (reject_tx, mut reject_rx) = mpsc::channel(1);

        let mut reader = tokio::spawn(read_output(stdout, stderr, shared.clone(), stop_rx.clone()));
        let sender = tokio::spawn(send_partial_reports(
            self.link.clone(),
            shared.clone(),
            self.report_interval,
            stop_rx,
            reject_tx,
        ));

        let mut continue_polling = true;
        let mut rejections_open = true;
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                _ = interrupts.recv() => {
                    let choice = prompt.ask();
                    info!(id, "Operator chose {:?}", choice);
                    if choice.stops_worker() {
                        continue_polling = false;
                    }
                    if choice.kills_command() {
                        kill_child(&mut child);
                    }
                }
                rejection = reject_rx.recv(), if rejections_open => match rejection {
                    Some(rejection) => {
                        error!(id, "Coordinator {}; killing command", rejection);
                        kill_child(&mut child);
                        rejections_open = false;
                    }
                    None => rejections_open = false,
                },
            }
        };

        let exit_code = match status {
            Ok(status) => exit_code_of(status),
            Err(e) => {
                error!(id, "Failed to wait for command: {}", e);
                -1
            }
        };

        // Give the pipes a bounded chance to drain
        let drained = match timeout(self.read_poll, &mut reader).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    error!(id, "Output reader failed: {}", e);
                }
                true
            }
            Err(_) => false,
        };

        shared.lock().await.finish(exit_code, now_secs());
        let _ = stop_tx.send(true);

        if !drained {
            if let Err(e) = reader.await {
                error!(id, "Output reader failed: {}", e);
            }
        }
        if let Err(e) = sender.await {
            error!(id, "Progress sender failed: {}", e);
        }

        let command = shared.lock().await.clone();
        self.send_final(&command).await;
        info!(id, exit_code, "Command finished");

        RunOutcome {
            command,
            continue_polling,
        }
    }

    /// Deliver the final report, retrying until the coordinator answers
    async fn send_final(&self, command: &Command) {
        let snapshot = Snapshot::report(command);
        let mut spinner: Option<Spinner> = None;

        loop {
            match self.link.report(&snapshot).await {
                Ok(ReportResponse::Accepted) => break,
                Ok(rejection) => {
                    error!(id = command.id, "Final report {}", rejection);
                    break;
                }
                Err(e) => {
                    if spinner.is_none() {
                        warn!(id = command.id, "Final report not delivered: {}", e);
                        spinner = Some(Spinner::new("Retrying"));
                    }
                    if let Some(spinner) = &spinner {
                        spinner.tick();
                    }
                    sleep(self.request_delay).await;
                }
            }
        }
    }
}

/// Start `sh -c text` in its own process group
fn spawn_shell(text: &str) -> std::io::Result<Child> {
    let mut shell = tokio::process::Command::new("sh");
    shell
        .arg("-c")
        .arg(text)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Keeps the terminal's Ctrl-C away from the child
    #[cfg(unix)]
    shell.process_group(0);
    shell.spawn()
}

/// Kill the child and everything it started
fn kill_child(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain syscall; the child leads its own process group
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!("killpg({}) failed: {}", pid, std::io::Error::last_os_error());
            }
        }
    }
    if let Err(e) = child.start_kill() {
        debug!("Failed to kill child: {}", e);
    }
}

/// Exit code, or `128 + signal` for children killed by a signal
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_codes() {
        let status = spawn_shell("exit 3").unwrap().wait().await.unwrap();
        assert_eq!(exit_code_of(status), 3);

        let status = spawn_shell("kill -9 $$").unwrap().wait().await.unwrap();
        assert_eq!(exit_code_of(status), 128 + 9);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_child_ends_process_group() {
        let mut child = spawn_shell("sleep 30 & sleep 30; wait").unwrap();
        kill_child(&mut child);
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child should die")
            .unwrap();
        assert_eq!(exit_code_of(status), 128 + libc::SIGKILL);
    }
}
