//! Operator interruption of a running command
//!
//! Ctrl-C while a command runs does not reach the child (it lives in its own
//! process group). Instead the worker asks the operator what to do.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;
use tracing::error;

/// What the operator wants after an interruption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptChoice {
    /// Keep waiting for the current command
    Resume,
    /// Kill the current command and poll for the next one
    SkipCommand,
    /// Let the current command finish, then stop the worker
    StopAfterCommand,
    /// Kill the current command and stop the worker
    StopNow,
}

impl InterruptChoice {
    /// Map an answer to a choice; anything unrecognized resumes
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "2" | "s" | "skip" => InterruptChoice::SkipCommand,
            "3" | "f" | "finish" => InterruptChoice::StopAfterCommand,
            "4" | "k" | "kill" => InterruptChoice::StopNow,
            _ => InterruptChoice::Resume,
        }
    }

    /// Whether the child must be killed
    pub fn kills_command(&self) -> bool {
        matches!(self, InterruptChoice::SkipCommand | InterruptChoice::StopNow)
    }

    /// Whether the worker stops once the command is over
    pub fn stops_worker(&self) -> bool {
        matches!(
            self,
            InterruptChoice::StopAfterCommand | InterruptChoice::StopNow
        )
    }
}

pub const MENU: &str = "\
Interrupted. What do you want to do?
  1) resume waiting for the current command
  2) kill the current command and take the next one
  3) finish the current command, then stop
  4) kill the current command and stop
> ";

/// Synchronous decision point called on interruption
pub trait InterruptPrompt: Send {
    fn ask(&mut self) -> InterruptChoice;
}

/// Asks on the terminal
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl InterruptPrompt for StdinPrompt {
    fn ask(&mut self) -> InterruptChoice {
        // Blocking terminal read; requires the multi-threaded runtime
        tokio::task::block_in_place(|| {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\n{}", MENU);
            let _ = stderr.flush();

            let mut answer = String::new();
            if let Err(e) = std::io::stdin().lock().read_line(&mut answer) {
                error!("Failed to read answer: {}", e);
            }
            InterruptChoice::parse(&answer)
        })
    }
}

/// Answers from a fixed list, then resumes
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<InterruptChoice>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = InterruptChoice>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl InterruptPrompt for ScriptedPrompt {
    fn ask(&mut self) -> InterruptChoice {
        self.answers.pop_front().unwrap_or(InterruptChoice::Resume)
    }
}

/// Stream of operator interruptions
pub struct Interrupts {
    rx: mpsc::UnboundedReceiver<()>,
}

impl Interrupts {
    /// Interruptions fed by hand
    pub fn channel() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Interruptions fed by Ctrl-C
    pub fn from_ctrl_c() -> Self {
        let (tx, interrupts) = Self::channel();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    break;
                }
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        interrupts
    }

    /// Wait for the next interruption; never resolves once the source is gone
    pub async fn recv(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
