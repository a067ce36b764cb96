//! fanout worker
//!
//! Polls a coordinator for shell commands, runs them one at a time and
//! streams their output back while they run.

pub mod client;
pub mod config;
pub mod execution;
pub mod interrupt;
pub mod poll;
pub mod progress;

pub use client::{ClientError, CoordinatorLink, HttpCoordinator, PollResponse, ReportResponse};
pub use config::WorkerConfig;
pub use execution::{CommandRunner, RunOutcome};
pub use interrupt::{InterruptChoice, InterruptPrompt, Interrupts, ScriptedPrompt, StdinPrompt};
pub use poll::{Worker, WorkerSummary};
