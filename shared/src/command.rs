//! The command entity and its derived lifecycle state

use crate::state_machine::{self, CommandEvent, TransitionResult};

/// Lifecycle state, derived from the command's timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandState {
    /// Waiting in the queue, eligible for dispatch
    Pending,
    /// Handed to a worker, no final result yet
    Running,
    /// Final result received
    Terminal,
}

impl std::fmt::Display for CommandState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandState::Pending => write!(f, "pending"),
            CommandState::Running => write!(f, "running"),
            CommandState::Terminal => write!(f, "terminal"),
        }
    }
}

/// How a terminal command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Opaque reference used to route updates to whatever displays a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle(u64);

impl DisplayHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A shell command to run on a worker
#[derive(Debug, Clone)]
pub struct Command {
    pub id: u64,
    pub text: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Seconds since Unix epoch
    pub start_time: Option<f64>,
    /// Seconds since Unix epoch
    pub end_time: Option<f64>,
    /// Set once the command is first shown; never persisted
    pub display: Option<DisplayHandle>,
}

// Display handles carry no data of their own.
impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.text == other.text
            && self.exit_code == other.exit_code
            && self.stdout == other.stdout
            && self.stderr == other.stderr
            && self.start_time == other.start_time
            && self.end_time == other.end_time
    }
}

impl Command {
    /// Create a new pending command
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            start_time: None,
            end_time: None,
            display: None,
        }
    }

    pub fn state(&self) -> CommandState {
        match (self.start_time, self.end_time) {
            (_, Some(_)) => CommandState::Terminal,
            (Some(_), None) => CommandState::Running,
            (None, None) => CommandState::Pending,
        }
    }

    pub fn is_choosable(&self) -> bool {
        self.state() == CommandState::Pending
    }

    pub fn is_running(&self) -> bool {
        self.state() == CommandState::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.state() == CommandState::Terminal
    }

    /// Success or failure, once terminal
    pub fn outcome(&self) -> Option<Outcome> {
        if !self.is_terminal() {
            return None;
        }
        match self.exit_code {
            Some(0) => Some(Outcome::Succeeded),
            _ => Some(Outcome::Failed),
        }
    }

    /// Seconds spent running so far, or in total once terminal
    pub fn elapsed(&self, now: f64) -> Option<f64> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or(now);
        Some((end - start).max(0.0))
    }

    /// Mark the command as dispatched to a worker
    pub fn start(&mut self, now: f64) -> TransitionResult {
        let result = state_machine::process_event(self.state(), CommandEvent::Dispatched);
        if result.is_success() {
            self.start_time = Some(now);
        }
        result
    }

    /// Record the final result of a run
    pub fn finish(&mut self, exit_code: i32, now: f64) -> TransitionResult {
        let result = state_machine::process_event(self.state(), CommandEvent::Finished);
        if result.is_success() {
            self.exit_code = Some(exit_code);
            self.end_time = Some(now);
        }
        result
    }

    /// Clear every run result so the command becomes pending again
    pub fn restart(&mut self) -> TransitionResult {
        let result = state_machine::process_event(self.state(), CommandEvent::Restarted);
        if result.is_success() {
            self.exit_code = None;
            self.stdout.clear();
            self.stderr.clear();
            self.start_time = None;
            self.end_time = None;
        }
        result
    }

    /// Replace every mutable field with the ones from `other`.
    ///
    /// `id`, `text` and the display handle are kept.
    pub fn overwrite_from(&mut self, other: Command) {
        self.exit_code = other.exit_code;
        self.stdout = other.stdout;
        self.stderr = other.stderr;
        self.start_time = other.start_time;
        self.end_time = other.end_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_command_is_pending() {
        let cmd = Command::new(3, "echo hi");
        assert_eq!(cmd.state(), CommandState::Pending);
        assert!(cmd.is_choosable());
        assert!(cmd.stdout.is_empty());
        assert!(cmd.stderr.is_empty());
        assert_eq!(cmd.exit_code, None);
        assert_eq!(cmd.outcome(), None);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut cmd = Command::new(0, "true");

        assert!(cmd.start(10.0).is_success());
        assert!(cmd.is_running());
        assert!(!cmd.is_choosable());

        assert!(cmd.finish(0, 12.5).is_success());
        assert!(cmd.is_terminal());
        assert_eq!(cmd.outcome(), Some(Outcome::Succeeded));
        assert_eq!(cmd.elapsed(100.0), Some(2.5));
    }

    #[test]
    fn test_invalid_transitions_do_not_mutate() {
        let mut cmd = Command::new(0, "true");

        assert!(!cmd.finish(1, 5.0).is_success());
        assert_eq!(cmd.exit_code, None);
        assert_eq!(cmd.end_time, None);

        assert!(!cmd.restart().is_success());
        assert!(cmd.is_choosable());

        cmd.start(1.0);
        assert!(!cmd.start(2.0).is_success());
        assert_eq!(cmd.start_time, Some(1.0));
    }

    #[test]
    fn test_restart_clears_run_fields_only() {
        let mut cmd = Command::new(7, "make test");
        cmd.display = Some(DisplayHandle::new(4));
        cmd.start(1.0);
        cmd.stdout.push_str("ok\n");
        cmd.stderr.push_str("warning\n");
        cmd.finish(2, 3.0);
        assert_eq!(cmd.outcome(), Some(Outcome::Failed));

        assert!(cmd.restart().is_success());
        assert_eq!(cmd.id, 7);
        assert_eq!(cmd.text, "make test");
        assert_eq!(cmd.exit_code, None);
        assert!(cmd.stdout.is_empty());
        assert!(cmd.stderr.is_empty());
        assert_eq!(cmd.start_time, None);
        assert_eq!(cmd.end_time, None);
        assert_eq!(cmd.display, Some(DisplayHandle::new(4)));
        assert!(cmd.is_choosable());
    }

    #[test]
    fn test_elapsed_while_running() {
        let mut cmd = Command::new(0, "sleep 5");
        assert_eq!(cmd.elapsed(50.0), None);
        cmd.start(40.0);
        assert_eq!(cmd.elapsed(50.0), Some(10.0));
    }

    #[test]
    fn test_overwrite_keeps_identity() {
        let mut stored = Command::new(1, "ls");
        stored.display = Some(DisplayHandle::new(9));
        stored.start(1.0);

        let mut reported = Command::new(1, "something else");
        reported.start_time = Some(1.5);
        reported.stdout = "a\nb\n".into();

        stored.overwrite_from(reported);
        assert_eq!(stored.text, "ls");
        assert_eq!(stored.stdout, "a\nb\n");
        assert_eq!(stored.start_time, Some(1.5));
        assert_eq!(stored.display, Some(DisplayHandle::new(9)));
    }

    #[test]
    fn test_equality_ignores_display_handle() {
        let a = Command::new(1, "ls");
        let mut b = a.clone();
        b.display = Some(DisplayHandle::new(1));
        assert_eq!(a, b);
    }
}
