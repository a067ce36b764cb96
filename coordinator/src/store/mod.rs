//! Command queue and its durable mirror
//!
//! This module handles:
//! - The canonical, insertion-ordered list of commands
//! - FIFO selection of the next choosable command
//! - Merging worker reports (last writer wins)
//! - Mirroring every change to the data directory and notifying the display

mod ids;
mod persist;

pub use ids::IdGenerator;
pub use persist::{CommandRecord, DataDir, PersistError, COMMANDS_FILE, STDERR_DIR, STDOUT_DIR};

use crate::display::CommandDisplay;
use fanout_shared::{now_secs, Command, CommandState, Snapshot};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Rejected store operations. None of them change any state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Refusing to add an empty command")]
    EmptyCommand,

    #[error("No command with id {0}")]
    NotFound(u64),

    #[error("Command {0} is running and cannot be deleted")]
    StillRunning(u64),

    #[error("Command {id} is {state}, only finished commands can be restarted")]
    NotTerminal { id: u64, state: CommandState },

    #[error("No command ids left")]
    IdsExhausted,
}

/// Number of commands in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub terminal: usize,
}

/// The coordinator's command queue
pub struct CommandStore {
    commands: Vec<Command>,
    ids: IdGenerator,
    data_dir: DataDir,
    display: Box<dyn CommandDisplay>,
}

impl CommandStore {
    /// Load the queue from `data_dir` and show every command on `display`.
    ///
    /// Commands that were running when the coordinator stopped stay running
    /// until the operator restarts them.
    pub fn open(
        data_dir: DataDir,
        display: Box<dyn CommandDisplay>,
    ) -> Result<Self, PersistError> {
        let commands = data_dir.load()?;

        let mut ids = IdGenerator::new();
        for cmd in &commands {
            ids.observe(cmd.id);
            if cmd.is_running() {
                warn!(
                    id = cmd.id,
                    "command was running when the coordinator stopped; restart it to run it again"
                );
            }
        }

        info!(
            commands = commands.len(),
            next_id = ?ids.peek(),
            data_dir = %data_dir.root().display(),
            "store loaded"
        );

        let mut store = Self {
            commands,
            ids,
            data_dir,
            display,
        };
        for index in 0..store.commands.len() {
            store.notify(index);
        }
        Ok(store)
    }

    /// Append a new pending command
    pub fn add(&mut self, text: &str) -> Result<u64, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyCommand);
        }

        let id = self.ids.next_id().ok_or(StoreError::IdsExhausted)?;
        self.commands.push(Command::new(id, text));
        debug!(id, "command added");

        self.persist_metadata();
        self.notify(self.commands.len() - 1);
        Ok(id)
    }

    /// Add one command per non-blank line of a file.
    ///
    /// An unreadable file adds nothing and is not an error.
    pub fn add_from_file(&mut self, path: &Path) -> Vec<u64> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "command list not readable, ignoring");
                return Vec::new();
            }
        };

        contents
            .lines()
            .filter_map(|line| self.add(line).ok())
            .collect()
    }

    /// Mark the oldest choosable command as running and return its assignment
    pub fn dispatch(&mut self) -> Option<Snapshot> {
        let index = self.commands.iter().position(Command::is_choosable)?;

        let cmd = &mut self.commands[index];
        if !cmd.start(now_secs()).is_success() {
            return None;
        }
        let assignment = Snapshot::assignment(cmd);
        info!(id = cmd.id, "dispatched: {}", cmd.text);

        self.persist_metadata();
        self.notify(index);
        Some(assignment)
    }

    /// Replace a command's mutable fields with a worker report.
    ///
    /// Returns `false` when the report is dropped: the id is unknown, or the
    /// command was never dispatched. Only dispatch moves a command out of
    /// pending.
    pub fn apply_report(&mut self, snapshot: Snapshot) -> bool {
        let Some(index) = self.index_of(snapshot.id) else {
            debug!(id = snapshot.id, "report for unknown command dropped");
            // The last id would leave nothing to hand out
            if snapshot.id != u64::MAX {
                self.ids.observe(snapshot.id);
            }
            return false;
        };
        if self.commands[index].is_choosable() {
            debug!(id = snapshot.id, "report for pending command dropped");
            return false;
        }

        let is_final = snapshot.is_final();
        let cmd = &mut self.commands[index];
        cmd.overwrite_from(snapshot.into_command());
        if is_final {
            info!(id = cmd.id, exit_code = ?cmd.exit_code, "finished: {}", cmd.text);
        }

        self.persist_metadata();
        self.persist_output(index);
        self.notify(index);
        true
    }

    /// Remove a command that is not running
    pub fn delete(&mut self, id: u64) -> Result<Command, StoreError> {
        let index = self.index_of(id).ok_or(StoreError::NotFound(id))?;
        if self.commands[index].is_running() {
            return Err(StoreError::StillRunning(id));
        }

        let cmd = self.commands.remove(index);
        info!(id, "deleted: {}", cmd.text);

        self.persist_metadata();
        if let Err(e) = self.data_dir.remove_output(id) {
            error!(id, error = %e, "failed to delete output files");
        }
        if let Some(handle) = cmd.display {
            self.display.remove(handle);
        }
        Ok(cmd)
    }

    /// Send a finished command back to the queue
    pub fn restart(&mut self, id: u64) -> Result<(), StoreError> {
        let index = self.index_of(id).ok_or(StoreError::NotFound(id))?;
        let cmd = &mut self.commands[index];
        let state = cmd.state();
        if !cmd.restart().is_success() {
            return Err(StoreError::NotTerminal { id, state });
        }
        info!(id, "restarted: {}", cmd.text);

        self.persist_metadata();
        self.persist_output(index);
        self.notify(index);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    /// All commands in insertion order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for cmd in &self.commands {
            match cmd.state() {
                CommandState::Pending => counts.pending += 1,
                CommandState::Running => counts.running += 1,
                CommandState::Terminal => counts.terminal += 1,
            }
        }
        counts
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    fn index_of(&self, id: u64) -> Option<usize> {
        self.commands.iter().position(|c| c.id == id)
    }

    // The in-memory list is canonical; a failed write is logged, not propagated.
    fn persist_metadata(&self) {
        if let Err(e) = self.data_dir.save_metadata(&self.commands) {
            error!(error = %e, "failed to save command metadata");
        }
    }

    fn persist_output(&self, index: usize) {
        let cmd = &self.commands[index];
        if let Err(e) = self.data_dir.save_output(cmd) {
            error!(id = cmd.id, error = %e, "failed to save command output");
        }
    }

    fn notify(&mut self, index: usize) {
        let cmd = &mut self.commands[index];
        match cmd.display {
            Some(handle) => self.display.update(handle, cmd),
            None => {
                let handle = self.display.show(cmd);
                cmd.display = Some(handle);
            }
        }
    }
}
