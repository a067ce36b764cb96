//! Display notification interface
//!
//! The store never renders anything itself. It tells a [`CommandDisplay`]
//! that a command appeared, changed or went away, and keeps the opaque
//! [`DisplayHandle`] the display hands back.

use fanout_shared::{now_secs, Command, CommandState, DisplayHandle, Outcome};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::info;

/// Receives "command changed" notifications from the store
pub trait CommandDisplay: Send {
    /// A command is shown for the first time; returns its handle
    fn show(&mut self, command: &Command) -> DisplayHandle;

    /// A command already shown has changed
    fn update(&mut self, handle: DisplayHandle, command: &Command);

    /// A command was deleted
    fn remove(&mut self, handle: DisplayHandle);
}

/// Display that ignores every notification
#[derive(Debug, Default)]
pub struct NullDisplay {
    next_handle: u64,
}

impl CommandDisplay for NullDisplay {
    fn show(&mut self, _command: &Command) -> DisplayHandle {
        self.next_handle += 1;
        DisplayHandle::new(self.next_handle)
    }

    fn update(&mut self, _handle: DisplayHandle, _command: &Command) {}

    fn remove(&mut self, _handle: DisplayHandle) {}
}

/// Logs one line each time a command changes state
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    next_handle: u64,
    last_state: HashMap<DisplayHandle, CommandState>,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandDisplay for ConsoleDisplay {
    fn show(&mut self, command: &Command) -> DisplayHandle {
        self.next_handle += 1;
        let handle = DisplayHandle::new(self.next_handle);
        self.last_state.insert(handle, command.state());
        info!(id = command.id, state = %command.state(), "{}", command.text);
        handle
    }

    fn update(&mut self, handle: DisplayHandle, command: &Command) {
        let state = command.state();
        if self.last_state.insert(handle, state) == Some(state) {
            return;
        }
        info!(id = command.id, "{}", status_line(command));
    }

    fn remove(&mut self, handle: DisplayHandle) {
        self.last_state.remove(&handle);
    }
}

/// Events forwarded by [`ChannelDisplay`]
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Shown {
        handle: DisplayHandle,
        command: Command,
    },
    Updated {
        handle: DisplayHandle,
        command: Command,
    },
    Removed {
        handle: DisplayHandle,
    },
}

/// Forwards every notification on a channel, for a UI running elsewhere
pub struct ChannelDisplay {
    next_handle: u64,
    event_tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelDisplay {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_handle: 0,
                event_tx,
            },
            event_rx,
        )
    }
}

impl CommandDisplay for ChannelDisplay {
    fn show(&mut self, command: &Command) -> DisplayHandle {
        self.next_handle += 1;
        let handle = DisplayHandle::new(self.next_handle);
        let _ = self.event_tx.send(DisplayEvent::Shown {
            handle,
            command: command.clone(),
        });
        handle
    }

    fn update(&mut self, handle: DisplayHandle, command: &Command) {
        let _ = self.event_tx.send(DisplayEvent::Updated {
            handle,
            command: command.clone(),
        });
    }

    fn remove(&mut self, handle: DisplayHandle) {
        let _ = self.event_tx.send(DisplayEvent::Removed { handle });
    }
}

/// Short human-readable status of a command
pub fn status_line(command: &Command) -> String {
    let status = match (command.state(), command.outcome()) {
        (CommandState::Pending, _) => "pending".to_string(),
        (CommandState::Running, _) => "running".to_string(),
        (CommandState::Terminal, Some(Outcome::Succeeded)) => "succeeded".to_string(),
        (CommandState::Terminal, _) => {
            format!("failed (exit {})", command.exit_code.unwrap_or(-1))
        }
    };
    match command.elapsed(now_secs()) {
        Some(secs) => format!("{} [{}] {}", status, format_elapsed(secs), command.text),
        None => format!("{} {}", status, command.text),
    }
}

/// Format a duration in seconds as `HH:MM:SS`
pub fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}
