//! fanout shared types
//!
//! This crate provides the command model, its lifecycle state machine and
//! the JSON wire codec used between the coordinator and its workers.

pub mod codec;
pub mod command;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

pub use codec::{CodecError, Snapshot};
pub use command::{Command, CommandState, DisplayHandle, Outcome};
pub use state_machine::{CommandEvent, TransitionResult};

/// Get current timestamp in seconds since Unix epoch
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Default addresses and timing parameters shared by both sides
pub mod defaults {
    /// Address the coordinator listens on and workers connect to
    pub const ADDRESS: &str = "localhost";

    /// TCP port of the dispatch endpoint
    pub const PORT: u16 = 34923;

    /// Delay between polls while the coordinator is unreachable or idle
    pub const REQUEST_DELAY_MS: u64 = 300;

    /// Interval between partial reports of a running command
    pub const REPORT_INTERVAL_MS: u64 = 300;

    /// Upper bound on a single wait for child output
    pub const READ_POLL_MS: u64 = 100;

    /// Number of frames in the rotating progress indicator
    pub const PENDING_DOTS: usize = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_secs_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(now_secs() > 1_577_836_800.0);
    }

    #[test]
    fn test_now_secs_is_monotonic_enough() {
        let a = now_secs();
        let b = now_secs();
        assert!(b >= a);
    }
}
