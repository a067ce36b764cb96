//! fanout coordinator
//!
//! Holds the command queue, mirrors it to disk, and hands commands to
//! polling workers over HTTP.

pub mod config;
pub mod console;
pub mod dispatch;
pub mod display;
pub mod store;

pub use config::CoordinatorConfig;
pub use dispatch::{CommandDispatcher, SharedStore};
pub use display::{CommandDisplay, ConsoleDisplay};
pub use store::{CommandStore, DataDir, StoreError};
