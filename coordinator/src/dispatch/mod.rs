//! Dispatch service for the coordinator
//!
//! This module handles:
//! - Answering worker polls with the next command to run
//! - Applying partial and final reports to the store
//! - Serving both over HTTP

mod routes;
mod service;

pub use routes::{build_router, serve, DispatchError};
pub use service::{CommandDispatcher, SharedStore};
