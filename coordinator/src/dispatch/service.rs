//! Dispatcher answering worker polls and reports

use crate::store::CommandStore;
use fanout_shared::codec::{self, CodecError};
use fanout_shared::Snapshot;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Mutex;

/// The store, shared between request handlers and the operator console
pub type SharedStore = Arc<Mutex<CommandStore>>;

/// Answers polls and merges reports against the shared store.
///
/// The store lock is held for the whole of each step, selection and
/// marking included, so concurrent polls never receive the same command.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: SharedStore,
}

impl CommandDispatcher {
    /// Create a new command dispatcher owning `store`
    pub fn new(store: CommandStore) -> Self {
        Self::from_shared(Arc::new(Mutex::new(store)))
    }

    pub fn from_shared(store: SharedStore) -> Self {
        Self { store }
    }

    /// Get a handle on the underlying store
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Hand out the oldest choosable command, if any
    pub async fn poll(&self) -> Option<Snapshot> {
        let mut store = self.store.lock().await;
        blocking_io(|| store.dispatch())
    }

    /// Decode and apply a report; `Ok(false)` means it was dropped
    pub async fn report(&self, body: &[u8]) -> Result<bool, CodecError> {
        let snapshot = codec::decode(body)?;
        let mut store = self.store.lock().await;
        Ok(blocking_io(|| store.apply_report(snapshot)))
    }
}

/// Run a store step that writes to disk.
///
/// On the multi-threaded runtime the current worker hands its other tasks
/// off first; a current-thread runtime has nowhere to move them.
fn blocking_io<R>(step: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(step)
        }
        _ => step(),
    }
}
