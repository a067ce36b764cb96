//! JSON codec for the poll/report exchange
//!
//! Both directions carry the same flat snapshot:
//! ```text
//! { "id": 0, "text": "echo hi", "exit_code": null, "stdout": "", "stderr": "",
//!   "start_time": 1700000000.25, "end_time": null }
//! ```
//!
//! A poll answer only fills `id` and `text`; every other field is `null` and
//! must not be read as state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Command;

/// Maximum message size (64 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Inconsistent snapshot for command {id}: {reason}")]
    Inconsistent { id: u64, reason: &'static str },
}

/// Full field-set serialization of a command at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    #[serde(default, alias = "command")]
    pub text: String,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl Snapshot {
    /// Poll answer: only the id and the command line
    pub fn assignment(command: &Command) -> Self {
        Self {
            id: command.id,
            text: command.text.clone(),
            exit_code: None,
            stdout: None,
            stderr: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Report body: every field of the command
    pub fn report(command: &Command) -> Self {
        Self {
            id: command.id,
            text: command.text.clone(),
            exit_code: command.exit_code,
            stdout: Some(command.stdout.clone()),
            stderr: Some(command.stderr.clone()),
            start_time: command.start_time,
            end_time: command.end_time,
        }
    }

    /// Whether this snapshot carries a final result
    pub fn is_final(&self) -> bool {
        self.end_time.is_some()
    }

    /// Check the `end_time => start_time && exit_code` invariant
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.end_time.is_some() {
            if self.start_time.is_none() {
                return Err(CodecError::Inconsistent {
                    id: self.id,
                    reason: "end_time without start_time",
                });
            }
            if self.exit_code.is_none() {
                return Err(CodecError::Inconsistent {
                    id: self.id,
                    reason: "end_time without exit_code",
                });
            }
        }
        Ok(())
    }

    /// Convert into a command; absent output reads as empty
    pub fn into_command(self) -> Command {
        Command {
            id: self.id,
            text: self.text,
            exit_code: self.exit_code,
            stdout: self.stdout.unwrap_or_default(),
            stderr: self.stderr.unwrap_or_default(),
            start_time: self.start_time,
            end_time: self.end_time,
            display: None,
        }
    }
}

impl From<&Command> for Snapshot {
    fn from(command: &Command) -> Self {
        Snapshot::report(command)
    }
}

/// Encode a snapshot into a JSON body
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    let body = serde_json::to_vec(snapshot)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(body.len()));
    }
    Ok(body)
}

/// Decode a JSON body into a validated snapshot
pub fn decode(body: &[u8]) -> Result<Snapshot, CodecError> {
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(body.len()));
    }
    let snapshot: Snapshot = serde_json::from_slice(body)?;
    snapshot.validate()?;
    Ok(snapshot)
}
