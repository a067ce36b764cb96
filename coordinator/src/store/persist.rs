//! Durable mirror of the command queue
//!
//! Layout under the data directory:
//! ```text
//! commands.json   JSON array of command records (no stdout/stderr)
//! stdout/<id>     captured standard output of command <id>
//! stderr/<id>     captured standard error of command <id>
//! ```
//!
//! Missing files read as empty. Every write goes to a temporary sibling
//! first and is renamed into place.

use fanout_shared::Command;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const COMMANDS_FILE: &str = "commands.json";
pub const STDOUT_DIR: &str = "stdout";
pub const STDERR_DIR: &str = "stderr";

/// Errors raised by the durable mirror
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt metadata file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    fn io(path: &Path, source: io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Metadata of one command as stored in `commands.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: u64,
    #[serde(alias = "command")]
    pub text: String,
    pub exit_code: Option<i32>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl From<&Command> for CommandRecord {
    fn from(cmd: &Command) -> Self {
        Self {
            id: cmd.id,
            text: cmd.text.clone(),
            exit_code: cmd.exit_code,
            start_time: cmd.start_time,
            end_time: cmd.end_time,
        }
    }
}

impl CommandRecord {
    fn into_command(self, stdout: String, stderr: String) -> Command {
        let mut cmd = Command::new(self.id, self.text);
        cmd.exit_code = self.exit_code;
        cmd.start_time = self.start_time;
        cmd.end_time = self.end_time;
        cmd.stdout = stdout;
        cmd.stderr = stderr;
        cmd
    }
}

/// The data directory backing a coordinator
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Open a data directory, creating it and its subdirectories if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let root = root.into();
        for dir in [root.clone(), root.join(STDOUT_DIR), root.join(STDERR_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| PersistError::io(&dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn commands_path(&self) -> PathBuf {
        self.root.join(COMMANDS_FILE)
    }

    pub fn stdout_path(&self, id: u64) -> PathBuf {
        self.root.join(STDOUT_DIR).join(id.to_string())
    }

    pub fn stderr_path(&self, id: u64) -> PathBuf {
        self.root.join(STDERR_DIR).join(id.to_string())
    }

    /// Load every persisted command, hydrating its output from the per-id files
    pub fn load(&self) -> Result<Vec<Command>, PersistError> {
        let path = self.commands_path();
        let Some(raw) = read_optional(&path)? else {
            debug!(path = %path.display(), "no metadata file, starting empty");
            return Ok(Vec::new());
        };

        let records: Vec<CommandRecord> =
            serde_json::from_str(&raw).map_err(|source| PersistError::Corrupt {
                path: path.clone(),
                source,
            })?;

        records
            .into_iter()
            .map(|record| {
                let stdout = read_optional(&self.stdout_path(record.id))?.unwrap_or_default();
                let stderr = read_optional(&self.stderr_path(record.id))?.unwrap_or_default();
                Ok(record.into_command(stdout, stderr))
            })
            .collect()
    }

    /// Rewrite `commands.json` from the full command list
    pub fn save_metadata(&self, commands: &[Command]) -> Result<(), PersistError> {
        let records: Vec<CommandRecord> = commands.iter().map(CommandRecord::from).collect();
        let path = self.commands_path();
        let json = serde_json::to_vec_pretty(&records).map_err(|source| PersistError::Corrupt {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json)
    }

    /// Rewrite the stdout and stderr files of one command
    pub fn save_output(&self, cmd: &Command) -> Result<(), PersistError> {
        write_atomic(&self.stdout_path(cmd.id), cmd.stdout.as_bytes())?;
        write_atomic(&self.stderr_path(cmd.id), cmd.stderr.as_bytes())
    }

    /// Delete the output files of one command; missing files are fine
    pub fn remove_output(&self, id: u64) -> Result<(), PersistError> {
        for path in [self.stdout_path(id), self.stderr_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistError::io(&path, e)),
            }
        }
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, PersistError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistError::io(path, e)),
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|e| PersistError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PersistError::io(path, e))
}
