//! Operator console
//!
//! Reads one instruction per line from standard input and applies it to the
//! store under the same lock the dispatch endpoint uses.

use crate::dispatch::SharedStore;
use crate::display::{format_elapsed, status_line};
use crate::store::{CommandStore, StoreError};
use chrono::{Local, TimeZone};
use fanout_shared::{now_secs, Command};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

pub const HELP: &str = "\
Commands:
  add <command line>   queue a command
  load <path>          queue every non-blank line of a file
  delete <id>          remove a command that is not running
  restart <id>         queue a finished command again
  list                 show every command
  show <id>            show one command with its output
  help                 show this text
  quit                 stop the coordinator";

/// One parsed console instruction
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Add(String),
    Load(PathBuf),
    Delete(u64),
    Restart(u64),
    List,
    Show(u64),
    Help,
    Quit,
}

/// Parse a console line; `Ok(None)` for a blank line
pub fn parse(line: &str) -> Result<Option<OperatorCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "add" | "a" => OperatorCommand::Add(rest.to_string()),
        "load" | "A" => {
            if rest.is_empty() {
                return Err("load needs a file path".into());
            }
            OperatorCommand::Load(PathBuf::from(rest))
        }
        "delete" | "d" => OperatorCommand::Delete(parse_id(rest)?),
        "restart" | "r" => OperatorCommand::Restart(parse_id(rest)?),
        "show" | "s" => OperatorCommand::Show(parse_id(rest)?),
        "list" | "l" => OperatorCommand::List,
        "help" | "?" => OperatorCommand::Help,
        "quit" | "q" | "exit" => OperatorCommand::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

fn parse_id(raw: &str) -> Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("expected a command id, got '{}'", raw))
}

/// Apply one instruction and return the text to show the operator
pub fn execute(store: &mut CommandStore, command: OperatorCommand) -> String {
    match command {
        OperatorCommand::Add(text) => match store.add(&text) {
            Ok(id) => format!("added #{}", id),
            Err(StoreError::EmptyCommand) => String::new(),
            Err(e) => e.to_string(),
        },
        OperatorCommand::Load(path) => {
            let added = store.add_from_file(&path);
            format!("added {} command(s)", added.len())
        }
        OperatorCommand::Delete(id) => match store.delete(id) {
            Ok(cmd) => format!("deleted #{} {}", id, cmd.text),
            Err(e) => e.to_string(),
        },
        OperatorCommand::Restart(id) => match store.restart(id) {
            Ok(()) => format!("restarted #{}", id),
            Err(e) => e.to_string(),
        },
        OperatorCommand::List => list(store),
        OperatorCommand::Show(id) => match store.get(id) {
            Some(cmd) => details(cmd),
            None => StoreError::NotFound(id).to_string(),
        },
        OperatorCommand::Help => HELP.to_string(),
        OperatorCommand::Quit => "stopping".to_string(),
    }
}

fn list(store: &CommandStore) -> String {
    let counts = store.counts();
    let mut out = format!(
        "{} pending, {} running, {} finished",
        counts.pending, counts.running, counts.terminal
    );
    for cmd in store.commands() {
        out.push_str(&format!("\n#{:<4} {}", cmd.id, status_line(cmd)));
    }
    out
}

/// Multi-line description of one command, output included
pub fn details(cmd: &Command) -> String {
    let mut out = format!("ID: {}\nCommand: {}\nStatus: {}\n", cmd.id, cmd.text, cmd.state());
    if let Some(start) = cmd.start_time {
        out.push_str(&format!("Start time: {}\n", format_timestamp(start)));
    }
    if let Some(elapsed) = cmd.elapsed(now_secs()) {
        out.push_str(&format!("Elapsed time: {}\n", format_elapsed(elapsed)));
    }
    if let Some(end) = cmd.end_time {
        out.push_str(&format!("End time: {}\n", format_timestamp(end)));
    }
    if let Some(code) = cmd.exit_code {
        out.push_str(&format!("Exit code: {}\n", code));
    }
    if !cmd.stdout.is_empty() {
        out.push_str(&format!("--- stdout ---\n{}", cmd.stdout));
        if !cmd.stdout.ends_with('\n') {
            out.push('\n');
        }
    }
    if !cmd.stderr.is_empty() {
        out.push_str(&format!("--- stderr ---\n{}", cmd.stderr));
    }
    out.trim_end().to_string()
}

fn format_timestamp(secs: f64) -> String {
    match Local.timestamp_opt(secs as i64, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{:.3}", secs),
    }
}

/// Why the console stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator asked the coordinator to stop
    Quit,
    /// Input closed or failed; the coordinator keeps serving
    InputClosed,
}

/// Read instructions from `input` until it closes or the operator quits
pub async fn run<R>(input: R, store: SharedStore) -> ConsoleExit
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    println!("{}", HELP);

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("console input closed");
                return ConsoleExit::InputClosed;
            }
            Err(e) => {
                warn!(error = %e, "failed to read console input");
                return ConsoleExit::InputClosed;
            }
        };

        match parse(&line) {
            Ok(None) => {}
            Ok(Some(OperatorCommand::Quit)) => return ConsoleExit::Quit,
            Ok(Some(command)) => {
                let output = execute(&mut *store.lock().await, command);
                if !output.is_empty() {
                    println!("{}", output);
                }
            }
            Err(message) => println!("{}", message),
        }
    }
}
