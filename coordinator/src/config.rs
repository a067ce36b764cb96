//! Coordinator configuration and CLI

use clap::Parser;
use directories::ProjectDirs;
use fanout_shared::defaults;
use std::path::PathBuf;

/// fanout coordinator - queues shell commands and hands them to workers
#[derive(Parser, Debug)]
#[command(name = "fanout-coordinator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on (use 0.0.0.0 to accept remote workers)
    #[arg(long, default_value = defaults::ADDRESS)]
    pub address: String,

    /// Port to listen on
    #[arg(long, default_value_t = defaults::PORT)]
    pub port: u16,

    /// Directory holding the queue and command output
    #[arg(long, env = "FANOUT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// File of commands (one per line) to queue at startup
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Do not read operator commands from standard input
    #[arg(long)]
    pub no_console: bool,
}

/// Configuration for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub address: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub load: Option<PathBuf>,
    pub console: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            address: defaults::ADDRESS.into(),
            port: defaults::PORT,
            data_dir: default_data_dir(),
            load: None,
            console: true,
        }
    }
}

impl From<Cli> for CoordinatorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            address: cli.address,
            port: cli.port,
            data_dir: cli.data_dir.unwrap_or_else(default_data_dir),
            load: cli.load,
            console: !cli.no_console,
        }
    }
}

impl CoordinatorConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Per-user data directory (`$XDG_DATA_HOME/fanout` on Linux)
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "fanout")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".fanout"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["fanout-coordinator"]);
        let config = CoordinatorConfig::from(cli);
        assert_eq!(config.bind_addr(), "localhost:34923");
        assert!(config.console);
        assert!(config.load.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "fanout-coordinator",
            "--address",
            "0.0.0.0",
            "--port",
            "9000",
            "--data-dir",
            "/var/lib/fanout",
            "--no-console",
        ]);
        let config = CoordinatorConfig::from(cli);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/fanout"));
        assert!(!config.console);
    }
}
