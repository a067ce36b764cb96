//! Worker configuration and CLI

use clap::Parser;
use fanout_shared::defaults;
use std::time::Duration;

/// fanout worker - runs shell commands handed out by a coordinator
#[derive(Parser, Debug)]
#[command(name = "fanout-worker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Coordinator address
    #[arg(long, default_value = defaults::ADDRESS, env = "FANOUT_ADDRESS")]
    pub address: String,

    /// Coordinator port
    #[arg(long, default_value_t = defaults::PORT, env = "FANOUT_PORT")]
    pub port: u16,

    /// Delay between polls while idle or disconnected (milliseconds)
    #[arg(long, default_value_t = defaults::REQUEST_DELAY_MS)]
    pub request_delay_ms: u64,

    /// Interval between progress reports of a running command (milliseconds)
    #[arg(long, default_value_t = defaults::REPORT_INTERVAL_MS)]
    pub report_interval_ms: u64,

    /// Run a single command, then exit
    #[arg(long)]
    pub once: bool,
}

/// Configuration for the worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub address: String,
    pub port: u16,
    pub request_delay: Duration,
    pub report_interval: Duration,
    /// Longest wait for trailing output once the child has exited
    pub read_poll: Duration,
    pub once: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            address: defaults::ADDRESS.into(),
            port: defaults::PORT,
            request_delay: Duration::from_millis(defaults::REQUEST_DELAY_MS),
            report_interval: Duration::from_millis(defaults::REPORT_INTERVAL_MS),
            read_poll: Duration::from_millis(defaults::READ_POLL_MS),
            once: false,
        }
    }
}

impl From<Cli> for WorkerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            address: cli.address,
            port: cli.port,
            request_delay: Duration::from_millis(cli.request_delay_ms),
            report_interval: Duration::from_millis(cli.report_interval_ms),
            once: cli.once,
            ..Default::default()
        }
    }
}

impl WorkerConfig {
    /// Dispatch endpoint of the coordinator
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = WorkerConfig::from(Cli::parse_from(["fanout-worker"]));
        assert_eq!(config.url(), "http://localhost:34923/");
        assert_eq!(config.request_delay, Duration::from_millis(300));
        assert_eq!(config.report_interval, Duration::from_millis(300));
        assert_eq!(config.read_poll, Duration::from_millis(100));
        assert!(!config.once);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "fanout-worker",
            "--address",
            "10.0.0.7",
            "--port",
            "8080",
            "--request-delay-ms",
            "1000",
            "--once",
        ]);
        let config = WorkerConfig::from(cli);
        assert_eq!(config.url(), "http://10.0.0.7:8080/");
        assert_eq!(config.request_delay, Duration::from_secs(1));
        assert!(config.once);
    }
}
