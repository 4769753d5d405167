//! Command line configuration

use crate::cdp::CaptureConfig;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "cdp-console-mcp", version, about = "MCP server for Chromium console output")]
pub struct Cli {
    /// Host the browser's remote-debugging port listens on
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Remote-debugging port of the running browser
    #[arg(long, env = "CDP_PORT", default_value_t = 9222)]
    pub port: u16,

    /// Timeout for each discovery request, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Keep at most this many console messages (oldest dropped first)
    #[arg(long)]
    pub max_entries: Option<usize>,
}

impl Cli {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            host: self.host.clone(),
            port: self.port,
            discovery_timeout: Duration::from_millis(self.timeout_ms),
            max_entries: self.max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_defaults() {
        let cli = Cli::parse_from(["cdp-console-mcp"]);
        let config = cli.capture_config();
        let defaults = CaptureConfig::default();

        assert_eq!(config.host, defaults.host);
        assert_eq!(config.discovery_timeout, defaults.discovery_timeout);
        assert_eq!(config.max_entries, None);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "cdp-console-mcp",
            "--host",
            "127.0.0.1",
            "--port",
            "9333",
            "--timeout-ms",
            "500",
            "--max-entries",
            "100",
        ]);
        let config = cli.capture_config();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9333);
        assert_eq!(config.discovery_timeout, Duration::from_millis(500));
        assert_eq!(config.max_entries, Some(100));
    }
}
