use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_DATA_PATH: &str = "streaming_data.json";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_LOG_FILTER: &str = "streaming_analytics_api=debug,tower_http=debug";
pub const CLI_LOG_FILTER: &str = "streamstats=info,streaming_analytics_api=info";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub log_filter: String,
}

impl AppConfig {
    /// Read `STREAMING_DATA_PATH`, `LISTEN_ADDR` and `RUST_LOG`, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_path = lookup("STREAMING_DATA_PATH")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());

        let listen_addr = lookup("LISTEN_ADDR")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .with_context(|| format!("invalid LISTEN_ADDR '{}'", listen_addr))?;

        let log_filter = log_filter_from(&lookup, DEFAULT_LOG_FILTER);

        Ok(Self {
            data_path: PathBuf::from(data_path),
            listen_addr,
            log_filter,
        })
    }
}

/// `RUST_LOG` if set, else `default`.
pub fn log_filter(default: &str) -> String {
    log_filter_from(|key| std::env::var(key).ok(), default)
}

fn log_filter_from(lookup: impl Fn(&str) -> Option<String>, default: &str) -> String {
    lookup("RUST_LOG")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.listen_addr.port(), 3001);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STREAMING_DATA_PATH", "/data/views.json"),
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("RUST_LOG", "info"),
        ]))
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("/data/views.json"));
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_cli_log_filter_yields_to_rust_log() {
        assert_eq!(log_filter_from(lookup(&[]), CLI_LOG_FILTER), CLI_LOG_FILTER);
        assert_eq!(log_filter_from(lookup(&[("RUST_LOG", "")]), CLI_LOG_FILTER), CLI_LOG_FILTER);
        assert_eq!(
            log_filter_from(lookup(&[("RUST_LOG", "streamstats=trace")]), CLI_LOG_FILTER),
            "streamstats=trace"
        );
    }

    #[test]
    fn test_invalid_listen_addr() {
        let err = AppConfig::from_lookup(lookup(&[("LISTEN_ADDR", "not-an-addr")])).unwrap_err();
        assert!(err.to_string().contains("LISTEN_ADDR"));
    }
}
