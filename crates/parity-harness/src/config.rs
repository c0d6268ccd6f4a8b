//! Configuration for parity runs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Configuration for the parity test environment
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// JSON-RPC URL of the full node
    pub reference_url: String,
    /// JSON-RPC URL of the secondary server
    pub secondary_url: String,
    /// WebSocket URL of the full node
    pub reference_ws_url: String,
    /// WebSocket URL of the secondary server
    pub secondary_ws_url: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Pages followed before paging is declared non-terminating
    pub max_pages: usize,
    /// Network id both servers are expected to embed in CTIDs
    pub network_id: u16,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            reference_url: "http://localhost:5005".to_string(),
            secondary_url: "http://localhost:51233".to_string(),
            reference_ws_url: "ws://localhost:6006".to_string(),
            secondary_ws_url: "ws://localhost:51234".to_string(),
            request_timeout: Duration::from_secs(30),
            max_pages: parity_compare::DEFAULT_MAX_PAGES,
            network_id: 0,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables, falling back to defaults
    ///
    /// - `RIPPLED_URL`, `CLIO_URL`: JSON-RPC endpoints
    /// - `RIPPLED_WS_URL`, `CLIO_WS_URL`: WebSocket endpoints
    /// - `PARITY_REQUEST_TIMEOUT_SECS`, `PARITY_MAX_PAGES`, `PARITY_NETWORK_ID`
    pub fn from_env() -> HarnessResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            reference_url: env::var("RIPPLED_URL").unwrap_or(defaults.reference_url),
            secondary_url: env::var("CLIO_URL").unwrap_or(defaults.secondary_url),
            reference_ws_url: env::var("RIPPLED_WS_URL").unwrap_or(defaults.reference_ws_url),
            secondary_ws_url: env::var("CLIO_WS_URL").unwrap_or(defaults.secondary_ws_url),
            request_timeout: parse_var::<u64>("PARITY_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_pages: parse_var("PARITY_MAX_PAGES")?.unwrap_or(defaults.max_pages),
            network_id: parse_var("PARITY_NETWORK_ID")?.unwrap_or(defaults.network_id),
        })
    }
}

fn parse_var<T>(key: &str) -> HarnessResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| HarnessError::InvalidConfig {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
