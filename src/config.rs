use std::env;
use std::time::Duration;

use crate::{DashQueryError, Result};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
pub const DEFAULT_UPSTREAM: &str = "http://127.0.0.1:17000";
pub const DEFAULT_PATHNAME: &str = "n9e";
pub const DEFAULT_LOG_SERVICE: &str = "dashquery";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub listen_addr: String,
    /// Base URL of the fetch service, without trailing slash.
    pub upstream_url: String,
    /// Path segment of the fetch service API, `/api/<pathname>/...`.
    pub pathname: String,
    pub timeout: Option<Duration>,
    pub log_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN.to_string(),
            upstream_url: DEFAULT_UPSTREAM.to_string(),
            pathname: DEFAULT_PATHNAME.to_string(),
            timeout: None,
            log_service: DEFAULT_LOG_SERVICE.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let timeout = match lookup("DASHQUERY_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    DashQueryError::Config(format!("DASHQUERY_TIMEOUT_SECS={}: {}", raw, e))
                })?;
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            listen_addr: lookup("DASHQUERY_LISTEN").unwrap_or(defaults.listen_addr),
            upstream_url: lookup("DASHQUERY_UPSTREAM")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_url),
            pathname: lookup("DASHQUERY_PATHNAME")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.pathname),
            timeout,
            log_service: lookup("DASHQUERY_LOG_SERVICE").unwrap_or(defaults.log_service),
        })
    }

    /// Full URL of an endpoint under the fetch service API root.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.upstream_url, api_path(&self.pathname, path))
    }
}

/// `/api/<pathname>/<path>`, as shown in inspection traces.
pub fn api_path(pathname: &str, path: &str) -> String {
    format!("/api/{}/{}", pathname, path.trim_start_matches('/'))
}
