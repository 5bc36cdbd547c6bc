//! Runtime settings.
//!
//! Everything has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! addr = "0.0.0.0:3000"
//! request_timeout_ms = 30000
//! drain_timeout_ms = 30000
//! json_limit = 102400
//! body_limit = 1048576
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Error};
use crate::middleware::DEFAULT_JSON_LIMIT;

/// 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `host:port` the server binds.
    pub addr: String,
    /// Per-request deadline for the whole middleware chain and handler.
    pub request_timeout_ms: u64,
    /// How long shutdown waits for in-flight requests before aborting them.
    pub drain_timeout_ms: u64,
    /// Largest JSON body [`JsonBody`](crate::middleware::JsonBody) accepts.
    pub json_limit: usize,
    /// Largest request body the server reads at all, whatever its type.
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            request_timeout_ms: 30_000,
            drain_timeout_ms: 30_000,
            json_limit: DEFAULT_JSON_LIMIT,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_document_overrides_only_given_keys() {
        let config = Config::from_toml_str("addr = \"127.0.0.1:8080\"\nrequest_timeout_ms = 250\n").unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080");
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.json_limit, DEFAULT_JSON_LIMIT);
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("port = 3000").unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
