//! Cache handle configuration.
//!
//! Host entries are completed field by field with the defaults of a local
//! memcached (`127.0.0.1:11211`, non-persistent). An empty host list resolves
//! to a single default host.

use crate::error::{Error, Result};
use faststr::FastStr;
use serde::Deserialize;
use std::env;
use tracing::debug;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 11211;

const ENV_HOSTS: &str = "TAGCACHE_HOSTS";
const ENV_NAMESPACE: &str = "TAGCACHE_NAMESPACE";
const ENV_RAW_NAMESPACE: &str = "TAGCACHE_RAW_NAMESPACE";
const ENV_LOGGING: &str = "TAGCACHE_LOGGING";

fn default_host() -> FastStr {
    FastStr::from_static_str(DEFAULT_HOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_host")]
    pub host:       FastStr,
    #[serde(default = "default_port")]
    pub port:       u16,
    #[serde(default)]
    pub persistent: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host:       default_host(),
            port:       DEFAULT_PORT,
            persistent: false,
        }
    }
}

impl HostConfig {
    /// Parses `host`, `host:port` or `:port`; missing parts take the defaults.
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let (host, port) = match entry.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidPort(FastStr::new(entry)))?;
                (host, port)
            }
            None => (entry, DEFAULT_PORT),
        };
        let host = if host.is_empty() {
            default_host()
        } else {
            FastStr::new(host)
        };
        Ok(Self {
            host,
            port,
            persistent: false,
        })
    }

    /// Connection URL understood by the `memcache` client.
    pub fn memcache_url(&self) -> String {
        if self.persistent {
            format!("memcache://{}:{}?tcp_nodelay=true", self.host, self.port)
        } else {
            format!("memcache://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    hosts:             Vec<HostConfig>,
    /// Prefix for tagged entries and tag generation keys.
    #[serde(default)]
    pub namespace:     Option<FastStr>,
    /// Prefix for raw entries, independent of `namespace`.
    #[serde(default)]
    pub raw_namespace: Option<FastStr>,
    /// Emit tag snapshot comparisons at debug level.
    #[serde(default)]
    pub logging:       bool,
}

impl CacheConfig {
    pub fn with_namespace(mut self, namespace: impl Into<FastStr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_raw_namespace(mut self, raw_namespace: impl Into<FastStr>) -> Self {
        self.raw_namespace = Some(raw_namespace.into());
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// Reads `TAGCACHE_*` variables; call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let hosts = match env::var(ENV_HOSTS) {
            Ok(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(HostConfig::parse)
                .collect::<Result<Vec<_>>>()?,
            Err(_) => Vec::new(),
        };
        let logging = match env::var(ENV_LOGGING) {
            Ok(v) => parse_bool(ENV_LOGGING, &v)?,
            Err(_) => false,
        };

        let namespace = non_empty_var(ENV_NAMESPACE);
        debug!(hosts = hosts.len(), namespace = ?namespace, logging, "cache config loaded from env");

        Ok(Self {
            hosts,
            namespace,
            raw_namespace: non_empty_var(ENV_RAW_NAMESPACE),
            logging,
        })
    }

    /// Configured hosts with the default host substituted for an empty list.
    pub fn hosts(&self) -> Vec<HostConfig> {
        if self.hosts.is_empty() {
            vec![HostConfig::default()]
        } else {
            self.hosts.clone()
        }
    }

    pub fn memcache_urls(&self) -> Vec<String> {
        self.hosts().iter().map(HostConfig::memcache_url).collect()
    }
}

fn non_empty_var(name: &str) -> Option<FastStr> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(FastStr::from)
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::InvalidBool(name, FastStr::new(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hosts_fall_back_to_default() {
        let config = CacheConfig::default();
        assert_eq!(config.hosts(), vec![HostConfig::default()]);
        assert_eq!(config.memcache_urls(), vec!["memcache://127.0.0.1:11211"]);
    }

    #[test]
    fn test_host_entries_are_completed() {
        let config: CacheConfig = serde_json::from_str(
            r#"{
                "hosts": [
                    {"host": "localhost", "persistent": true},
                    {"port": 11212, "host": "localhost"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.hosts(),
            vec![
                HostConfig {
                    host:       "localhost".into(),
                    port:       11211,
                    persistent: true,
                },
                HostConfig {
                    host:       "localhost".into(),
                    port:       11212,
                    persistent: false,
                },
            ]
        );
        assert_eq!(
            config.memcache_urls(),
            vec![
                "memcache://localhost:11211?tcp_nodelay=true",
                "memcache://localhost:11212",
            ]
        );
    }

    #[test]
    fn test_parse_host_entry() {
        let h = HostConfig::parse("cache-1:11300").unwrap();
        assert_eq!(h.host.as_str(), "cache-1");
        assert_eq!(h.port, 11300);

        let h = HostConfig::parse("cache-2").unwrap();
        assert_eq!(h.port, DEFAULT_PORT);

        let h = HostConfig::parse(":11400").unwrap();
        assert_eq!(h.host.as_str(), DEFAULT_HOST);
        assert_eq!(h.port, 11400);

        assert!(matches!(
            HostConfig::parse("cache-3:port"),
            Err(Error::InvalidPort(_))
        ));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::default()
            .with_namespace("app")
            .with_raw_namespace("raw:")
            .with_logging(true);
        assert_eq!(config.namespace.as_deref(), Some("app"));
        assert_eq!(config.raw_namespace.as_deref(), Some("raw:"));
        assert!(config.logging);
    }
}
