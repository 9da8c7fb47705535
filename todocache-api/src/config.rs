//! Node Configuration
//!
//! Command-line flags (each with an environment fallback) and their
//! resolution into the addresses a node binds and the peer set it shares
//! with every other node in the deployment.

use std::collections::BTreeMap;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::error::ApiError;

/// Public gateway address used when `--api-addr` is not given.
pub const DEFAULT_API_ADDR: &str = "http://localhost:9999";

/// Cache group every node registers.
pub const DEFAULT_GROUP: &str = "todos";

/// Local cache budget in bytes.
pub const DEFAULT_CACHE_BYTES: u64 = 2 << 10;

/// Cache peers used when no `--peer` is given: ports 8001-8003 on localhost.
pub fn default_peer_map() -> BTreeMap<u16, String> {
    (8001..=8003)
        .map(|port| (port, format!("http://localhost:{}", port)))
        .collect()
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port {port} is not in the peer map (known ports: {known})")]
    UnknownPort { port: u16, known: String },

    #[error("invalid peer '{value}', expected PORT=URL")]
    InvalidPeer { value: String },

    #[error("cannot derive a listen address from '{url}'")]
    InvalidUrl { url: String },

    #[error("cache budget must be greater than zero")]
    ZeroCacheBytes,
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

// ============================================================================
// CLI
// ============================================================================

/// todocache node: cache peer, optionally also the public API gateway.
#[derive(Parser, Debug, Clone)]
#[command(name = "todocache", author, version, about, long_about = None)]
pub struct Cli {
    /// Cache-serving port of this node; must appear in the peer map
    #[arg(long, env = "TODOCACHE_PORT", default_value_t = 8001)]
    pub port: u16,

    /// Also serve the public API on --api-addr
    #[arg(long, env = "TODOCACHE_API")]
    pub api: bool,

    /// Public API gateway address
    #[arg(long, env = "TODOCACHE_API_ADDR", default_value = DEFAULT_API_ADDR)]
    pub api_addr: String,

    /// Cache peer as PORT=URL; repeat for each node (defaults to 8001-8003 on localhost)
    #[arg(long = "peer", value_name = "PORT=URL", value_parser = parse_peer)]
    pub peers: Vec<(u16, String)>,

    /// Cache group name; identical on every node
    #[arg(long, env = "TODOCACHE_GROUP", default_value = DEFAULT_GROUP)]
    pub group: String,

    /// Local cache budget in bytes
    #[arg(long, env = "TODOCACHE_CACHE_BYTES", default_value_t = DEFAULT_CACHE_BYTES)]
    pub cache_bytes: u64,

    /// Expire cached records this many seconds after they were loaded
    #[arg(long, env = "TODOCACHE_CACHE_TTL_SECS")]
    pub cache_ttl_secs: Option<u64>,
}

fn parse_peer(value: &str) -> Result<(u16, String), ConfigError> {
    let invalid = || ConfigError::InvalidPeer {
        value: value.to_string(),
    };
    let (port, url) = value.split_once('=').ok_or_else(invalid)?;
    let port = port.trim().parse::<u16>().map_err(|_| invalid())?;
    let url = url.trim();
    if url.is_empty() {
        return Err(invalid());
    }
    Ok((port, url.to_string()))
}

// ============================================================================
// NODE CONFIG
// ============================================================================

/// Fully resolved startup parameters of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// This node's cache-serving URL, as listed in the peer set.
    pub self_url: String,
    /// Every cache node in the deployment, self included, ordered by port.
    pub peers: Vec<String>,
    pub api_enabled: bool,
    pub api_url: String,
    pub group: String,
    pub cache_bytes: u64,
    pub cache_ttl: Option<Duration>,
}

impl NodeConfig {
    /// Resolve flags against the peer map.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let peer_map = if cli.peers.is_empty() {
            default_peer_map()
        } else {
            cli.peers.iter().cloned().collect()
        };
        Self::resolve(cli, &peer_map)
    }

    fn resolve(cli: &Cli, peer_map: &BTreeMap<u16, String>) -> Result<Self, ConfigError> {
        let self_url = peer_map
            .get(&cli.port)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPort {
                port: cli.port,
                known: peer_map
                    .keys()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        if cli.cache_bytes == 0 {
            return Err(ConfigError::ZeroCacheBytes);
        }

        let config = Self {
            self_url,
            peers: peer_map.values().cloned().collect(),
            api_enabled: cli.api,
            api_url: cli.api_addr.clone(),
            group: cli.group.clone(),
            cache_bytes: cli.cache_bytes,
            cache_ttl: cli.cache_ttl_secs.map(Duration::from_secs),
        };
        // Fail on unusable addresses before anything is started.
        config.cache_bind_addr()?;
        if config.api_enabled {
            config.api_bind_addr()?;
        }
        Ok(config)
    }

    /// Address the cache-serving listener binds.
    pub fn cache_bind_addr(&self) -> Result<String, ConfigError> {
        bind_addr_from_url(&self.self_url)
    }

    /// Address the API listener binds.
    pub fn api_bind_addr(&self) -> Result<String, ConfigError> {
        bind_addr_from_url(&self.api_url)
    }
}

/// Listen address for a node URL: the URL without its scheme.
///
/// `http://localhost:8001` binds `localhost:8001`.
pub fn bind_addr_from_url(url: &str) -> Result<String, ConfigError> {
    let rest = url
        .trim()
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url.trim())
        .trim_end_matches('/');

    if rest.is_empty() || rest.contains('/') || !rest.contains(':') {
        return Err(ConfigError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(rest.to_string())
}
