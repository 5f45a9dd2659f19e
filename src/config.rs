//! Configuration for the chat server
//!
//! Intentionally simple: defaults, overridable via a few environment
//! variables:
//!
//! - `CHAT_BIND_ADDR` (default: "0.0.0.0")
//! - `CHAT_PORT`      (default: "8080")
//! - `CHAT_BACKLOG`   (default: "5")
//! - `CHAT_WORKERS`   (default: the host's available parallelism)

use std::env;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::thread;

use crate::error::ConfigError;

/// Default listening port
const DEFAULT_PORT: u16 = 8080;

/// Default accept backlog
const DEFAULT_BACKLOG: i32 = 5;

/// Worker count fallback when parallelism cannot be queried
const FALLBACK_WORKERS: usize = 4;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1")
    pub bind_addr: String,

    /// TCP port to listen on
    pub port: u16,

    /// Accept backlog for the listening socket
    pub backlog: i32,

    /// Number of worker threads consuming the task queue
    pub workers: usize,
}

impl Config {
    /// Construct a `Config` from environment variables, falling back to
    /// defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("CHAT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = read_env_or_default("CHAT_PORT", DEFAULT_PORT)?;
        let backlog = read_env_or_default("CHAT_BACKLOG", DEFAULT_BACKLOG)?;
        let workers = read_env_or_default("CHAT_WORKERS", default_workers())?;

        Ok(Config {
            bind_addr,
            port,
            backlog,
            workers,
        })
    }

    /// Resolve the bind address and port into a socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr_string = format!("{}:{}", self.bind_addr, self.port);
        addr_string
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ConfigError::BadAddr(addr_string))
    }
}

/// One worker per available core
fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}

fn read_env_or_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
