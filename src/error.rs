//! Error types for the chat server
//!
//! Splits failures along the two axes the server cares about: errors that
//! are fatal to the whole process (startup resource acquisition) and
//! errors that are fatal to a single connection (socket I/O).
//! Uses thiserror for ergonomic error definitions.

use std::io;

use thiserror::Error;

/// Process-fatal server errors
///
/// Everything here is raised during startup or by the readiness loop
/// itself; the process reports it and exits non-zero.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener socket could not be created or configured
    #[error("failed to set up listener socket: {0}")]
    Setup(#[source] io::Error),

    /// Address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Listen call failed
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// Readiness mechanism could not be created or a poll wait failed
    #[error("poll error: {0}")]
    Poll(#[source] io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    /// The bind address did not resolve to a socket address
    #[error("invalid bind address: {0}")]
    BadAddr(String),
}

/// Per-connection socket errors
///
/// `PeerGone` covers the transient cases (reset, broken pipe, aborted,
/// clean close) that tear down one connection without affecting anything
/// else. `Io` is everything other than that.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The peer disconnected or reset the connection
    #[error("peer disconnected")]
    PeerGone,

    /// Any other socket I/O failure
    #[error("socket I/O error: {0}")]
    Io(#[source] io::Error),
}

impl SocketError {
    /// Classify an I/O error from a read or write on a client socket.
    pub fn classify(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => SocketError::PeerGone,
            _ => SocketError::Io(err),
        }
    }

    /// True for the transient "peer gone" class.
    pub fn is_peer_gone(&self) -> bool {
        matches!(self, SocketError::PeerGone)
    }
}
