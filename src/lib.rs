//! Multi-Room TCP Chat Server Library
//!
//! A chat server where clients declare a username and a set of rooms
//! with one handshake line, then exchange newline-terminated messages
//! fanned out to every other member of the rooms they share.
//!
//! # Features
//! - Pipe-delimited handshake (`username|room1|room2|...`)
//! - Line framing over raw TCP with partial-read buffering
//! - Room creation on first join, deletion on last leave
//! - Join/leave notices in the broadcast envelope
//! - Partial-write-tolerant delivery that survives dead recipients
//!
//! # Architecture
//! One thread runs the connection multiplexer: a mio-based readiness
//! loop that accepts connections, frames lines, and detects
//! disconnects. It produces tasks for a fixed pool of worker threads,
//! which own all room-state changes behind a writer-fair reader/writer
//! lock:
//! - `Server` is the accept/read loop and owns connection liveness
//! - `TaskQueue`/`WorkerPool` decouple I/O from dispatch
//! - `Engine` applies each task to the `Registry` under `FairRwLock`
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use multichat::{Config, Engine, Server, WorkerPool};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let engine = Arc::new(Engine::new());
//!     let dispatcher = Arc::clone(&engine);
//!     let pool = WorkerPool::new(config.workers, move |task| dispatcher.dispatch(task));
//!
//!     let mut server = Server::bind(config.socket_addr()?, config.backlog, engine, pool.queue())?;
//!     server.run()?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod framing;
pub mod pool;
pub mod registry;
pub mod room;
pub mod rwlock;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use config::Config;
pub use engine::Engine;
pub use error::{ConfigError, ServerError, SocketError};
pub use framing::LineBuffer;
pub use pool::{Task, TaskQueue, WorkerPool};
pub use registry::Registry;
pub use room::Room;
pub use rwlock::FairRwLock;
pub use server::Server;
pub use types::ConnectionId;
