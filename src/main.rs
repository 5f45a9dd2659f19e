//! Multi-Room TCP Chat Server - Entry Point
//!
//! Wires the dispatch engine, the worker pool, and the multiplexer
//! together and runs the accept/read loop.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use multichat::{Config, Engine, Server, WorkerPool};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=multichat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("multichat=info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.socket_addr()?;

    let engine = Arc::new(Engine::new());

    // The pool joins its workers when dropped, including on the error
    // path out of run()
    let dispatcher = Arc::clone(&engine);
    let pool = WorkerPool::new(config.workers, move |task| dispatcher.dispatch(task));
    info!("worker pool started with {} workers", config.workers);

    let mut server = Server::bind(addr, config.backlog, engine, pool.queue())?;
    info!("chat server listening on {}", server.local_addr());

    server.run()?;
    Ok(())
}
