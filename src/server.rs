//! Connection multiplexer
//!
//! A single-threaded readiness loop over the listening socket and every
//! accepted client socket. It owns connection liveness and framing, and
//! nothing else: complete lines and disconnects are pushed onto the
//! task queue, so I/O responsiveness never depends on broadcast cost.

use std::collections::HashMap;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use mio::net::TcpStream;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Socket, Type};
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::error::{ServerError, SocketError};
use crate::framing::LineBuffer;
use crate::pool::{Task, TaskQueue};
use crate::types::ConnectionId;

/// Poll token reserved for the listening socket
const LISTENER: Token = Token(0);

/// Readiness events drained per poll wake
const EVENT_CAPACITY: usize = 256;

/// Read chunk size; the framing buffer reassembles lines across chunks
const READ_BUF_LEN: usize = 512;

/// One watched client connection
#[derive(Debug)]
struct Connection {
    id: ConnectionId,
    reader: TcpStream,
    buffer: LineBuffer,
}

/// The accept/read loop
///
/// Owns the listener, the poll instance, and the reader half of every
/// live connection. Writer halves are handed to the engine at accept
/// time and never touched here.
#[derive(Debug)]
pub struct Server {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
    poll: Poll,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    engine: Arc<Engine>,
    queue: Arc<TaskQueue>,
}

impl Server {
    /// Bind the listener and set up the readiness mechanism
    ///
    /// Any failure here is fatal to the process.
    pub fn bind(
        addr: SocketAddr,
        backlog: i32,
        engine: Arc<Engine>,
        queue: Arc<TaskQueue>,
    ) -> Result<Self, ServerError> {
        let socket =
            Socket::new(Domain::for_address(addr), Type::STREAM, None).map_err(ServerError::Setup)?;
        socket.set_reuse_address(true).map_err(ServerError::Setup)?;
        socket.bind(&addr.into()).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        socket.listen(backlog).map_err(ServerError::Listen)?;
        socket.set_nonblocking(true).map_err(ServerError::Setup)?;

        let listener: std::net::TcpListener = socket.into();
        let local_addr = listener.local_addr().map_err(ServerError::Setup)?;

        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(
                &mut SourceFd(&listener.as_raw_fd()),
                LISTENER,
                Interest::READABLE,
            )
            .map_err(ServerError::Poll)?;

        Ok(Self {
            listener,
            local_addr,
            poll,
            connections: HashMap::new(),
            next_token: 1,
            engine,
            queue,
        })
    }

    /// The address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the readiness loop
    ///
    /// Blocks the calling thread indefinitely; only a failing poll wait
    /// returns, and that is fatal.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        info!("listening on {}", self.local_addr);

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Poll(e));
            }

            let mut closing = Vec::new();
            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_pending(),
                    token => {
                        let mut close = false;
                        if event.is_readable() {
                            close |= self.read_ready(token);
                        }
                        if event.is_read_closed() || event.is_error() {
                            close = true;
                        }
                        if close {
                            closing.push(token);
                        }
                    }
                }
            }

            for token in closing {
                self.close_connection(token);
            }
        }
    }

    /// Accept every connection waiting on the listener
    ///
    /// Accept failures are logged; the loop keeps serving.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = self.watch_connection(stream, addr) {
                        error!("failed to set up connection from {}: {}", addr, e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    /// Register an accepted connection for readiness watching
    ///
    /// The writer half goes to the engine's pending table; the reader
    /// half is watched under a fresh token.
    fn watch_connection(
        &mut self,
        stream: std::net::TcpStream,
        addr: SocketAddr,
    ) -> io::Result<()> {
        stream.set_nonblocking(true)?;
        let writer = stream.try_clone()?;

        let id = ConnectionId(self.next_token);
        self.next_token += 1;
        let token = Token(id.0);

        let mut reader = TcpStream::from_std(stream);
        self.poll
            .registry()
            .register(&mut reader, token, Interest::READABLE)?;
        self.engine.register_connection(id, writer);

        info!("connection {} accepted from {}", id, addr);
        self.connections.insert(
            token,
            Connection {
                id,
                reader,
                buffer: LineBuffer::new(),
            },
        );
        Ok(())
    }

    /// Drain readable bytes, enqueueing one Message task per line
    ///
    /// Returns true if the connection must be closed. Lines framed
    /// before an end-of-stream or error are still enqueued first.
    fn read_ready(&mut self, token: Token) -> bool {
        let queue = Arc::clone(&self.queue);
        let Some(conn) = self.connections.get_mut(&token) else {
            return false;
        };

        let mut buf = [0u8; READ_BUF_LEN];
        let mut close = false;
        loop {
            match conn.reader.read(&mut buf) {
                Ok(0) => {
                    debug!("connection {} closed by peer", conn.id);
                    close = true;
                    break;
                }
                Ok(n) => conn.buffer.extend(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    match SocketError::classify(e) {
                        SocketError::PeerGone => {
                            debug!("connection {} reset by peer", conn.id);
                        }
                        SocketError::Io(e) => {
                            error!("read error on connection {}: {}", conn.id, e);
                        }
                    }
                    close = true;
                    break;
                }
            }
        }

        while let Some(line) = conn.buffer.next_line() {
            queue.push(Task::Message { conn: conn.id, line });
        }

        close
    }

    /// Tear down a connection marked for closure
    ///
    /// Removing the map entry makes the once-only Close guarantee
    /// structural: a token marked twice in one iteration is gone on the
    /// second call. The Close task is enqueued before the reader handle
    /// is released.
    fn close_connection(&mut self, token: Token) {
        let Some(mut conn) = self.connections.remove(&token) else {
            return;
        };

        self.queue.push(Task::Close { conn: conn.id });

        if let Err(e) = self.poll.registry().deregister(&mut conn.reader) {
            warn!("failed to deregister connection {}: {}", conn.id, e);
        }
        info!("connection {} closed", conn.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let engine = Arc::new(Engine::new());
        let queue = Arc::new(TaskQueue::new());
        let server = Server::bind("127.0.0.1:0".parse().unwrap(), 5, engine, queue).unwrap();

        assert_ne!(server.local_addr().port(), 0);
    }
}
