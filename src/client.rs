//! Client struct definition and the outbound send path
//!
//! A `Client` is the registry's record of an admitted, named connection:
//! its identifier, username, joined rooms, and the socket handle used to
//! deliver broadcast envelopes to it.

use std::io::{self, Write};
use std::net::TcpStream;

use crate::error::SocketError;
use crate::types::ConnectionId;

/// An admitted client and its room memberships
///
/// Created by the dispatch engine when a connection's first complete line
/// parses as a handshake; destroyed when the connection's `Close` task is
/// processed. The writer is this connection's own OS handle for outbound
/// traffic; the inbound handle stays with the multiplexer.
#[derive(Debug)]
pub struct Client {
    /// Connection this client was admitted on
    pub id: ConnectionId,
    /// Username from the handshake line
    pub username: String,
    /// Names of the rooms this client belongs to
    rooms: Vec<String>,
    /// Outbound socket handle
    writer: TcpStream,
}

impl Client {
    /// Create a client record for an admitted connection
    pub fn new(id: ConnectionId, username: String, rooms: Vec<String>, writer: TcpStream) -> Self {
        Self {
            id,
            username,
            rooms,
            writer,
        }
    }

    /// Rooms this client is a member of
    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    /// Deliver a formatted envelope to this client
    ///
    /// Loops until every byte is written. Returns `PeerGone` if the client
    /// vanished mid-send; any other I/O failure is passed through.
    pub fn send(&self, envelope: &str) -> Result<(), SocketError> {
        let mut writer = &self.writer;
        send_all(&mut writer, envelope.as_bytes())
    }
}

/// Write all of `bytes`, tolerating partial writes
///
/// The socket may accept any prefix per call; this loops until the whole
/// message is transmitted. `WouldBlock` and `Interrupted` are retried, a
/// zero-length write counts as the peer being gone.
pub fn send_all<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), SocketError> {
    let mut sent = 0;
    while sent < bytes.len() {
        match writer.write(&bytes[sent..]) {
            Ok(0) => return Err(SocketError::PeerGone),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SocketError::classify(e)),
        }
    }
    Ok(())
}
