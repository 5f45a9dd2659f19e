//! Dispatch engine
//!
//! Workers hand every task to [`Engine::dispatch`], which owns the
//! registry behind the fair reader/writer lock. A message from an
//! unknown connection is its handshake; a message from an admitted
//! client is broadcast verbatim; a close tears the client down. Each
//! path acquires the registry lock in exactly one mode per critical
//! section.

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::error::SocketError;
use crate::pool::Task;
use crate::registry::Registry;
use crate::rwlock::FairRwLock;
use crate::types::ConnectionId;

/// Handshake field delimiter: `username|room1|room2|...`
const HANDSHAKE_DELIMITER: char = '|';

/// The shared chat state and its dispatch paths
///
/// The pending table holds each connection's outbound socket handle
/// between accept and admission, so the multiplexer never has to touch
/// the registry lock.
#[derive(Debug, Default)]
pub struct Engine {
    registry: FairRwLock<Registry>,
    pending: Mutex<HashMap<ConnectionId, TcpStream>>,
}

impl Engine {
    /// Create an engine with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over a freshly accepted connection's write handle
    ///
    /// Called by the multiplexer before the connection's first readable
    /// event can be dispatched.
    pub fn register_connection(&self, conn: ConnectionId, writer: TcpStream) {
        self.pending
            .lock()
            .expect("pending table poisoned")
            .insert(conn, writer);
    }

    /// Process one task to completion
    pub fn dispatch(&self, task: Task) {
        match task {
            Task::Message { conn, line } => {
                {
                    let registry = self.registry.read();
                    if registry.contains(conn) {
                        if let Err(e) = broadcast(&registry, conn, &line) {
                            error!("broadcast from {} failed: {}", conn, e);
                        }
                        return;
                    }
                }
                // Shared guard released; the handshake path takes the
                // lock exclusively.
                self.admit(conn, &line);
            }
            Task::Close { conn } => self.disconnect(conn),
        }
    }

    /// Handshake admission: `username|room1|room2|...`
    ///
    /// Zero rooms after the username is valid. An empty username is
    /// rejected; the connection stays unadmitted and may retry with its
    /// next line.
    fn admit(&self, conn: ConnectionId, line: &str) {
        let mut fields = line.split(HANDSHAKE_DELIMITER);
        let username = fields.next().unwrap_or("").to_string();
        if username.is_empty() {
            warn!("rejecting handshake with empty username from {}", conn);
            return;
        }
        let rooms: Vec<String> = fields.map(str::to_string).collect();

        let mut registry = self.registry.write();

        if registry.contains(conn) {
            // Another worker admitted this connection between our shared
            // check and here; the line is an ordinary chat message.
            drop(registry);
            let registry = self.registry.read();
            if let Err(e) = broadcast(&registry, conn, line) {
                error!("broadcast from {} failed: {}", conn, e);
            }
            return;
        }

        let Some(writer) = self
            .pending
            .lock()
            .expect("pending table poisoned")
            .remove(&conn)
        else {
            error!("handshake from unknown connection {}", conn);
            return;
        };

        info!(
            "connection {} admitted as '{}' joining {} room(s)",
            conn,
            username,
            rooms.len()
        );
        registry.admit(Client::new(conn, username, rooms, writer));
        drop(registry);

        // Announce under a fresh shared guard; the new member's own
        // connection is excluded like any sender.
        let registry = self.registry.read();
        if let Err(e) = broadcast(&registry, conn, "joined the room.") {
            error!("join notice from {} failed: {}", conn, e);
        }
    }

    /// Disconnect cleanup
    ///
    /// The leave notice, membership removal, room deletion, and client
    /// removal happen inside one exclusive critical section.
    fn disconnect(&self, conn: ConnectionId) {
        let never_admitted = self
            .pending
            .lock()
            .expect("pending table poisoned")
            .remove(&conn)
            .is_some();
        if never_admitted {
            debug!("connection {} closed before handshake", conn);
            return;
        }

        let mut registry = self.registry.write();
        if !registry.contains(conn) {
            debug!("close for unknown connection {}", conn);
            return;
        }

        if let Err(e) = broadcast(&registry, conn, "left the room.") {
            error!("leave notice from {} failed: {}", conn, e);
        }
        registry.remove(conn);
    }
}

/// Deliver `body` from `source` to every other member of the source's
/// rooms, in the `room : username : body` envelope
///
/// A recipient that turns out to be gone is logged and skipped; any
/// other write failure aborts the remaining delivery and is returned to
/// the caller. Requires at least a shared registry guard.
fn broadcast(registry: &Registry, source: ConnectionId, body: &str) -> Result<(), SocketError> {
    let Some(sender) = registry.client(source) else {
        debug!("broadcast for unadmitted connection {}", source);
        return Ok(());
    };

    for name in sender.rooms() {
        let Some(room) = registry.room(name) else {
            error!("client {} references missing room '{}'", source, name);
            continue;
        };

        let envelope = format!("{} : {} : {}\n", room.name, sender.username, body);
        for member in room.members() {
            if member == source {
                continue;
            }
            let Some(peer) = registry.client(member) else {
                error!("room '{}' lists unknown connection {}", room.name, member);
                continue;
            };
            match peer.send(&envelope) {
                Ok(()) => {}
                Err(SocketError::PeerGone) => {
                    warn!("dropping envelope for {}: peer gone", member);
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}
