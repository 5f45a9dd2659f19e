//! Room/client registry
//!
//! The authoritative in-memory model of clients, rooms, and membership.
//! `admit` and `remove` are the only mutation entry points; everything
//! else is a read used by broadcast traversal. Callers serialize access
//! through the engine's reader/writer lock.

use std::collections::HashMap;

use tracing::{debug, error};

use crate::client::Client;
use crate::room::Room;
use crate::types::ConnectionId;

/// All clients and rooms, keyed for O(1) lookup
///
/// Invariants upheld by the two mutators:
/// - membership is symmetric: a connection is in a room's member set
///   exactly when the room's name is in that client's room list;
/// - a room exists exactly while it has members — `remove` deletes any
///   room it empties before returning.
#[derive(Debug, Default)]
pub struct Registry {
    /// Admitted clients: ConnectionId -> Client
    clients: HashMap<ConnectionId, Client>,
    /// Live rooms: name -> Room
    rooms: HashMap<String, Room>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a connection has been admitted
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Look up an admitted client
    pub fn client(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Look up a live room by name
    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Number of admitted clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Admit a client, creating and joining its rooms
    ///
    /// Any room named in the client's list that does not exist yet is
    /// created. Admitting an already-admitted connection is a logged
    /// no-op, never a silent overwrite.
    pub fn admit(&mut self, client: Client) {
        if self.clients.contains_key(&client.id) {
            error!("connection {} is already admitted, ignoring", client.id);
            return;
        }

        for name in client.rooms() {
            self.rooms
                .entry(name.clone())
                .or_insert_with(|| Room::new(name.clone()))
                .add_member(client.id);
        }
        self.clients.insert(client.id, client);

        debug!(
            "total clients: {}, total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Remove a client and clean up its memberships
    ///
    /// Every room the client belonged to loses the membership; rooms
    /// emptied by that loss are deleted in the same call. Returns the
    /// removed client, or None if the connection was never admitted.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Client> {
        let client = self.clients.remove(&id)?;

        for name in client.rooms() {
            let emptied = match self.rooms.get_mut(name) {
                Some(room) => {
                    room.remove_member(id);
                    room.is_empty()
                }
                None => {
                    error!("client {} references missing room '{}'", id, name);
                    false
                }
            };
            if emptied {
                self.rooms.remove(name);
                debug!("room '{}' deleted (empty)", name);
            }
        }

        debug!(
            "total clients: {}, total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );

        Some(client)
    }
}
