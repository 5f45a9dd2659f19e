//! Basic type definitions for the chat server
//!
//! Provides the `ConnectionId` newtype used to identify a live client
//! socket across the multiplexer, the task queue, and the registry.

/// Unique connection identifier (newtype pattern)
///
/// Wraps the poll token assigned at accept time. Tokens increase
/// monotonically and are never reused for the lifetime of the process,
/// so a stale task can never alias a newer connection.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub usize);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "#7");
    }

    #[test]
    fn test_connection_id_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(ConnectionId(1), "a");
        map.insert(ConnectionId(2), "b");

        assert_eq!(map.get(&ConnectionId(1)), Some(&"a"));
        assert_ne!(ConnectionId(1), ConnectionId(2));
    }
}
