//! Connection registry: the authoritative set of live connections and
//! username bindings.
//!
//! Owned exclusively by the dispatcher task, with no interior locking. Reader
//! tasks never touch these maps; they only enqueue events.

use hubbub_core::ChatMessage;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// A live connection as the dispatcher sees it.
struct ConnectionEntry {
    /// Bound username once the connection has authenticated.
    username: Option<String>,
    /// Sole write path to this peer; consumed by its writer task.
    tx: mpsc::Sender<ChatMessage>,
}

/// Live connections indexed by id, plus the username → id binding map.
pub struct ConnectionRegistry {
    conns: HashMap<u64, ConnectionEntry>,
    users: HashMap<String, u64>,
    /// Monotonic id source. Never reset and never reused; deliberately not
    /// derived from the current live-set size.
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: HashMap::new(),
            users: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a connection and assign it a fresh id.
    pub fn register(&mut self, tx: mpsc::Sender<ChatMessage>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.conns.insert(id, ConnectionEntry { username: None, tx });
        debug!(conn_id = id, live = self.conns.len(), "connection registered");
        id
    }

    /// Remove a connection and any username binding pointing at it.
    /// Idempotent; dropping the entry closes the peer's outbound channel.
    pub fn unregister(&mut self, id: u64) {
        if let Some(entry) = self.conns.remove(&id) {
            if let Some(name) = entry.username {
                // Only drop the binding if it still points at this connection;
                // a re-login may have moved it to a newer one.
                if self.users.get(&name) == Some(&id) {
                    self.users.remove(&name);
                }
            }
            debug!(conn_id = id, live = self.conns.len(), "connection unregistered");
        }
    }

    /// Bind `username` to connection `id`, overwriting any prior binding.
    pub fn bind_username(&mut self, username: &str, id: u64) {
        if let Some(old_id) = self.users.insert(username.to_string(), id) {
            if old_id != id {
                if let Some(old) = self.conns.get_mut(&old_id) {
                    old.username = None;
                }
                debug!(username = %username, old_conn = old_id, new_conn = id, "binding moved");
            }
        }
        if let Some(entry) = self.conns.get_mut(&id) {
            entry.username = Some(username.to_string());
        }
    }

    /// Drop the binding for `username`, if any.
    pub fn unbind_username(&mut self, username: &str) {
        if let Some(id) = self.users.remove(username) {
            if let Some(entry) = self.conns.get_mut(&id) {
                entry.username = None;
            }
        }
    }

    /// Connection id currently bound to `username`.
    pub fn lookup_by_username(&self, username: &str) -> Option<u64> {
        self.users.get(username).copied()
    }

    /// Username bound to connection `id`, if authenticated.
    pub fn username_of(&self, id: u64) -> Option<&str> {
        self.conns.get(&id).and_then(|e| e.username.as_deref())
    }

    /// Outbound sender for connection `id`.
    pub fn sender(&self, id: u64) -> Option<mpsc::Sender<ChatMessage>> {
        self.conns.get(&id).map(|e| e.tx.clone())
    }

    /// Ids of all live connections, for broadcast iteration.
    pub fn live_ids(&self) -> Vec<u64> {
        self.conns.keys().copied().collect()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.conns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan() -> mpsc::Sender<ChatMessage> {
        mpsc::channel(8).0
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut reg = ConnectionRegistry::new();
        let a = reg.register(chan());
        let b = reg.register(chan());
        reg.unregister(a);
        let c = reg.register(chan());
        assert!(b > a);
        assert!(c > b, "id {c} reused after unregistering {a}");
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut reg = ConnectionRegistry::new();
        let id = reg.register(chan());
        reg.unregister(id);
        reg.unregister(id);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn unregister_drops_binding() {
        let mut reg = ConnectionRegistry::new();
        let id = reg.register(chan());
        reg.bind_username("alice", id);
        assert_eq!(reg.lookup_by_username("alice"), Some(id));
        reg.unregister(id);
        assert_eq!(reg.lookup_by_username("alice"), None);
    }

    #[test]
    fn rebinding_overwrites_and_clears_old_entry() {
        let mut reg = ConnectionRegistry::new();
        let first = reg.register(chan());
        let second = reg.register(chan());
        reg.bind_username("alice", first);
        reg.bind_username("alice", second);

        assert_eq!(reg.lookup_by_username("alice"), Some(second));
        assert_eq!(reg.username_of(first), None);
        assert_eq!(reg.username_of(second), Some("alice"));

        // Closing the older connection must not steal the moved binding.
        reg.unregister(first);
        assert_eq!(reg.lookup_by_username("alice"), Some(second));
    }

    #[test]
    fn live_ids_cover_all_connections() {
        let mut reg = ConnectionRegistry::new();
        let a = reg.register(chan());
        let b = reg.register(chan());
        let mut ids = reg.live_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![a, b]);
    }
}
