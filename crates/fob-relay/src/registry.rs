//! Connection registry with heartbeat sweep.
//!
//! Owned by the relay event loop; never shared between tasks, so it needs no
//! locking.

use crate::transport::{Connection, ConnectionId};
use std::collections::BTreeMap;
use tracing::debug;

/// Trusted connections of one relay, ordered by arrival.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection) {
        self.connections.insert(connection.id(), connection);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections registered right now; later joins are not included.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.values().cloned().collect()
    }

    /// Close and forget every connection.
    pub fn terminate_all(&mut self) {
        for connection in self.connections.values() {
            connection.terminate();
        }
        self.connections.clear();
    }

    /// One heartbeat tick.
    ///
    /// A connection that has not answered the previous tick's ping is
    /// terminated and removed; every other one is marked dead and pinged.
    /// Connections whose transport already went away are pruned. Returns the
    /// removed ids.
    pub fn heartbeat(&mut self) -> Vec<ConnectionId> {
        let mut removed = Vec::new();

        for (id, connection) in &self.connections {
            if !connection.is_open() {
                removed.push(*id);
            } else if !connection.is_alive() {
                debug!("Connection {} missed a heartbeat, terminating", id);
                connection.terminate();
                removed.push(*id);
            } else {
                connection.set_alive(false);
                connection.ping();
            }
        }

        for id in &removed {
            self.connections.remove(id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connection::{IdGenerator, Outbound};
    use crate::transport::TransportKind;

    #[test]
    fn test_insert_remove_snapshot() {
        let ids = IdGenerator::default();
        let mut registry = ConnectionRegistry::new();
        let (a, _ra) = Connection::new(ids.next(), TransportKind::Ws);
        let (b, _rb) = Connection::new(ids.next(), TransportKind::Ws);
        registry.insert(a.clone());
        registry.insert(b.clone());

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.iter().map(Connection::id).collect::<Vec<_>>(),
            vec![a.id(), b.id()]
        );

        assert!(registry.remove(a.id()).is_some());
        assert!(registry.remove(a.id()).is_none());
        assert!(!registry.contains(a.id()));
        assert_eq!(registry.len(), 1);

        // earlier snapshot is unaffected
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_unresponsive_connection_reaped_on_second_tick() {
        let mut registry = ConnectionRegistry::new();
        let (connection, mut rx) = Connection::new(IdGenerator::default().next(), TransportKind::Ws);
        registry.insert(connection.clone());

        assert!(registry.heartbeat().is_empty());
        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
        assert!(!connection.is_alive());

        assert_eq!(registry.heartbeat(), vec![connection.id()]);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pong_keeps_connection() {
        let mut registry = ConnectionRegistry::new();
        let (connection, mut rx) = Connection::new(IdGenerator::default().next(), TransportKind::Ws);
        registry.insert(connection.clone());

        for _ in 0..5 {
            assert!(registry.heartbeat().is_empty());
            assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
            connection.mark_alive();
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_closed_transport_pruned() {
        let mut registry = ConnectionRegistry::new();
        let (connection, rx) = Connection::new(IdGenerator::default().next(), TransportKind::Ws);
        registry.insert(connection.clone());
        drop(rx);

        assert_eq!(registry.heartbeat(), vec![connection.id()]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_terminate_all() {
        let ids = IdGenerator::default();
        let mut registry = ConnectionRegistry::new();
        let (a, mut ra) = Connection::new(ids.next(), TransportKind::Polling);
        registry.insert(a);
        registry.terminate_all();

        assert!(registry.is_empty());
        assert_eq!(ra.try_recv().unwrap(), Outbound::Close);

        // no connections: still fine
        registry.terminate_all();
    }
}
