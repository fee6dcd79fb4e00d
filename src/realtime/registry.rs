//! Live connection registry keyed by user email.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Frame pushed to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    Closed,
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for PushError {}

/// Sending half of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    email: String,
    tx: mpsc::UnboundedSender<PushMessage>,
}

impl ConnectionHandle {
    pub fn new(email: &str) -> (Self, mpsc::UnboundedReceiver<PushMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            email: normalize(email),
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn send(&self, event: &str, payload: serde_json::Value) -> Result<(), PushError> {
        self.tx
            .send(PushMessage {
                event: event.to_string(),
                payload,
            })
            .map_err(|_| PushError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Maps a user identity to its single live connection; the last connect wins.
pub trait ConnectionRegistry: Send + Sync {
    fn on_connect(&self, handle: ConnectionHandle);

    /// Removes the entry only if it still belongs to `handle`.
    fn on_disconnect(&self, handle: &ConnectionHandle);

    fn lookup(&self, email: &str) -> Option<ConnectionHandle>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn on_connect(&self, handle: ConnectionHandle) {
        debug!(email = %handle.email, connection_id = %handle.id, "Connection registered");
        self.connections.insert(handle.email.clone(), handle);
    }

    fn on_disconnect(&self, handle: &ConnectionHandle) {
        let removed = self
            .connections
            .remove_if(&handle.email, |_, current| current.id == handle.id);
        if removed.is_some() {
            debug!(email = %handle.email, connection_id = %handle.id, "Connection released");
        }
    }

    fn lookup(&self, email: &str) -> Option<ConnectionHandle> {
        self.connections
            .get(&normalize(email))
            .map(|entry| entry.value().clone())
    }

    fn len(&self) -> usize {
        self.connections.len()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = InMemoryConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::new("Alice@Example.com");
        registry.on_connect(handle.clone());

        let found = registry.lookup("alice@example.com").unwrap();
        assert_eq!(found.id(), handle.id());
        assert!(registry.lookup("bob@example.com").is_none());
    }

    #[test]
    fn test_last_connect_wins() {
        let registry = InMemoryConnectionRegistry::new();
        let (first, _rx1) = ConnectionHandle::new("a@x.com");
        let (second, _rx2) = ConnectionHandle::new("a@x.com");

        registry.on_connect(first.clone());
        registry.on_connect(second.clone());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("a@x.com").unwrap().id(), second.id());
    }

    #[test]
    fn test_stale_disconnect_keeps_newer_connection() {
        let registry = InMemoryConnectionRegistry::new();
        let (first, _rx1) = ConnectionHandle::new("a@x.com");
        let (second, _rx2) = ConnectionHandle::new("a@x.com");

        registry.on_connect(first.clone());
        registry.on_connect(second.clone());
        registry.on_disconnect(&first);
        assert_eq!(registry.lookup("a@x.com").unwrap().id(), second.id());

        registry.on_disconnect(&second);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_reports_closed_channel() {
        let (handle, rx) = ConnectionHandle::new("a@x.com");
        handle.send("Ping", serde_json::json!({})).unwrap();
        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(handle.send("Ping", serde_json::json!({})), Err(PushError::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connect_and_disconnect() {
        let registry = Arc::new(InMemoryConnectionRegistry::new());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let email = format!("user{}@x.com", i);
                    let (handle, _rx) = ConnectionHandle::new(&email);
                    registry.on_connect(handle.clone());
                    assert!(registry.lookup(&email).is_some());
                    if i % 2 == 0 {
                        registry.on_disconnect(&handle);
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len(), 32);
        assert!(registry.lookup("user1@x.com").is_some());
        assert!(registry.lookup("user0@x.com").is_none());
    }
}
