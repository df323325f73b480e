//! A namespace: one isolated partition of connections, methods, and events.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::connection::{ClientConnection, ConnectionId};
use crate::dispatch::MethodHandler;
use crate::error::RegistryError;

/// Per-path partition of the server.
///
/// Owns the connected peers, the registered method handlers, and the
/// declared events with their subscriber sets. All mutation goes through
/// these operations; the maps are never exposed for direct mutation, so the
/// subscriber-set/client-set consistency invariant holds here.
pub struct Namespace {
    path: String,
    clients: DashMap<ConnectionId, Arc<ClientConnection>>,
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
    events: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl Namespace {
    /// Create an empty namespace for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            clients: DashMap::new(),
            methods: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
        }
    }

    /// The namespace path (e.g. `"/"`, `"/chat"`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Admit a connection.
    pub fn insert_client(&self, connection: Arc<ClientConnection>) {
        let _ = self.clients.insert(connection.id.clone(), connection);
    }

    /// Remove a connection and scrub it from every event's subscriber set.
    pub fn remove_client(&self, id: &ConnectionId) {
        let _ = self.clients.remove(id);
        let mut events = self.events.write();
        for subscribers in events.values_mut() {
            let _ = subscribers.remove(id);
        }
    }

    /// Number of connected peers.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Register a method handler. Re-registering a name replaces the handler.
    pub fn register_method(&self, name: &str, handler: Arc<dyn MethodHandler>) {
        let _ = self.methods.write().insert(name.to_owned(), handler);
    }

    /// Look up a registered handler.
    pub fn method(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.methods.read().get(name).cloned()
    }

    /// Whether a method is registered.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    /// Declare an event, creating an empty subscriber set.
    ///
    /// Declaring a duplicate name is a programming error, not a merge.
    pub fn declare_event(&self, name: &str) -> Result<(), RegistryError> {
        let mut events = self.events.write();
        if events.contains_key(name) {
            return Err(RegistryError::EventExists {
                namespace: self.path.clone(),
                event: name.to_owned(),
            });
        }
        let _ = events.insert(name.to_owned(), HashSet::new());
        Ok(())
    }

    /// Whether an event is declared.
    pub fn has_event(&self, name: &str) -> bool {
        self.events.read().contains_key(name)
    }

    /// Add a connection to an event's subscriber set.
    ///
    /// Returns `false` if the event is not declared.
    pub fn subscribe(&self, event: &str, id: &ConnectionId) -> bool {
        let mut events = self.events.write();
        match events.get_mut(event) {
            Some(subscribers) => {
                let _ = subscribers.insert(id.clone());
                true
            }
            None => false,
        }
    }

    /// Remove a connection from an event's subscriber set.
    ///
    /// Removing a connection that is not subscribed is a no-op success;
    /// returns `false` only if the event is not declared.
    pub fn unsubscribe(&self, event: &str, id: &ConnectionId) -> bool {
        let mut events = self.events.write();
        match events.get_mut(event) {
            Some(subscribers) => {
                let _ = subscribers.remove(id);
                true
            }
            None => false,
        }
    }

    /// Currently-subscribed, currently-connected peers for an event.
    ///
    /// Subscriber ids are filtered against the live client map, so a stale
    /// id never yields a send attempt.
    pub fn subscribers(&self, event: &str) -> Vec<Arc<ClientConnection>> {
        let ids: Vec<ConnectionId> = match self.events.read().get(event) {
            Some(subscribers) => subscribers.iter().cloned().collect(),
            None => return Vec::new(),
        };
        ids.iter()
            .filter_map(|id| self.clients.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Whether a connection is currently subscribed to an event.
    pub fn is_subscribed(&self, event: &str, id: &ConnectionId) -> bool {
        self.events
            .read()
            .get(event)
            .is_some_and(|subscribers| subscribers.contains(id))
    }
}
