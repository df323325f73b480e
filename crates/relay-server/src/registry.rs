//! Server-wide namespace registry and notification fan-out.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use relay_proto::Notification;
use relay_proto::codec;

use crate::dispatch::{self, FnHandler, MethodError, MethodHandler};
use crate::error::RegistryError;
use crate::namespace::Namespace;

/// The default namespace, always present.
pub const DEFAULT_NAMESPACE: &str = "/";

/// A single leading slash followed by letters, digits, or underscores.
static NAMESPACE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^/[0-9A-Za-z_]*$").expect("static pattern compiles"));

/// Owns every namespace for one server instance.
///
/// Explicitly constructed and injected into the server — never ambient
/// module state. Namespaces are created lazily on first registration or
/// first event declaration and live until the registry is dropped.
pub struct ServerRegistry {
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl ServerRegistry {
    /// Create a registry containing the default `"/"` namespace.
    pub fn new() -> Self {
        let namespaces = DashMap::new();
        let _ = namespaces.insert(
            DEFAULT_NAMESPACE.to_owned(),
            Arc::new(Namespace::new(DEFAULT_NAMESPACE)),
        );
        Self { namespaces }
    }

    /// Whether `path` matches the accepted namespace pattern.
    #[must_use]
    pub fn is_valid_path(path: &str) -> bool {
        NAMESPACE_PATH.is_match(path)
    }

    /// Get or lazily create the namespace at `path`.
    pub fn namespace(&self, path: &str) -> Result<Arc<Namespace>, RegistryError> {
        if !Self::is_valid_path(path) {
            return Err(RegistryError::InvalidPath(path.to_owned()));
        }
        Ok(self
            .namespaces
            .entry(path.to_owned())
            .or_insert_with(|| Arc::new(Namespace::new(path)))
            .clone())
    }

    /// Look up an existing namespace without creating it.
    ///
    /// This is the accept path: a connection whose target path is absent
    /// here is rejected before any message flows.
    pub fn get(&self, path: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(path).map(|entry| entry.value().clone())
    }

    /// Register a method handler in a namespace (idempotent upsert).
    ///
    /// Reserved control-method names are rejected.
    pub fn register_method(
        &self,
        path: &str,
        name: &str,
        handler: impl MethodHandler + 'static,
    ) -> Result<(), RegistryError> {
        if dispatch::is_reserved(name) {
            return Err(RegistryError::ReservedMethod(name.to_owned()));
        }
        self.namespace(path)?.register_method(name, Arc::new(handler));
        Ok(())
    }

    /// Register an async closure as a method handler.
    pub fn register_fn<F, Fut>(&self, path: &str, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<Value>, crate::connection::ConnectionId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, MethodError>> + Send + 'static,
    {
        self.register_method(path, name, FnHandler(f))
    }

    /// Declare an event in a namespace.
    pub fn declare_event(&self, path: &str, name: &str) -> Result<(), RegistryError> {
        self.namespace(path)?.declare_event(name)
    }

    /// Broadcast a notification to every subscribed peer in a namespace.
    ///
    /// Unknown namespaces and undeclared events are a silent no-op — firing
    /// into the void is safe. Delivery is independent per peer; returns the
    /// number of peers the frame was enqueued for.
    pub fn emit(&self, path: &str, event: &str, params: Vec<Value>) -> usize {
        let Some(namespace) = self.get(path) else {
            debug!(path, event, "emit to unknown namespace dropped");
            return 0;
        };
        if !namespace.has_event(event) {
            debug!(path, event, "emit to undeclared event dropped");
            return 0;
        }

        let frame = match codec::encode_notification(&Notification::new(event, params)) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                warn!(event, error = %e, "failed to serialize notification");
                return 0;
            }
        };

        let mut delivered = 0;
        for conn in namespace.subscribers(event) {
            if conn.send(frame.clone()) {
                delivered += 1;
            } else {
                warn!(conn_id = %conn.id, event, "failed to enqueue notification");
            }
        }
        debug!(path, event, delivered, "notification fan-out");
        delivered
    }

    /// Total connected peers across all namespaces.
    pub fn connection_count(&self) -> usize {
        self.namespaces
            .iter()
            .map(|entry| entry.value().client_count())
            .sum()
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
