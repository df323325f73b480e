//! Call correlation and inbound frame demultiplexing.
//!
//! One pending entry per outstanding call id, resolved exactly once. The
//! oneshot sender is consumed by the first settle; the loser of the
//! response/timeout race finds the entry gone and has no effect.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use relay_proto::ErrorObject;
use relay_proto::codec::{self, Inbound};

/// Callback invoked for each delivered notification.
pub type EventCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Terminal state of a call, exactly as carried by the response frame.
///
/// Both fields may be absent: that is a void success.
#[derive(Debug)]
pub(crate) struct Reply {
    /// Result payload, if any.
    pub result: Option<Value>,
    /// Structured error, if any.
    pub error: Option<ErrorObject>,
}

/// Client-side correlation state for one connection.
pub(crate) struct Correlator {
    // NOTE: see manual `Debug` impl below; `subscriptions` holds boxed
    // closures that cannot derive `Debug`.
    /// Next call id; starts at 1, incremented per call, never reused.
    next_id: AtomicU64,
    /// Outstanding calls keyed by id.
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    /// Registered notification callbacks keyed by event name.
    subscriptions: RwLock<HashMap<String, EventCallback>>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("next_id", &self.next_id)
            .field("pending", &self.pending)
            .field(
                "subscriptions",
                &format_args!("<{} callbacks>", self.subscriptions.read().len()),
            )
            .finish()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate the next call id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Track a pending call; the receiver settles when the matching
    /// response arrives.
    pub fn insert_pending(&self, id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        let _ = self.pending.lock().insert(id, tx);
        rx
    }

    /// Forget a pending call (timeout or send failure). Returns whether an
    /// entry was removed; a response arriving afterwards is dropped.
    pub fn remove_pending(&self, id: u64) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Settle a pending call. Returns `false` if the id is unknown or
    /// already settled.
    pub fn resolve(&self, id: u64, reply: Reply) -> bool {
        match self.pending.lock().remove(&id) {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Number of outstanding calls.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop every pending entry; their callers settle with a closed-channel
    /// error. Used when the connection closes.
    pub fn clear_pending(&self) {
        self.pending.lock().clear();
    }

    /// Register a notification callback for an event.
    pub fn register_callback(&self, event: &str, callback: EventCallback) {
        let _ = self
            .subscriptions
            .write()
            .insert(event.to_owned(), callback);
    }

    /// Remove a notification callback. Returns whether one was registered.
    pub fn remove_callback(&self, event: &str) -> bool {
        self.subscriptions.write().remove(event).is_some()
    }

    /// Demultiplex one inbound frame.
    ///
    /// Notifications with a registered callback are delivered synchronously
    /// and never touch the pending map. Everything else either settles its
    /// pending call or is silently dropped (stale, already timed out, or
    /// unrecognized).
    pub fn dispatch_inbound(&self, text: &str) {
        match codec::decode_inbound(text) {
            Ok(Inbound::Notification(n)) => {
                let callback = self.subscriptions.read().get(&n.notification).cloned();
                match callback {
                    Some(callback) => callback(n.params),
                    None => debug!(event = n.notification, "dropped unregistered notification"),
                }
            }
            Ok(Inbound::Response(r)) => {
                let Some(id) = r.id else {
                    debug!("dropped response without id");
                    return;
                };
                let reply = Reply {
                    result: r.result,
                    error: r.error,
                };
                if !self.resolve(id, reply) {
                    debug!(id, "dropped response for unknown or settled id");
                }
            }
            Err(e) => debug!(error = %e, "dropped undecodable frame"),
        }
    }
}
