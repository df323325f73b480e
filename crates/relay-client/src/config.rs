//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a relay client connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long a call waits for its response before settling with a
    /// timeout error, in milliseconds.
    pub call_timeout_ms: u64,
    /// Outbound send queue capacity.
    pub send_queue_capacity: usize,
}

impl ClientConfig {
    /// The call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            send_queue_capacity: 64,
        }
    }
}
