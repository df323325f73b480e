//! Client-side error type.

use relay_proto::ErrorObject;

/// Error returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection has not completed its handshake or has closed.
    #[error("not connected")]
    NotConnected,

    /// The underlying WebSocket transport failed.
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The call settled with an error: a structured error from the peer, or
    /// a locally synthesized parse-error-coded failure for a timeout or a
    /// refused send.
    #[error("call failed: {0}")]
    Call(ErrorObject),
}

impl ClientError {
    /// The structured error for a failed call, if this is a call failure.
    pub fn as_call_error(&self) -> Option<&ErrorObject> {
        match self {
            Self::Call(err) => Some(err),
            _ => None,
        }
    }
}
