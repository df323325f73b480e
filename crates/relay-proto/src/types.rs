//! JSON-RPC 2.0 envelope types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors;

/// Protocol version string carried on every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved control method: subscribe to an event.
pub const METHOD_SUBSCRIBE: &str = "rpc.on";
/// Reserved control method: unsubscribe from an event.
pub const METHOD_UNSUBSCRIBE: &str = "rpc.off";

fn version() -> String {
    JSONRPC_VERSION.to_owned()
}

/// A call request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version (carried, not enforced).
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// Caller-assigned identifier, unique among that caller's outstanding calls.
    pub id: u64,
    /// Method name — application method or control method (`rpc.on` / `rpc.off`).
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Request {
    /// Build a request frame.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: version(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A call response.
///
/// Exactly one of `result` / `error` is set on responses the server
/// produces; a response with neither is a void success.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version.
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// Echoed request identifier; `null` when the request id is unknown
    /// (parse errors).
    #[serde(default)]
    pub id: Option<u64>,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Build a success response. `result` may be `None` for a void success.
    pub fn success(id: u64, result: Option<Value>) -> Self {
        Self {
            jsonrpc: version(),
            id: Some(id),
            result,
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: Option<u64>, error: ErrorObject) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Build the `id: null` response for an undecodable frame.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::error(None, ErrorObject::from_code(errors::PARSE_ERROR))
    }
}

/// A server-pushed event frame, not tied to any request identifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// Protocol version.
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// Event name.
    pub notification: String,
    /// Event payload.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Notification {
    /// Build a notification frame.
    pub fn new(event: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: version(),
            notification: event.into(),
            params,
        }
    }
}

/// Structured error carried inside a [`Response`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Fixed numeric code (see [`crate::errors`]).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Build an error with an explicit message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Build an error carrying the default message for `code`.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        Self::new(code, errors::default_message(code))
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}
