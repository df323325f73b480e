//! Frame routing: decode → route → execute → respond.
//!
//! The two reserved control methods are checked before the namespace's
//! method table; everything else goes through the registered handler or
//! becomes a `-32601` response.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use relay_proto::codec;
use relay_proto::errors::{APPLICATION_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use relay_proto::types::{METHOD_SUBSCRIBE, METHOD_UNSUBSCRIBE};
use relay_proto::{ErrorObject, Request, Response};

use crate::connection::ConnectionId;
use crate::namespace::Namespace;

/// Whether `name` is reserved for protocol control methods.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    name == METHOD_SUBSCRIBE || name == METHOD_UNSUBSCRIBE
}

/// Failure returned by a method handler.
///
/// Becomes a `-32000` response carrying the message and, if present, the
/// structured payload. Handler failures never tear down the connection.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct MethodError {
    /// Human-readable message for the error response.
    pub message: String,
    /// Optional structured payload for the response's `data` field.
    pub data: Option<Value>,
}

impl MethodError {
    /// Build a failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Trait implemented by every application method handler.
///
/// Handlers may suspend; frames from the same connection keep being
/// dispatched while one handler is pending.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler with the call's params and originating connection.
    ///
    /// `Ok(None)` becomes a success response with an absent `result`.
    async fn handle(
        &self,
        params: Vec<Value>,
        conn: ConnectionId,
    ) -> Result<Option<Value>, MethodError>;
}

/// Adapter turning an async closure into a [`MethodHandler`].
pub(crate) struct FnHandler<F>(pub F);

/// Wrap an async closure as a shareable handler.
pub(crate) fn fn_handler<F, Fut>(f: F) -> Arc<dyn MethodHandler>
where
    F: Fn(Vec<Value>, ConnectionId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, MethodError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Vec<Value>, ConnectionId) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>, MethodError>> + Send + 'static,
{
    async fn handle(
        &self,
        params: Vec<Value>,
        conn: ConnectionId,
    ) -> Result<Option<Value>, MethodError> {
        (self.0)(params, conn).await
    }
}

/// Handle one inbound text frame for a connection.
///
/// Always produces a serialized response frame: decode failures become the
/// `id: null` parse-error response, handler failures become application
/// errors.
pub(crate) async fn handle_frame(namespace: &Namespace, conn: &ConnectionId, text: &str) -> String {
    let request = match codec::decode_request(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(conn_id = %conn, error = %e, "undecodable frame");
            return encode(&Response::parse_error());
        }
    };

    debug!(conn_id = %conn, method = request.method, id = request.id, "dispatching");
    let response = route(namespace, conn, request).await;
    encode(&response)
}

async fn route(namespace: &Namespace, conn: &ConnectionId, request: Request) -> Response {
    let Request {
        id, method, params, ..
    } = request;

    match method.as_str() {
        METHOD_SUBSCRIBE => control_subscribe(namespace, conn, id, &params),
        METHOD_UNSUBSCRIBE => control_unsubscribe(namespace, conn, id, &params),
        _ => {
            let Some(handler) = namespace.method(&method) else {
                return Response::error(Some(id), ErrorObject::from_code(METHOD_NOT_FOUND));
            };
            execute(handler, conn, id, params).await
        }
    }
}

async fn execute(
    handler: Arc<dyn MethodHandler>,
    conn: &ConnectionId,
    id: u64,
    params: Vec<Value>,
) -> Response {
    match handler.handle(params, conn.clone()).await {
        Ok(result) => Response::success(id, result),
        Err(err) => {
            let mut error = ErrorObject::new(APPLICATION_ERROR, err.message);
            if let Some(data) = err.data {
                error = error.with_data(data);
            }
            Response::error(Some(id), error)
        }
    }
}

/// `rpc.on` — add the connection to the event's subscriber set.
fn control_subscribe(
    namespace: &Namespace,
    conn: &ConnectionId,
    id: u64,
    params: &[Value],
) -> Response {
    match event_param(params) {
        Some(event) if namespace.subscribe(event, conn) => {
            Response::success(id, Some(json!({ event: true })))
        }
        Some(event) => invalid_params(id, &format!("unknown event '{event}'")),
        None => invalid_params(id, "expected an event name"),
    }
}

/// `rpc.off` — symmetric removal; unsubscribing while not subscribed is a
/// no-op success.
fn control_unsubscribe(
    namespace: &Namespace,
    conn: &ConnectionId,
    id: u64,
    params: &[Value],
) -> Response {
    match event_param(params) {
        Some(event) if namespace.unsubscribe(event, conn) => {
            Response::success(id, Some(json!({ event: false })))
        }
        Some(event) => invalid_params(id, &format!("unknown event '{event}'")),
        None => invalid_params(id, "expected an event name"),
    }
}

fn event_param(params: &[Value]) -> Option<&str> {
    params.first().and_then(Value::as_str)
}

fn invalid_params(id: u64, detail: &str) -> Response {
    Response::error(
        Some(id),
        ErrorObject::new(INVALID_PARAMS, format!("Invalid params: {detail}")),
    )
}

fn encode(response: &Response) -> String {
    codec::encode_response(response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        encode_fallback(response.id)
    })
}

/// Last-resort `-32603` frame when the real response cannot be serialized.
fn encode_fallback(id: Option<u64>) -> String {
    let id = id.map_or_else(|| "null".to_owned(), |id| id.to_string());
    format!(
        r#"{{"jsonrpc":"2.0","id":{id},"error":{{"code":-32603,"message":"Internal error"}}}}"#
    )
}
