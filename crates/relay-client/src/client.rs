//! WebSocket client: connect, call, subscribe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use relay_proto::codec;
use relay_proto::errors::PARSE_ERROR;
use relay_proto::types::{METHOD_SUBSCRIBE, METHOD_UNSUBSCRIBE};
use relay_proto::{ErrorObject, Request};

use crate::config::ClientConfig;
use crate::correlator::{Correlator, EventCallback};
use crate::error::ClientError;

/// Outbound frame for the write task.
enum OutFrame {
    Text(String),
    Close,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    correlator: Correlator,
    out_tx: mpsc::Sender<OutFrame>,
    connected: AtomicBool,
}

/// A connected relay client.
///
/// Cheap to clone; all clones share one connection. Obtainable only from
/// [`RelayClient::connect`], which returns after the WebSocket handshake
/// completes — so every operation runs on an established connection or
/// fails fast with [`ClientError::NotConnected`] once it closes.
#[derive(Clone, Debug)]
pub struct RelayClient {
    inner: Arc<ClientInner>,
}

impl RelayClient {
    /// Connect with default configuration.
    ///
    /// The URL path selects the namespace (e.g. `ws://host:port/chat`).
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        Self::connect_with(url, ClientConfig::default()).await
    }

    /// Connect with explicit configuration.
    pub async fn connect_with(url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        info!(url, "connected");
        let (mut ws_tx, mut ws_rx) = stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<OutFrame>(config.send_queue_capacity);
        let inner = Arc::new(ClientInner {
            config,
            correlator: Correlator::new(),
            out_tx,
            connected: AtomicBool::new(true),
        });

        // Write task: drain the outbound queue into the socket.
        let _ = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                match frame {
                    OutFrame::Text(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    OutFrame::Close => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        // Read task: demultiplex inbound frames until close or error.
        let read_inner = inner.clone();
        let _ = tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        read_inner.correlator.dispatch_inbound(text.as_str());
                    }
                    Ok(Message::Close(_)) => {
                        debug!("server sent close frame");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "read failed");
                        break;
                    }
                }
            }
            read_inner.connected.store(false, Ordering::Relaxed);
            // Wake every outstanding caller; their calls settle as closed.
            read_inner.correlator.clear_pending();
        });

        Ok(Self { inner })
    }

    /// Whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    /// Call a remote method and await its outcome.
    ///
    /// Settles exactly once: with the matching response (`Ok` result or
    /// structured error), with a parse-error-coded failure if the transport
    /// refuses the send, or with a parse-error-coded failure when the call
    /// timeout elapses — whichever fires first. A response arriving after
    /// the timeout is dropped.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Option<Value>, ClientError> {
        let inner = &self.inner;
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let id = inner.correlator.next_id();
        let rx = inner.correlator.insert_pending(id);

        let frame = match codec::encode_request(&Request::new(id, method, params)) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = inner.correlator.remove_pending(id);
                return Err(ClientError::Call(ErrorObject::new(
                    PARSE_ERROR,
                    e.to_string(),
                )));
            }
        };

        if inner.out_tx.send(OutFrame::Text(frame)).await.is_err() {
            let _ = inner.correlator.remove_pending(id);
            return Err(ClientError::Call(ErrorObject::new(
                PARSE_ERROR,
                "transport refused the send",
            )));
        }

        match tokio::time::timeout(inner.config.call_timeout(), rx).await {
            Ok(Ok(reply)) => match reply.error {
                Some(error) => Err(ClientError::Call(error)),
                None => Ok(reply.result),
            },
            // Connection closed while the call was in flight
            Ok(Err(_)) => Err(ClientError::NotConnected),
            Err(_elapsed) => {
                // The entry is gone: the peer's eventual response is dropped.
                let _ = inner.correlator.remove_pending(id);
                Err(ClientError::Call(ErrorObject::new(
                    PARSE_ERROR,
                    format!("call '{method}' timed out"),
                )))
            }
        }
    }

    /// Subscribe to a named event.
    ///
    /// The callback is registered locally before the `rpc.on` round-trip,
    /// so a notification racing the acknowledgement is still delivered. The
    /// registration is kept even if the acknowledgement fails.
    pub async fn subscribe<F>(&self, event: &str, callback: F) -> Result<(), ClientError>
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.subscribe_arc(event, Arc::new(callback)).await
    }

    /// [`subscribe`](Self::subscribe) with a pre-built callback.
    pub async fn subscribe_arc(
        &self,
        event: &str,
        callback: EventCallback,
    ) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.inner.correlator.register_callback(event, callback);
        let _ = self
            .call(METHOD_SUBSCRIBE, vec![Value::String(event.to_owned())])
            .await?;
        Ok(())
    }

    /// Unsubscribe from a named event: the local callback is removed, then
    /// `rpc.off` is performed.
    pub async fn unsubscribe(&self, event: &str) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let _ = self.inner.correlator.remove_callback(event);
        let _ = self
            .call(METHOD_UNSUBSCRIBE, vec![Value::String(event.to_owned())])
            .await?;
        Ok(())
    }

    /// Close the connection. Outstanding calls settle as closed.
    pub async fn close(&self) {
        self.inner.connected.store(false, Ordering::Relaxed);
        let _ = self.inner.out_tx.send(OutFrame::Close).await;
    }
}
