//! WebSocket session lifecycle — one admitted connection from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::connection::{ClientConnection, ConnectionId};
use crate::dispatch;
use crate::namespace::Namespace;

/// Run a WebSocket session for an admitted connection.
///
/// 1. Registers the connection in its namespace's client map
/// 2. Spawns a dispatch task per inbound text frame — handlers for one
///    connection are not serialized against each other
/// 3. Forwards outbound frames from the send queue, interleaved with
///    periodic Ping frames; disconnects after the pong timeout
/// 4. On close or error, removes the connection from the client map and
///    every subscriber set
#[instrument(skip_all, fields(conn_id = %conn_id, namespace = %namespace.path()))]
pub(crate) async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    namespace: Arc<Namespace>,
    config: Arc<ServerConfig>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(
        conn_id.clone(),
        namespace.path().to_owned(),
        send_tx,
    ));

    namespace.insert_client(connection.clone());
    info!("client connected");

    let ping_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(config.heartbeat_timeout_secs);

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop. Exits on close frame, transport error, or stream end.
    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => {
                let ns = namespace.clone();
                let conn = connection.clone();
                let text = text.to_string();
                // Dispatch concurrently so a slow handler does not block
                // later frames from this connection.
                let _ = tokio::spawn(async move {
                    let response = dispatch::handle_frame(&ns, &conn.id, &text).await;
                    if !conn.send(Arc::new(response)) {
                        debug!(conn_id = %conn.id, "failed to enqueue response");
                    }
                });
            }
            Message::Binary(data) => {
                debug!(len = data.len(), "ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
            }
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
        }
    }

    info!("client disconnected");
    outbound.abort();
    namespace.remove_client(&conn_id);
}
