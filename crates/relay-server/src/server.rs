//! `RelayServer` — axum WebSocket gateway plus health endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::connection::ConnectionId;
use crate::dispatch::{MethodError, MethodHandler};
use crate::error::RegistryError;
use crate::registry::ServerRegistry;
use crate::session;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Namespace registry.
    pub registry: Arc<ServerRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// GET /health payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is serving.
    pub status: &'static str,
    /// Seconds since the server was created.
    pub uptime_secs: u64,
    /// Currently connected peers across all namespaces.
    pub connections: usize,
}

/// The relay server: a namespace registry behind a WebSocket gateway.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<ServerRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server with its own registry (default namespace included).
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(ServerRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// The namespace registry.
    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Register a method handler (see [`ServerRegistry::register_method`]).
    pub fn register_method(
        &self,
        path: &str,
        name: &str,
        handler: impl MethodHandler + 'static,
    ) -> Result<(), RegistryError> {
        self.registry.register_method(path, name, handler)
    }

    /// Register an async closure as a method handler.
    pub fn register_fn<F, Fut>(&self, path: &str, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<Value>, ConnectionId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, MethodError>> + Send + 'static,
    {
        self.registry.register_fn(path, name, f)
    }

    /// Declare an event (see [`ServerRegistry::declare_event`]).
    pub fn declare_event(&self, path: &str, name: &str) -> Result<(), RegistryError> {
        self.registry.declare_event(path, name)
    }

    /// Broadcast a notification (see [`ServerRegistry::emit`]).
    pub fn emit(&self, path: &str, event: &str, params: Vec<Value>) -> usize {
        self.registry.emit(path, event, params)
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/", get(ws_root_handler))
            .route("/{namespace}", get(ws_handler))
            .with_state(state)
    }

    /// Bind and serve. Returns the bound address and the serve task handle;
    /// the task ends when the shutdown coordinator fires.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
        });

        info!(%addr, "relay server listening");
        Ok((addr, handle))
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: state.registry.connection_count(),
    })
}

/// GET / — upgrade into the default namespace.
async fn ws_root_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    accept(ws, "/", &state)
}

/// GET /{namespace} — upgrade into a named namespace.
async fn ws_handler(
    Path(segment): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    accept(ws, &format!("/{segment}"), &state)
}

/// Admit or reject a connection before any message flows.
///
/// The target path must match the namespace pattern and must already exist
/// in the registry; the namespace is fixed here for the connection's
/// lifetime.
fn accept(ws: WebSocketUpgrade, path: &str, state: &AppState) -> Response {
    if !ServerRegistry::is_valid_path(path) {
        warn!(path, "rejected connection: invalid namespace path");
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Some(namespace) = state.registry.get(path) else {
        warn!(path, "rejected connection: unknown namespace");
        return StatusCode::NOT_FOUND.into_response();
    };

    let conn_id = ConnectionId::new();
    let config = state.config.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| session::run_ws_session(socket, conn_id, namespace, config))
}
