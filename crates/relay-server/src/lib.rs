//! # relay-server
//!
//! Server side of the relay JSON-RPC 2.0 transport.
//!
//! - Namespace registry: per-path client maps, method tables, and event
//!   subscriber sets behind invariant-preserving operations
//! - Dispatcher: decode → resolve namespace → route (control method,
//!   registered handler, or error) → execute → respond
//! - Notification fan-out with independent per-peer delivery
//! - Axum `WebSocket` gateway: accept-time namespace validation, per-frame
//!   dispatch tasks, ping/pong liveness, graceful shutdown

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod namespace;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use connection::{ClientConnection, ConnectionId};
pub use dispatch::{MethodError, MethodHandler};
pub use error::RegistryError;
pub use registry::ServerRegistry;
pub use server::RelayServer;
