//! # relay-client
//!
//! Client side of the relay JSON-RPC 2.0 transport.
//!
//! Multiplexes concurrent calls over one WebSocket connection:
//! - Monotonic call ids, one pending entry per outstanding call
//! - Each call settles exactly once — matching response, send failure, or
//!   timeout, whichever fires first
//! - Event subscriptions via the `rpc.on` / `rpc.off` control methods, with
//!   notifications demultiplexed to registered callbacks

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;

pub use client::RelayClient;
pub use config::ClientConfig;
pub use correlator::EventCallback;
pub use error::ClientError;
