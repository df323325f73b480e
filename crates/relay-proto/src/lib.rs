//! # relay-proto
//!
//! JSON-RPC 2.0 wire format shared by the relay client and server.
//!
//! - Envelope types: [`Request`], [`Response`], [`Notification`], [`ErrorObject`]
//! - Fixed numeric error codes in [`errors`]
//! - Text-frame encode/decode in [`codec`], including inbound frame
//!   classification (call response vs. notification)
//!
//! The `jsonrpc` version field is carried on every frame but not enforced
//! against other versions.

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod types;

pub use codec::{Inbound, ParseError};
pub use types::{ErrorObject, Notification, Request, Response};
