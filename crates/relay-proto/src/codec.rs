//! Text-frame encode/decode.
//!
//! Decoding that does not yield a syntactically valid envelope fails with
//! [`ParseError`]; callers translate that into a protocol `-32700` response
//! with `id: null`.

use serde::Deserialize;

use crate::types::{Notification, Request, Response};

/// A frame failed to decode into a valid envelope.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Not valid JSON, or valid JSON missing the fields the envelope needs.
    #[error("invalid envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

/// An inbound frame on the client side, classified per the protocol rule:
/// a frame with `notification` set is a notification, otherwise a frame
/// with an `id` is a call response.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    /// Server-pushed event.
    Notification(Notification),
    /// Response to an outstanding call.
    Response(Response),
}

/// Encode a request frame.
pub fn encode_request(request: &Request) -> Result<String, ParseError> {
    Ok(serde_json::to_string(request)?)
}

/// Encode a response frame.
pub fn encode_response(response: &Response) -> Result<String, ParseError> {
    Ok(serde_json::to_string(response)?)
}

/// Encode a notification frame.
pub fn encode_notification(notification: &Notification) -> Result<String, ParseError> {
    Ok(serde_json::to_string(notification)?)
}

/// Decode an inbound server-side frame as a request.
pub fn decode_request(text: &str) -> Result<Request, ParseError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode an inbound client-side frame as a response or notification.
pub fn decode_inbound(text: &str) -> Result<Inbound, ParseError> {
    Ok(serde_json::from_str(text)?)
}
