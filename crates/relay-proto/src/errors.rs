//! Fixed JSON-RPC error codes.

/// Frame is not valid JSON or not a valid envelope.
pub const PARSE_ERROR: i64 = -32700;
/// Method absent from the resolved namespace's table.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Control-method params missing/empty or event unknown.
pub const INVALID_PARAMS: i64 = -32602;
/// Failure inside dispatch itself (not inside the user handler).
pub const INTERNAL_ERROR: i64 = -32603;
/// A registered handler failed; message/data taken from the failure.
pub const APPLICATION_ERROR: i64 = -32000;

/// Default human-readable message for a known error code.
#[must_use]
pub fn default_message(code: i64) -> &'static str {
    match code {
        PARSE_ERROR => "Parse error",
        METHOD_NOT_FOUND => "Method not found",
        INVALID_PARAMS => "Invalid params",
        INTERNAL_ERROR => "Internal error",
        APPLICATION_ERROR => "Application error",
        _ => "Unknown error",
    }
}
