//! Registry and accept-time errors.
//!
//! These are programming or configuration errors surfaced to the embedding
//! application; wire-level errors use the numeric codes in
//! [`relay_proto::errors`].

/// Error returned by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The event name is already declared in this namespace.
    #[error("event '{event}' already declared in namespace '{namespace}'")]
    EventExists {
        /// Namespace path.
        namespace: String,
        /// Event name.
        event: String,
    },

    /// The method name is reserved for protocol control methods.
    #[error("method name '{0}' is reserved")]
    ReservedMethod(String),

    /// The namespace path does not match the accepted pattern
    /// (a single leading slash followed by letters, digits, or underscores).
    #[error("invalid namespace path '{0}'")]
    InvalidPath(String),
}
