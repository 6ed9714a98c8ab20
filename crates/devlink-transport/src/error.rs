// ── Transport error types ──
//
// Failures raised at the transport boundary. The dispatch engine maps
// these into its own user-facing taxonomy -- consumers of devlink-core
// never handle a raw transport error for authorization or validation
// failures, only for genuine delivery problems.

use thiserror::Error;

/// Top-level error type for the `devlink-transport` crate.
#[derive(Debug, Error)]
pub enum TransportError {
    // ── Delivery ────────────────────────────────────────────────────
    /// The backend refused or failed to accept the request.
    #[error("send failed for partition {partition:?}: {reason}")]
    SendFailed {
        partition: Option<String>,
        reason: String,
    },

    /// The transport has shut down; no further requests can be sent.
    #[error("transport closed")]
    Closed,

    // ── Encoding ────────────────────────────────────────────────────
    /// Payload could not be serialized into the opaque body.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
