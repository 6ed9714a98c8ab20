// ── Core error types ──
//
// User-facing errors from devlink-core. Authorization and validation
// failures are raised synchronously, before any transport call, so they
// never carry network latency. Backend failures surface per fan-out as
// a single fail-fast error for the whole batch.

use thiserror::Error;

use devlink_transport::TransportError;

/// Unified error type for the dispatch engine.
#[derive(Debug, Error)]
pub enum DispatchError {
    // ── Pre-network errors ──────────────────────────────────────────
    /// The principal has no access to any requested target.
    #[error("not authorized: {message}")]
    Unauthorized { message: String },

    /// Malformed payload or request shape.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The requested device is not known to the directory.
    #[error("device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    // ── Transport / backend errors ──────────────────────────────────
    /// Failure raised while handing the request to the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An ERROR-tagged reply from the backend for one target; fails the
    /// whole fan-out batch.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// The engine's reply channels were torn down mid-flight.
    #[error("dispatch engine stopped")]
    EngineStopped,

    // ── Internal errors ─────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}
