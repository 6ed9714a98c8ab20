// ── Transport facade traits ──
//
// The engine talks to the partitioned backend exclusively through
// `Transport` (outbound) and receives replies through `ReplySink`
// (inbound). `send` is a non-blocking enqueue in producer style;
// awaiting happens over channels on the engine side, so both traits
// stay object-safe without boxed futures.

use crate::error::TransportError;
use crate::message::{Reply, Request};

/// Outbound half of the transport.
///
/// Implementations route each request by its partition key (or to all
/// partitions when the key is absent) and feed every backend reply into
/// the [`ReplySink`] they were constructed with.
pub trait Transport: Send + Sync {
    /// Enqueue a request that expects one or more replies.
    fn send(&self, request: Request) -> Result<(), TransportError>;

    /// Enqueue a fire-and-forget request. No reply is correlated;
    /// anything the backend echoes for it is dropped.
    fn send_one_way(&self, request: Request) -> Result<(), TransportError>;
}

/// Inbound half: the engine's reply router.
///
/// Called from transport delivery tasks -- potentially many at once, so
/// implementations must be safe under concurrent delivery.
pub trait ReplySink: Send + Sync {
    fn deliver(&self, reply: Reply);
}
