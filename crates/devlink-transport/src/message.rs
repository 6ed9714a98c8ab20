// ── Transport messages ──
//
// Request and reply envelopes exchanged with the partitioned backend.
// Bodies are opaque JSON -- the engine defines the payloads, the
// transport only routes them by partition key and correlates replies.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Ids ──────────────────────────────────────────────────────────────

/// Opaque token linking a reply to its originating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier shared by all per-target requests of one logical
/// subscription, and carried by every push event delivered under it.
///
/// Unique for process lifetime -- generated, never user-supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ── Request ──────────────────────────────────────────────────────────

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub correlation_id: CorrelationId,

    /// Present on subscribe/unsubscribe traffic; absent on plain
    /// request/response round trips.
    pub subscription_id: Option<SubscriptionId>,

    /// Routing key for the partitioned backend. `None` means broadcast
    /// to every partition.
    pub partition_key: Option<String>,

    /// `true` when exactly one terminal reply is expected; `false` when
    /// the request opens an indefinite reply stream.
    pub single_reply: bool,

    pub body: serde_json::Value,
}

// ── Reply ────────────────────────────────────────────────────────────

/// Classification of an inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyTag {
    /// First (terminal) reply to a request: a command echo or the
    /// initial result collection of a subscribe.
    Initial,
    /// Push event delivered under a live subscription id.
    Event,
    /// Per-target failure reported by the backend.
    Error,
}

/// Inbound reply envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub correlation_id: CorrelationId,
    pub subscription_id: Option<SubscriptionId>,
    pub tag: ReplyTag,
    pub body: serde_json::Value,
}

impl Reply {
    #[must_use]
    pub fn initial(
        correlation_id: CorrelationId,
        subscription_id: Option<SubscriptionId>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            correlation_id,
            subscription_id,
            tag: ReplyTag::Initial,
            body,
        }
    }

    #[must_use]
    pub fn event(
        correlation_id: CorrelationId,
        subscription_id: SubscriptionId,
        body: serde_json::Value,
    ) -> Self {
        Self {
            correlation_id,
            subscription_id: Some(subscription_id),
            tag: ReplyTag::Event,
            body,
        }
    }

    #[must_use]
    pub fn error(
        correlation_id: CorrelationId,
        subscription_id: Option<SubscriptionId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            subscription_id,
            tag: ReplyTag::Error,
            body: serde_json::json!({ "error": message.into() }),
        }
    }

    /// Extract the error message from an `Error`-tagged reply body.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified backend error")
            .to_owned()
    }
}
