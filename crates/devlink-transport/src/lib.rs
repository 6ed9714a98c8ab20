// devlink-transport: opaque partitioned request/reply transport facade.

pub mod error;
pub mod facade;
pub mod memory;
pub mod message;

pub use error::TransportError;
pub use facade::{ReplySink, Transport};
pub use memory::{MemoryTransport, RequestHandler};
pub use message::{CorrelationId, Reply, ReplyTag, Request, SubscriptionId};
