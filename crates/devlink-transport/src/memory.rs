// ── In-memory partitioned transport ──
//
// A broker-free `Transport` for tests, demos, and embedded setups.
// Each partition key gets its own worker task and queue, so delivery
// preserves per-partition order while different partitions deliver
// concurrently -- the same model a real partitioned backend presents.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::facade::{ReplySink, Transport};
use crate::message::{Reply, Request};

/// Synchronous handler invoked on a partition worker for each request.
/// Returned replies are delivered to the engine's [`ReplySink`].
pub type RequestHandler = Arc<dyn Fn(&Request) -> Vec<Reply> + Send + Sync>;

/// Queue entry: the request plus whether handler replies should be
/// delivered (`false` for one-way traffic).
struct QueuedRequest {
    request: Request,
    deliver_replies: bool,
}

/// In-process implementation of [`Transport`].
///
/// Cheaply cloneable; all clones share the same partitions, request log,
/// and failure injection state.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryTransportInner>,
}

struct MemoryTransportInner {
    sink: Arc<dyn ReplySink>,
    handler: RequestHandler,
    /// One worker queue per partition key; `None` is the broadcast lane.
    partitions: Mutex<HashMap<Option<String>, mpsc::UnboundedSender<QueuedRequest>>>,
    /// Every request ever accepted, in acceptance order. For assertions.
    sent: Mutex<Vec<Request>>,
    /// Partition keys whose sends fail with `SendFailed`.
    failed_partitions: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Create a transport whose handler produces no replies.
    /// Replies can still be pushed manually via [`inject`](Self::inject).
    #[must_use]
    pub fn new(sink: Arc<dyn ReplySink>) -> Self {
        Self::with_handler(sink, Arc::new(|_| Vec::new()))
    }

    /// Create a transport with a backend-simulation handler.
    #[must_use]
    pub fn with_handler(sink: Arc<dyn ReplySink>, handler: RequestHandler) -> Self {
        Self {
            inner: Arc::new(MemoryTransportInner {
                sink,
                handler,
                partitions: Mutex::new(HashMap::new()),
                sent: Mutex::new(Vec::new()),
                failed_partitions: Mutex::new(HashSet::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Push a reply straight into the engine, as a backend would for an
    /// asynchronous push event.
    pub fn inject(&self, reply: Reply) {
        self.inner.sink.deliver(reply);
    }

    /// Make future sends to `partition` fail with
    /// [`TransportError::SendFailed`].
    pub fn fail_partition(&self, partition: impl Into<String>) {
        if let Ok(mut failed) = self.inner.failed_partitions.lock() {
            failed.insert(partition.into());
        }
    }

    /// Stop accepting requests. In-flight worker queues drain normally.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Snapshot of every accepted request, in acceptance order.
    #[must_use]
    pub fn sent_requests(&self) -> Vec<Request> {
        self.inner
            .sent
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn enqueue(&self, request: Request, deliver_replies: bool) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        if let Some(key) = &request.partition_key {
            let failed = self
                .inner
                .failed_partitions
                .lock()
                .map(|f| f.contains(key))
                .unwrap_or(false);
            if failed {
                debug!(partition = %key, "injected send failure");
                return Err(TransportError::SendFailed {
                    partition: Some(key.clone()),
                    reason: "partition unavailable".into(),
                });
            }
        }

        if let Ok(mut log) = self.inner.sent.lock() {
            log.push(request.clone());
        }

        let tx = self.worker_for(request.partition_key.clone());
        tx.send(QueuedRequest {
            request,
            deliver_replies,
        })
        .map_err(|_| TransportError::Closed)
    }

    /// Get or lazily spawn the worker task for a partition lane.
    fn worker_for(&self, key: Option<String>) -> mpsc::UnboundedSender<QueuedRequest> {
        let mut partitions = match self.inner.partitions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(tx) = partitions.get(&key) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedRequest>();
        let sink = Arc::clone(&self.inner.sink);
        let handler = Arc::clone(&self.inner.handler);
        let lane = key.clone();

        tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let replies = (handler)(&queued.request);
                if queued.deliver_replies {
                    for reply in replies {
                        sink.deliver(reply);
                    }
                } else if !replies.is_empty() {
                    warn!(
                        partition = ?lane,
                        count = replies.len(),
                        "dropping handler replies for one-way request"
                    );
                }
            }
        });

        partitions.insert(key, tx.clone());
        tx
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(request, true)
    }

    fn send_one_way(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(request, false)
    }
}
