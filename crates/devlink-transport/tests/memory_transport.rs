// Integration tests for `MemoryTransport` delivery semantics.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use devlink_transport::{
    CorrelationId, MemoryTransport, Reply, ReplySink, ReplyTag, Request, SubscriptionId,
    Transport, TransportError,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// ReplySink that forwards everything into an mpsc channel.
struct ChannelSink(mpsc::UnboundedSender<Reply>);

impl ReplySink for ChannelSink {
    fn deliver(&self, reply: Reply) {
        let _ = self.0.send(reply);
    }
}

fn channel_sink() -> (Arc<ChannelSink>, mpsc::UnboundedReceiver<Reply>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelSink(tx)), rx)
}

fn request(partition: Option<&str>, body: serde_json::Value) -> Request {
    Request {
        correlation_id: CorrelationId::new(),
        subscription_id: None,
        partition_key: partition.map(str::to_owned),
        single_reply: true,
        body,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn echo_handler_round_trip() {
    let (sink, mut rx) = channel_sink();
    let transport = MemoryTransport::with_handler(
        sink,
        Arc::new(|req| vec![Reply::initial(req.correlation_id, None, req.body.clone())]),
    );

    let req = request(Some("device-1"), json!({"hello": "world"}));
    let correlation_id = req.correlation_id;
    transport.send(req).expect("send");

    let reply = rx.recv().await.expect("reply");
    assert_eq!(reply.correlation_id, correlation_id);
    assert_eq!(reply.tag, ReplyTag::Initial);
    assert_eq!(reply.body, json!({"hello": "world"}));
}

#[tokio::test]
async fn per_partition_order_is_preserved() {
    let (sink, mut rx) = channel_sink();
    let transport = MemoryTransport::with_handler(
        sink,
        Arc::new(|req| vec![Reply::initial(req.correlation_id, None, req.body.clone())]),
    );

    for n in 0..20 {
        transport
            .send(request(Some("device-1"), json!(n)))
            .expect("send");
    }

    for n in 0..20 {
        let reply = rx.recv().await.expect("reply");
        assert_eq!(reply.body, json!(n), "out-of-order delivery at {n}");
    }
}

#[tokio::test]
async fn failed_partition_rejects_sends() {
    let (sink, _rx) = channel_sink();
    let transport = MemoryTransport::new(sink);
    transport.fail_partition("device-2");

    let err = transport
        .send(request(Some("device-2"), json!({})))
        .expect_err("send should fail");
    assert!(matches!(
        err,
        TransportError::SendFailed { partition: Some(p), .. } if p == "device-2"
    ));

    // Other partitions are unaffected.
    transport
        .send(request(Some("device-1"), json!({})))
        .expect("healthy partition still sends");
}

#[tokio::test]
async fn closed_transport_rejects_sends() {
    let (sink, _rx) = channel_sink();
    let transport = MemoryTransport::new(sink);
    transport.close();

    let err = transport
        .send(request(Some("device-1"), json!({})))
        .expect_err("send after close");
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn one_way_replies_are_dropped() {
    let (sink, mut rx) = channel_sink();
    let transport = MemoryTransport::with_handler(
        sink,
        Arc::new(|req| vec![Reply::initial(req.correlation_id, None, json!("echo"))]),
    );

    transport
        .send_one_way(request(Some("device-1"), json!({})))
        .expect("one-way send");
    // A correlated request on the same lane proves the worker processed
    // the one-way request without delivering its reply.
    transport
        .send(request(Some("device-1"), json!({})))
        .expect("send");

    let reply = rx.recv().await.expect("reply");
    assert_eq!(reply.body, json!("echo"));
    assert!(rx.try_recv().is_err(), "one-way reply leaked");
}

#[tokio::test]
async fn broadcast_lane_handles_keyless_requests() {
    let (sink, mut rx) = channel_sink();
    let transport = MemoryTransport::with_handler(
        sink,
        Arc::new(|req| {
            vec![Reply::initial(
                req.correlation_id,
                req.subscription_id,
                json!([]),
            )]
        }),
    );

    let mut req = request(None, json!({"action": "subscribe"}));
    req.subscription_id = Some(SubscriptionId::new());
    let sub_id = req.subscription_id;
    transport.send(req).expect("broadcast send");

    let reply = rx.recv().await.expect("reply");
    assert_eq!(reply.subscription_id, sub_id);
    assert_eq!(reply.body, json!([]));
}

#[tokio::test]
async fn injected_replies_reach_the_sink() {
    let (sink, mut rx) = channel_sink();
    let transport = MemoryTransport::new(sink);

    let sub_id = SubscriptionId::new();
    transport.inject(Reply::event(CorrelationId::new(), sub_id, json!({"n": 1})));

    let reply = rx.recv().await.expect("reply");
    assert_eq!(reply.tag, ReplyTag::Event);
    assert_eq!(reply.subscription_id, Some(sub_id));
}
