//! Session behavior against a channel-backed fake transport.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use lumicast_client::negotiate::StaticNegotiate;
use lumicast_client::session::{GroupSession, SessionOptions, SessionState};
use lumicast_client::transport::{Transport, TransportConn, TransportEvent};
use lumicast_core::protocol::envelope::Envelope;
use lumicast_core::Result;

/// The broker's half of a mock connection.
struct BrokerSide {
    outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<TransportEvent>,
}

impl BrokerSide {
    async fn push(&self, frame: impl Into<String>) {
        self.inbound
            .send(TransportEvent::Text(frame.into()))
            .await
            .unwrap();
    }

    async fn next_json(&mut self) -> serde_json::Value {
        let frame = self.outbound.recv().await.unwrap();
        serde_json::from_str(&frame).unwrap()
    }

    async fn drop_connection(&self) {
        self.inbound.send(TransportEvent::Closed).await.unwrap();
    }
}

/// Transport whose connections hand their broker half to the test.
struct MockTransport {
    hook: mpsc::Sender<BrokerSide>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _url: &str) -> Result<TransportConn> {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (ev_tx, ev_rx) = mpsc::channel(64);
        self.hook
            .send(BrokerSide {
                outbound: out_rx,
                inbound: ev_tx,
            })
            .await
            .map_err(|_| lumicast_core::LumicastError::Transport("harness gone".into()))?;
        Ok(TransportConn {
            tx: out_tx,
            events: ev_rx,
        })
    }
}

fn opts() -> SessionOptions {
    SessionOptions {
        hub: "AdaKiosk".to_string(),
        user: "kiosk-1".to_string(),
        group: "demogroup".to_string(),
        connect_timeout: Duration::from_secs(2),
        ack_timeout: Duration::from_secs(1),
        close_grace: Duration::from_millis(200),
        event_buffer: 16,
    }
}

/// Run the full connect handshake and return a joined session plus the
/// broker half of its connection.
async fn connected_session() -> (Arc<GroupSession>, BrokerSide) {
    let (hook_tx, mut hook_rx) = mpsc::channel(4);
    let session = Arc::new(GroupSession::new(
        opts(),
        Arc::new(StaticNegotiate::new("ws://mock")),
        Arc::new(MockTransport { hook: hook_tx }),
    ));

    let connecting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.connect().await })
    };

    let mut broker = hook_rx.recv().await.unwrap();
    broker
        .push(r#"{"type":"system","event":"connected","userId":"kiosk-1","connectionId":"c-1"}"#)
        .await;

    let join = broker.next_json().await;
    assert_eq!(join["type"], "joinGroup");
    assert_eq!(join["group"], "demogroup");
    let ack_id = join["ackId"].as_u64().unwrap();
    broker
        .push(format!(r#"{{"type":"ack","ackId":{ack_id},"success":true}}"#))
        .await;

    connecting.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::GroupJoined);
    (session, broker)
}

fn raw(value: serde_json::Value) -> Box<serde_json::value::RawValue> {
    serde_json::value::to_raw_value(&value).unwrap()
}

#[tokio::test]
async fn handshake_records_connection_id() {
    let (session, _broker) = connected_session().await;
    assert_eq!(session.connection_id().as_deref(), Some("c-1"));
    assert!(session.is_connected());
}

#[tokio::test]
async fn ack_ids_are_monotonic_across_send_paths() {
    let (session, mut broker) = connected_session().await;

    // join consumed ackId 1
    session.send(&raw(json!({"command": "Rainbow"})));
    let first = broker.next_json().await;
    assert_eq!(first["type"], "sendToGroup");
    assert_eq!(first["dataType"], "json");
    assert_eq!(first["ackId"], 2);

    let session2 = Arc::clone(&session);
    let waiting =
        tokio::spawn(async move {
            session2
                .send_and_wait(&raw(json!({"command": "Off"})), Duration::from_secs(1))
                .await
        });
    let second = broker.next_json().await;
    assert_eq!(second["ackId"], 3);
    broker
        .push(r#"{"type":"ack","ackId":3,"success":true}"#)
        .await;
    let envelope = waiting.await.unwrap().unwrap();
    assert!(envelope.is_success_ack());
}

#[tokio::test]
async fn concurrent_sends_resolve_out_of_order() {
    let (session, mut broker) = connected_session().await;

    let spawn_wait = |payload: serde_json::Value| {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .send_and_wait(&raw(payload), Duration::from_secs(1))
                .await
        })
    };
    let a = spawn_wait(json!({"command": "Rainbow"}));
    let first = broker.next_json().await;
    let b = spawn_wait(json!({"command": "Off"}));
    let second = broker.next_json().await;

    let id_a = first["ackId"].as_u64().unwrap();
    let id_b = second["ackId"].as_u64().unwrap();
    assert!(id_b > id_a);

    // Answer the second request first; each waiter must get its own ack.
    broker
        .push(format!(r#"{{"type":"ack","ackId":{id_b},"success":true}}"#))
        .await;
    broker
        .push(format!(r#"{{"type":"ack","ackId":{id_a},"success":false}}"#))
        .await;

    let env_b = b.await.unwrap().unwrap();
    let Envelope::Ack(ack_b) = env_b else {
        panic!("expected ack");
    };
    assert_eq!(ack_b.ack_id, id_b);
    assert!(ack_b.success);

    let env_a = a.await.unwrap().unwrap();
    let Envelope::Ack(ack_a) = env_a else {
        panic!("expected ack");
    };
    assert_eq!(ack_a.ack_id, id_a);
    assert!(!ack_a.success);
}

#[tokio::test]
async fn timeout_evicts_the_waiter_and_tolerates_a_late_ack() {
    let (session, mut broker) = connected_session().await;

    let envelope = session
        .send_and_wait(&raw(json!({"command": "Rainbow"})), Duration::from_millis(100))
        .await
        .unwrap();
    let Envelope::Error(err) = envelope else {
        panic!("expected synthesized error envelope");
    };
    assert_eq!(err.reason, "timeout");

    // The response shows up at 150ms; it must be ignored, not crash, and
    // must not resolve the next wait.
    let sent = broker.next_json().await;
    let late_id = sent["ackId"].as_u64().unwrap();
    broker
        .push(format!(r#"{{"type":"ack","ackId":{late_id},"success":true}}"#))
        .await;

    let session2 = Arc::clone(&session);
    let waiting = tokio::spawn(async move {
        session2
            .send_and_wait(&raw(json!({"command": "Off"})), Duration::from_secs(1))
            .await
    });
    let next = broker.next_json().await;
    let next_id = next["ackId"].as_u64().unwrap();
    assert_eq!(next_id, late_id + 1);
    broker
        .push(format!(r#"{{"type":"ack","ackId":{next_id},"success":true}}"#))
        .await;
    assert!(waiting.await.unwrap().unwrap().is_success_ack());

    assert_eq!(session.counters().timeouts, 1);
    assert_eq!(session.counters().stale_acks, 1);
}

#[tokio::test]
async fn own_echo_is_suppressed_but_resolves_a_reply_wait() {
    let (session, broker) = connected_session().await;
    let mut events = session.subscribe();

    let echo =
        r#"{"type":"message","from":"group","fromUserId":"kiosk-1","group":"demogroup","dataType":"json","data":"/state/off"}"#;
    let other =
        r#"{"type":"message","from":"group","fromUserId":"server","group":"demogroup","dataType":"json","data":"/state/on"}"#;

    let (received, _) = tokio::join!(session.receive(Duration::from_millis(500)), async {
        broker.push(echo).await;
    });
    let Envelope::Group(group) = received else {
        panic!("expected group envelope");
    };
    assert_eq!(group.from_user_id.as_deref(), Some("kiosk-1"));

    broker.push(other).await;
    let unsolicited = events.recv().await.unwrap();
    // The echo was processed first but never reached the stream.
    assert_eq!(unsolicited.from_user_id.as_deref(), Some("server"));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn newer_receive_cancels_the_previous_waiter() {
    let (session, broker) = connected_session().await;

    let session2 = Arc::clone(&session);
    let superseded =
        tokio::spawn(async move { session2.receive(Duration::from_secs(5)).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frame =
        r#"{"type":"message","from":"group","fromUserId":"server","group":"demogroup","dataType":"json","data":"/ping"}"#;
    let (current, _) = tokio::join!(session.receive(Duration::from_millis(500)), async {
        broker.push(frame).await;
    });

    // The older waiter learns it was superseded, not that the link died.
    let Envelope::Error(err) = superseded.await.unwrap() else {
        panic!("expected synthesized error envelope");
    };
    assert_eq!(err.reason, "cancelled");
    assert!(session.is_connected());

    let Envelope::Group(group) = current else {
        panic!("expected group envelope");
    };
    assert_eq!(group.from_user_id.as_deref(), Some("server"));
}

#[tokio::test]
async fn disconnect_mid_wait_resolves_with_disconnected() {
    let (session, mut broker) = connected_session().await;

    let session2 = Arc::clone(&session);
    let waiting = tokio::spawn(async move {
        session2
            .send_and_wait(&raw(json!({"command": "Rainbow"})), Duration::from_secs(5))
            .await
    });
    let _frame = broker.next_json().await;
    broker.drop_connection().await;

    let envelope = waiting.await.unwrap().unwrap();
    let Envelope::Error(err) = envelope else {
        panic!("expected synthesized error envelope");
    };
    assert_eq!(err.reason, "disconnected");
    assert_eq!(session.state(), SessionState::Disconnected);

    // The session does not reconnect on its own.
    let err = session
        .send_and_wait(&raw(json!({"command": "Off"})), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, lumicast_core::LumicastError::InvalidState(_)));
}

#[tokio::test]
async fn close_leaves_the_group_within_the_grace_period() {
    let (session, mut broker) = connected_session().await;

    let closing = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.close().await })
    };
    let leave = broker.next_json().await;
    assert_eq!(leave["type"], "leaveGroup");
    assert_eq!(leave["group"], "demogroup");
    let ack_id = leave["ackId"].as_u64().unwrap();
    broker
        .push(format!(r#"{{"type":"ack","ackId":{ack_id},"success":true}}"#))
        .await;

    closing.await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn close_without_leave_ack_still_completes() {
    let (session, mut broker) = connected_session().await;

    let closing = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.close().await })
    };
    let leave = broker.next_json().await;
    assert_eq!(leave["type"], "leaveGroup");
    // No ack; the grace period (200ms) must bound the close.
    closing.await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn join_rejection_surfaces_and_closes() {
    let (hook_tx, mut hook_rx) = mpsc::channel(4);
    let session = Arc::new(GroupSession::new(
        opts(),
        Arc::new(StaticNegotiate::new("ws://mock")),
        Arc::new(MockTransport { hook: hook_tx }),
    ));

    let connecting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.connect().await })
    };
    let mut broker = hook_rx.recv().await.unwrap();
    broker
        .push(r#"{"type":"system","event":"connected","userId":"kiosk-1","connectionId":"c-9"}"#)
        .await;
    let join = broker.next_json().await;
    let ack_id = join["ackId"].as_u64().unwrap();
    broker
        .push(format!(r#"{{"type":"ack","ackId":{ack_id},"success":false}}"#))
        .await;

    let err = connecting.await.unwrap().unwrap_err();
    assert!(matches!(err, lumicast_core::LumicastError::Protocol(_)));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn undecodable_frames_are_dropped_not_fatal() {
    let (session, broker) = connected_session().await;
    let mut events = session.subscribe();

    broker.push(r#"{"type":"presence","users":3}"#).await;
    broker.push("garbage").await;
    broker
        .push(r#"{"type":"message","from":"group","fromUserId":"server","group":"demogroup","dataType":"json","data":"/ping"}"#)
        .await;

    // The good frame after two bad ones still comes through.
    let unsolicited = events.recv().await.unwrap();
    assert_eq!(unsolicited.from_user_id.as_deref(), Some("server"));
    assert!(session.is_connected());
    assert_eq!(session.counters().decode_errors, 2);
}
