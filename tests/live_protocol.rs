//! End-to-end socket protocol tests through the coordinator's text entry point.
//!
//! Each client is an mpsc channel standing in for the socket writer, so the
//! frames below are exactly what a browser would send and receive.

mod common;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use common::drain;
use crosslearn::backend::live::{BoundUser, ConnectionId, LiveCoordinator};
use crosslearn::shared::{ServerEvent, SessionStatus};

struct Client {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

async fn connect(live: &LiveCoordinator, user: Option<BoundUser>) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = live.connect(tx, user).await;
    let mut client = Client { id, rx };
    let greeting = drain(&mut client.rx);
    assert_eq!(greeting, vec![json!({ "event": "connected", "data": { "sid": id.to_string() } })]);
    client
}

async fn send(live: &LiveCoordinator, client: &Client, frame: Value) {
    live.handle_text(client.id, &frame.to_string()).await;
}

fn ack_result(events: &[Value], id: u64) -> Value {
    events
        .iter()
        .find(|e| e["event"] == "ack" && e["data"]["id"] == id)
        .map(|e| e["data"]["result"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_classroom_flow() {
    let live = LiveCoordinator::new();
    let mut teacher = connect(&live, None).await;
    let mut student = connect(&live, None).await;

    send(
        &live,
        &teacher,
        json!({ "event": "join_session", "ack": 1, "data": { "session_id": "s1", "user_id": "t", "user_name": "Tess" } }),
    )
    .await;
    let events = drain(&mut teacher.rx);
    assert_eq!(
        ack_result(&events, 1),
        json!({ "success": true, "participants": [{ "user_id": "t", "user_name": "Tess" }], "peers": [] })
    );

    // Numeric ids are accepted and normalized to strings.
    send(
        &live,
        &student,
        json!({ "event": "join_session", "ack": 2, "data": { "session_id": "s1", "user_id": 42, "user_name": "Sam" } }),
    )
    .await;
    let events = drain(&mut student.rx);
    let participants = ack_result(&events, 2)["participants"].clone();
    assert_eq!(participants.as_array().map(Vec::len), Some(2));
    assert_eq!(
        drain(&mut teacher.rx),
        vec![json!({ "event": "user_joined", "data": { "user_id": "42", "user_name": "Sam", "session_id": "s1" } })]
    );

    // Chat reaches everyone in the room, sender included.
    send(
        &live,
        &student,
        json!({ "event": "send_message", "data": { "session_id": "s1", "message": { "content": "hi" } } }),
    )
    .await;
    let expected = json!({ "event": "new_message", "data": { "content": "hi" } });
    assert_eq!(drain(&mut teacher.rx), vec![expected.clone()]);
    assert_eq!(drain(&mut student.rx), vec![expected]);

    // Whiteboard updates skip the sender.
    send(
        &live,
        &teacher,
        json!({ "event": "whiteboard_update", "data": { "session_id": "s1", "elements": [1], "appState": { "zoom": 2 }, "user_id": "t" } }),
    )
    .await;
    assert!(drain(&mut teacher.rx).is_empty());
    assert_eq!(
        drain(&mut student.rx),
        vec![json!({ "event": "whiteboard_changed", "data": { "elements": [1], "app_state": { "zoom": 2 }, "user_id": "t" } })]
    );

    live.disconnect(student.id).await;
    assert_eq!(
        drain(&mut teacher.rx),
        vec![json!({ "event": "user_left", "data": { "user_id": "42", "session_id": "s1" } })]
    );
    assert_eq!(live.participants("s1").await.len(), 1);

    live.disconnect(teacher.id).await;
    assert_eq!(live.room_count().await, 0);
    assert_eq!(live.connection_count().await, 0);
}

#[tokio::test]
async fn test_voice_signaling_flow() {
    let live = LiveCoordinator::new();
    let mut a = connect(&live, None).await;
    let mut b = connect(&live, None).await;

    send(&live, &a, json!({ "event": "webrtc_join", "ack": 1, "data": { "session_id": "v", "user_id": "a", "user_name": "A" } })).await;
    assert_eq!(ack_result(&drain(&mut a.rx), 1), json!({ "success": true, "peers": [] }));

    // Joining the room for chat lets `a` see later voice notices.
    send(&live, &a, json!({ "event": "join_session", "data": { "session_id": "v", "user_id": "a", "user_name": "A" } })).await;

    send(&live, &b, json!({ "event": "webrtc_join", "ack": 2, "data": { "session_id": "v", "user_id": "b", "user_name": "B" } })).await;
    assert_eq!(
        ack_result(&drain(&mut b.rx), 2),
        json!({ "success": true, "peers": [{ "user_id": "a", "user_name": "A" }] })
    );
    assert_eq!(
        drain(&mut a.rx),
        vec![json!({ "event": "peer_joined", "data": { "user_id": "b", "user_name": "B" } })]
    );

    send(
        &live,
        &b,
        json!({ "event": "webrtc_signal", "ack": 3, "data": { "session_id": "v", "target_user_id": "a", "from_user_id": "b", "signal": { "sdp": "offer" } } }),
    )
    .await;
    assert_eq!(ack_result(&drain(&mut b.rx), 3), json!({ "success": true }));
    assert_eq!(
        drain(&mut a.rx),
        vec![json!({ "event": "webrtc_signal", "data": { "from_user_id": "b", "signal": { "sdp": "offer" } } })]
    );

    send(&live, &b, json!({ "event": "webrtc_signal", "ack": 4, "data": { "session_id": "v", "target_user_id": "nobody", "signal": {} } })).await;
    assert_eq!(ack_result(&drain(&mut b.rx), 4), json!({ "error": "Target peer not found" }));

    send(&live, &b, json!({ "event": "webrtc_leave", "ack": 5, "data": { "session_id": "v", "user_id": "b" } })).await;
    assert_eq!(ack_result(&drain(&mut b.rx), 5), json!({ "success": true }));
    assert_eq!(drain(&mut a.rx), vec![json!({ "event": "peer_left", "data": { "user_id": "b" } })]);

    send(&live, &b, json!({ "event": "webrtc_leave", "ack": 6, "data": { "session_id": "v", "user_id": "b" } })).await;
    assert_eq!(ack_result(&drain(&mut b.rx), 6), json!({ "error": "Peer not found" }));
}

#[tokio::test]
async fn test_bad_frames() {
    let live = LiveCoordinator::new();
    let mut client = connect(&live, None).await;

    live.handle_text(client.id, "not json").await;
    let events = drain(&mut client.rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "error");

    send(&live, &client, json!({ "event": "launch_rockets", "ack": 9, "data": {} })).await;
    let events = drain(&mut client.rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "error");

    // A rejected request without an ack id produces no reply at all.
    send(&live, &client, json!({ "event": "join_session", "data": { "session_id": "x" } })).await;
    assert!(drain(&mut client.rx).is_empty());

    send(&live, &client, json!({ "event": "join_session", "ack": 10, "data": { "session_id": "x" } })).await;
    assert_eq!(
        ack_result(&drain(&mut client.rx), 10),
        json!({ "error": "Missing session_id or user_id" })
    );
}

#[tokio::test]
async fn test_bound_socket_and_status_notice() {
    let live = LiveCoordinator::new();
    let user = BoundUser {
        user_id: "u-1".to_string(),
        user_name: "Bound".to_string(),
    };
    let mut client = connect(&live, Some(user)).await;

    // The bound identity wins over whatever the payload claims.
    send(&live, &client, json!({ "event": "join_session", "ack": 1, "data": { "session_id": "p", "user_id": "spoofed" } })).await;
    assert_eq!(
        ack_result(&drain(&mut client.rx), 1)["participants"],
        json!([{ "user_id": "u-1", "user_name": "Bound" }])
    );

    assert_eq!(live.notify_session_status("p", SessionStatus::Completed).await, 1);
    assert_eq!(
        drain(&mut client.rx),
        vec![json!({ "event": "session_status", "data": { "session_id": "p", "status": "completed" } })]
    );
    assert_eq!(live.notify_session_status("elsewhere", SessionStatus::Active).await, 0);
}

#[tokio::test]
async fn test_sweep_drops_dead_clients() {
    let live = LiveCoordinator::new();
    let mut alive = connect(&live, None).await;
    let dead = connect(&live, None).await;

    send(&live, &alive, json!({ "event": "join_session", "data": { "session_id": "r", "user_id": "alive" } })).await;
    send(&live, &dead, json!({ "event": "join_session", "data": { "session_id": "r", "user_id": "dead" } })).await;
    drain(&mut alive.rx);
    drop(dead.rx);

    assert_eq!(live.sweep().await, 1);
    assert_eq!(live.connection_count().await, 1);
    assert_eq!(
        drain(&mut alive.rx),
        vec![json!({ "event": "user_left", "data": { "user_id": "dead", "session_id": "r" } })]
    );
}
