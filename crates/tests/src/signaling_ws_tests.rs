use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::fixtures::test_app::TestApp;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One WebSocket peer talking to the signaling relay.
struct TestPeer {
    stream: WsStream,
}

impl TestPeer {
    async fn connect(app: &TestApp) -> Self {
        let (stream, _) = connect_async(app.ws_url()).await.expect("ws connect");
        Self { stream }
    }

    async fn join(app: &TestApp, meeting: &str, user: &str, name: &str) -> Self {
        let mut peer = Self::connect(app).await;
        peer.send(json!({
            "type": "join-meeting",
            "data": { "meetingId": meeting, "userId": user, "userName": name }
        }))
        .await;
        peer
    }

    async fn send(&mut self, value: Value) {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("ws send");
    }

    async fn recv(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("timed out waiting for ws message")
                .expect("ws stream ended")
                .expect("ws error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).expect("invalid json from server");
            }
        }
    }

    /// Returns `None` when nothing arrives within the window.
    async fn try_recv(&mut self, window: Duration) -> Option<Value> {
        match tokio::time::timeout(window, self.stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                Some(serde_json::from_str(&text).expect("invalid json from server"))
            }
            _ => None,
        }
    }

    async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[tokio::test]
async fn full_meeting_scenario() {
    let app = TestApp::spawn().await;

    let mut c1 = TestPeer::join(&app, "m1", "u1", "Ana").await;
    let existing = c1.recv().await;
    assert_eq!(existing["type"], "existing-participants");
    assert_eq!(existing["data"], json!([]));

    let ice = c1.recv().await;
    assert_eq!(ice["type"], "ice-servers");
    assert_eq!(
        ice["data"]["iceServers"][0]["urls"][0],
        "stun:stun.test.local:3478"
    );

    let mut c2 = TestPeer::join(&app, "m1", "u2", "Bo").await;
    let existing = c2.recv().await;
    assert_eq!(existing["type"], "existing-participants");
    let peers = existing["data"].as_array().unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0]["userId"], "u1");
    assert_eq!(peers[0]["userName"], "Ana");
    let c1_id = peers[0]["connectionId"].as_str().unwrap().to_string();
    let _ice = c2.recv().await;

    let joined = c1.recv().await;
    assert_eq!(joined["type"], "user-joined");
    assert_eq!(joined["data"]["userId"], "u2");
    assert_eq!(joined["data"]["userName"], "Bo");
    let c2_id = joined["data"]["connectionId"].as_str().unwrap().to_string();

    // c1 -> c2 offer, stamped with c1's connection id
    c1.send(json!({
        "type": "offer",
        "data": { "sdp": "X", "targetConnectionId": c2_id }
    }))
    .await;
    let offer = c2.recv().await;
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["data"]["sdp"], "X");
    assert_eq!(offer["data"]["fromConnectionId"], c1_id.as_str());

    // c2 drops off; c1 is told exactly who left
    c2.close().await;
    let left = c1.recv().await;
    assert_eq!(left["type"], "user-left");
    assert_eq!(left["data"]["connectionId"], c2_id.as_str());
    assert_eq!(left["data"]["userId"], "u2");

    // only c1 remains connected
    let health: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);
}

#[tokio::test]
async fn answer_and_candidate_are_relayed_point_to_point() {
    let app = TestApp::spawn().await;

    let mut c1 = TestPeer::join(&app, "m1", "u1", "Ana").await;
    let _existing = c1.recv().await;
    let _ice = c1.recv().await;

    let mut c2 = TestPeer::join(&app, "m1", "u2", "Bo").await;
    let existing = c2.recv().await;
    let c1_id = existing["data"][0]["connectionId"]
        .as_str()
        .unwrap()
        .to_string();
    let _ice = c2.recv().await;
    let joined = c1.recv().await;
    let c2_id = joined["data"]["connectionId"].as_str().unwrap().to_string();

    c2.send(json!({
        "type": "answer",
        "data": { "sdp": "A", "targetConnectionId": c1_id }
    }))
    .await;
    let answer = c1.recv().await;
    assert_eq!(answer["type"], "answer");
    assert_eq!(answer["data"]["sdp"], "A");
    assert_eq!(answer["data"]["fromConnectionId"], c2_id.as_str());

    let candidate = json!({
        "candidate": "candidate:1 1 UDP 2122252543 192.0.2.1 54400 typ host",
        "sdpMid": "0",
        "sdpMLineIndex": 0
    });
    c2.send(json!({
        "type": "ice-candidate",
        "data": { "candidate": candidate, "targetConnectionId": c1_id }
    }))
    .await;
    let relayed = c1.recv().await;
    assert_eq!(relayed["type"], "ice-candidate");
    assert_eq!(relayed["data"]["candidate"], candidate);
    assert_eq!(relayed["data"]["fromConnectionId"], c2_id.as_str());
}

#[tokio::test]
async fn toggles_and_screen_share_reach_every_other_member() {
    let app = TestApp::spawn().await;

    let mut c1 = TestPeer::join(&app, "m1", "u1", "Ana").await;
    let _ = c1.recv().await;
    let _ = c1.recv().await;

    let mut c2 = TestPeer::join(&app, "m1", "u2", "Bo").await;
    let _ = c2.recv().await;
    let _ = c2.recv().await;
    let joined = c1.recv().await;
    let c1_seen_c2 = joined["data"]["connectionId"].as_str().unwrap().to_string();

    let mut c3 = TestPeer::join(&app, "m1", "u3", "Cy").await;
    let _ = c3.recv().await;
    let _ = c3.recv().await;
    let _ = c1.recv().await; // c3's user-joined
    let _ = c2.recv().await;

    c2.send(json!({ "type": "toggle-audio", "data": { "enabled": false } }))
        .await;
    c2.send(json!({ "type": "start-screen-share" })).await;

    for peer in [&mut c1, &mut c3] {
        let toggle = peer.recv().await;
        assert_eq!(toggle["type"], "user-audio-toggle");
        assert_eq!(toggle["data"]["connectionId"], c1_seen_c2.as_str());
        assert_eq!(toggle["data"]["enabled"], false);

        let share = peer.recv().await;
        assert_eq!(share["type"], "user-started-screen-share");
        assert_eq!(share["data"]["connectionId"], c1_seen_c2.as_str());
    }

    // the sender hears nothing back
    assert!(c2.try_recv(Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn offer_to_unknown_target_is_dropped_silently() {
    let app = TestApp::spawn().await;

    let mut c1 = TestPeer::join(&app, "m1", "u1", "Ana").await;
    let _ = c1.recv().await;
    let _ = c1.recv().await;

    let mut c2 = TestPeer::join(&app, "m1", "u2", "Bo").await;
    let _ = c2.recv().await;
    let _ = c2.recv().await;
    let joined = c1.recv().await;
    let c2_id = joined["data"]["connectionId"].as_str().unwrap().to_string();

    c1.send(json!({
        "type": "offer",
        "data": { "sdp": "ghosted", "targetConnectionId": "no-such-connection" }
    }))
    .await;
    c1.send(json!({
        "type": "offer",
        "data": { "sdp": "real", "targetConnectionId": c2_id }
    }))
    .await;

    // c2 sees only the offer addressed to it; the relay surfaced no error
    let offer = c2.recv().await;
    assert_eq!(offer["data"]["sdp"], "real");
    assert!(c2.try_recv(Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn leave_then_disconnect_emits_one_user_left() {
    let app = TestApp::spawn().await;

    let mut c1 = TestPeer::join(&app, "m1", "u1", "Ana").await;
    let _ = c1.recv().await;
    let _ = c1.recv().await;

    let mut c2 = TestPeer::join(&app, "m1", "u2", "Bo").await;
    let _ = c2.recv().await;
    let _ = c2.recv().await;
    let _ = c1.recv().await; // user-joined

    c2.send(json!({ "type": "leave-meeting" })).await;
    let left = c1.recv().await;
    assert_eq!(left["type"], "user-left");
    assert_eq!(left["data"]["userId"], "u2");

    // the transport-level disconnect that follows must stay silent
    c2.close().await;
    assert!(c1.try_recv(Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let app = TestApp::spawn().await;

    let mut c1 = TestPeer::join(&app, "m1", "u1", "Ana").await;
    let _ = c1.recv().await;
    let _ = c1.recv().await;

    c1.stream
        .send(Message::Text("this is not json".to_string().into()))
        .await
        .unwrap();
    c1.stream
        .send(Message::Text(r#"{"type":"no-such-event"}"#.to_string().into()))
        .await
        .unwrap();

    // the connection survives and keeps working
    let mut c2 = TestPeer::join(&app, "m1", "u2", "Bo").await;
    let _ = c2.recv().await;
    let _ = c2.recv().await;
    let joined = c1.recv().await;
    assert_eq!(joined["type"], "user-joined");
    assert_eq!(joined["data"]["userId"], "u2");
}
