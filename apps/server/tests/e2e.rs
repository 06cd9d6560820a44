//! End-to-end tests: REST surface driven through the router, live channel
//! driven over real WebSocket connections.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use courier_config::{DatabaseConfig, RealtimeConfig};
use courier_database::{NewMessage, ParticipantRepository, ParticipantRole};
use courier_gateway::{build_router, GatewayState};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;

async fn test_state() -> (GatewayState, TempDir) {
    let dir = TempDir::new().unwrap();
    let database = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("e2e.db").display()),
        max_connections: 5,
    };

    let state = GatewayState::from_config(&database, &RealtimeConfig::default())
        .await
        .unwrap();

    let participants = ParticipantRepository::new(state.pool.clone());
    participants
        .upsert("alice", "Alice", ParticipantRole::Customer)
        .await
        .unwrap();
    participants
        .upsert("bob", "Bob", ParticipantRole::Provider)
        .await
        .unwrap();

    (state, dir)
}

async fn start_server(state: GatewayState) -> SocketAddr {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, actor: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-actor-id", actor)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, actor: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-actor-id", actor)
        .body(Body::empty())
        .unwrap()
}

async fn next_event(
    stream: &mut (impl StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> Value {
    loop {
        match stream.next().await.expect("stream closed").unwrap() {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn rest_send_read_flow() {
    let (state, _dir) = test_state().await;
    let app = build_router(state);

    // Alice opens the conversation by addressing Bob directly.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/messages",
            "alice",
            json!({"to": "bob", "body": "Hi, is Saturday free?", "booking_ref": "bk-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let message = body_json(response).await;
    assert_eq!(message["seq"], 1);
    assert_eq!(message["status"], "sent");
    let thread_id = message["thread_id"].as_str().unwrap().to_string();

    // Bob's conversation list shows one unread thread from Alice.
    let response = app
        .clone()
        .oneshot(get("/api/conversations", "bob"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let conversations = body_json(response).await;
    assert_eq!(conversations[0]["other_participant"], "alice");
    assert_eq!(conversations[0]["unread_count"], 1);
    assert_eq!(conversations[0]["booking_ref"], "bk-1");

    // Bob reads the thread; the message jumps straight to read.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{thread_id}/read"),
            "bob",
            json!({"upto_seq": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["read_seqs"], json!([1]));
    assert_eq!(outcome["unread_count"], 0);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/threads/{thread_id}/messages"), "alice"))
        .await
        .unwrap();
    let messages = body_json(response).await;
    assert_eq!(messages[0]["status"], "read");

    // Outsiders get turned away.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/threads/{thread_id}/messages"), "mallory"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // And unauthenticated requests never reach the services.
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/conversations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn live_messages_arrive_in_send_order() {
    let (state, _dir) = test_state().await;
    let thread = state
        .thread_service
        .resolve_thread("alice", "bob", None)
        .await
        .unwrap();
    let addr = start_server(state.clone()).await;

    let (mut bob, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?actor=bob"))
            .await
            .unwrap();

    bob.send(WsMessage::Text(
        json!({"type": "room.join", "thread_id": thread.public_id}).to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(next_event(&mut bob).await["type"], "room.joined");

    for i in 1..=3 {
        state
            .message_service
            .append(
                &thread.public_id,
                "alice",
                &NewMessage::text(format!("msg {i}")),
            )
            .await
            .unwrap();
    }

    // Bob sees message.new for 1, 2, 3 in exactly that order; the
    // interleaved delivered receipts are status events, not messages.
    let mut seen = Vec::new();
    while seen.len() < 3 {
        let event = next_event(&mut bob).await;
        if event["type"] == "message.new" {
            seen.push(event["message"]["seq"].as_i64().unwrap());
        } else {
            assert_eq!(event["type"], "message.status");
        }
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn sender_hears_the_read_receipt() {
    let (state, _dir) = test_state().await;
    let thread = state
        .thread_service
        .resolve_thread("alice", "bob", None)
        .await
        .unwrap();
    let addr = start_server(state.clone()).await;

    let (mut alice, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?actor=alice"))
            .await
            .unwrap();
    alice
        .send(WsMessage::Text(
            json!({"type": "room.join", "thread_id": thread.public_id}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(next_event(&mut alice).await["type"], "room.joined");

    // Bob is offline; the message stays sent.
    let message = state
        .message_service
        .append(&thread.public_id, "alice", &NewMessage::text("Hi"))
        .await
        .unwrap();
    assert_eq!(message.status.as_str(), "sent");
    assert_eq!(next_event(&mut alice).await["type"], "message.new");

    // Bob comes back and reads; Alice receives a single status event that
    // skips delivered entirely.
    state
        .message_service
        .mark_thread_read(&thread.public_id, "bob", message.seq)
        .await
        .unwrap();

    let event = next_event(&mut alice).await;
    assert_eq!(event["type"], "message.status");
    assert_eq!(event["status"], "read");
    assert_eq!(event["actor"], "bob");
    assert_eq!(event["message_id"], message.public_id.as_str());
}

#[tokio::test]
async fn reconnect_sync_backfills_then_streams() {
    let (state, _dir) = test_state().await;
    let thread = state
        .thread_service
        .resolve_thread("alice", "bob", None)
        .await
        .unwrap();
    let addr = start_server(state.clone()).await;

    // History accumulated while Bob was away.
    for i in 1..=4 {
        state
            .message_service
            .append(
                &thread.public_id,
                "alice",
                &NewMessage::text(format!("missed {i}")),
            )
            .await
            .unwrap();
    }

    let (mut bob, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?actor=bob"))
            .await
            .unwrap();

    bob.send(WsMessage::Text(
        json!({
            "type": "sync",
            "threads": [{"thread_id": thread.public_id, "last_seq": 2}]
        })
        .to_string(),
    ))
    .await
    .unwrap();

    let event = next_event(&mut bob).await;
    assert_eq!(event["type"], "sync.batch");
    let seqs: Vec<i64> = event["batch"]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![3, 4]);
    assert_eq!(event["batch"]["unread_count"], 4);
    assert_eq!(next_event(&mut bob).await["type"], "room.joined");

    // Live delivery continues seamlessly after the batch.
    state
        .message_service
        .append(&thread.public_id, "alice", &NewMessage::text("live"))
        .await
        .unwrap();

    let event = next_event(&mut bob).await;
    assert_eq!(event["type"], "message.new");
    assert_eq!(event["message"]["seq"], 5);
}

#[tokio::test]
async fn typing_signal_reaches_only_the_peer() {
    let (state, _dir) = test_state().await;
    let thread = state
        .thread_service
        .resolve_thread("alice", "bob", None)
        .await
        .unwrap();
    let addr = start_server(state.clone()).await;

    let (mut alice, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?actor=alice"))
            .await
            .unwrap();
    let (mut bob, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?actor=bob"))
            .await
            .unwrap();

    for (ws, _name) in [(&mut alice, "alice"), (&mut bob, "bob")] {
        ws.send(WsMessage::Text(
            json!({"type": "room.join", "thread_id": thread.public_id}).to_string(),
        ))
        .await
        .unwrap();
    }
    assert_eq!(next_event(&mut alice).await["type"], "room.joined");
    assert_eq!(next_event(&mut bob).await["type"], "room.joined");

    alice
        .send(WsMessage::Text(
            json!({
                "type": "typing.signal",
                "thread_id": thread.public_id,
                "is_active": true
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let event = next_event(&mut bob).await;
    assert_eq!(event["type"], "typing.signal");
    assert_eq!(event["actor"], "alice");
    assert_eq!(event["is_active"], true);

    // The originator hears nothing back; a ping round-trip proves the
    // channel stayed quiet rather than slow.
    alice
        .send(WsMessage::Text(json!({"type": "ping"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_event(&mut alice).await["type"], "pong");
}

#[tokio::test]
async fn joining_a_foreign_room_is_refused() {
    let (state, _dir) = test_state().await;
    let participants = ParticipantRepository::new(state.pool.clone());
    participants
        .upsert("carol", "Carol", ParticipantRole::Customer)
        .await
        .unwrap();

    let thread = state
        .thread_service
        .resolve_thread("alice", "bob", None)
        .await
        .unwrap();
    let addr = start_server(state.clone()).await;

    let (mut carol, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?actor=carol"))
            .await
            .unwrap();

    carol
        .send(WsMessage::Text(
            json!({"type": "room.join", "thread_id": thread.public_id}).to_string(),
        ))
        .await
        .unwrap();

    let event = next_event(&mut carol).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["code"], "ACCESS_DENIED");
    assert_eq!(state.router.room_size(thread.id), 0);
}
