use std::time::Duration;

use awc::{ws, Client};
use chat_service::websocket::SessionSettings;
use futures_util::{SinkExt, StreamExt};

use super::support::{
    answer_ping, assert_no_message, next_json, start_chat_server, start_chat_server_with,
    test_session_settings, token_for, MemoryStore, MAX_MESSAGE_LENGTH,
};

fn text(content: &str) -> ws::Message {
    ws::Message::Text(serde_json::json!({ "content": content }).to_string().into())
}

#[actix_rt::test]
async fn participants_receive_message_and_outsider_does_not() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    store.seed_conversation(99, 3, 4);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .expect("user 1 connects");
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .expect("user 2 connects");
    let (_, mut carol) = client
        .ws(server.ws_url(99))
        .bearer_auth(token_for(3))
        .connect()
        .await
        .expect("user 3 connects");
    server.wait_for_sessions(3).await;

    alice.send(text("hi")).await.unwrap();

    let echoed = next_json(&mut alice).await;
    let received = next_json(&mut bob).await;
    assert_eq!(echoed, received);
    assert_eq!(received["conversation_id"], 42);
    assert_eq!(received["sender_id"], 1);
    assert_eq!(received["content"], "hi");
    assert_eq!(received["read"], false);
    assert!(received["id"].as_i64().is_some());
    assert!(received["created_at"].is_string());

    assert_no_message(&mut carol).await;

    // Stored before it was pushed.
    let stored = store.messages(42);
    assert_eq!(stored.len(), 1);
    assert_eq!(received["id"], stored[0].id);
    assert_eq!(store.last_message(42).as_deref(), Some("hi"));

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn messages_from_one_sender_arrive_in_order() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    for i in 0..10 {
        alice.send(text(&format!("message {i}"))).await.unwrap();
    }

    let mut last_id = 0;
    for i in 0..10 {
        let frame = next_json(&mut bob).await;
        assert_eq!(frame["content"], format!("message {i}"));
        let id = frame["id"].as_i64().unwrap();
        assert!(id > last_id);
        last_id = id;
    }

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn messages_from_two_senders_arrive_in_store_order() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    // User 1's append gets the first id but is confirmed well after user 2's.
    store.delay_appends_from(1, Duration::from_millis(300));
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    alice.send(text("m1")).await.unwrap();
    actix_rt::time::sleep(Duration::from_millis(50)).await;
    bob.send(text("m2")).await.unwrap();

    for conn in [&mut alice, &mut bob] {
        let first = next_json(conn).await;
        let second = next_json(conn).await;
        assert_eq!(first["content"], "m1");
        assert_eq!(second["content"], "m2");
        assert!(first["id"].as_i64().unwrap() < second["id"].as_i64().unwrap());
    }

    let stored: Vec<i64> = store.messages(42).iter().map(|m| m.id).collect();
    assert_eq!(stored, [1, 2]);

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn blank_messages_are_dropped_and_long_ones_rejected() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    alice.send(text("   \n\t")).await.unwrap();
    assert_no_message(&mut alice).await;
    assert_no_message(&mut bob).await;

    alice
        .send(text(&"x".repeat(MAX_MESSAGE_LENGTH + 1)))
        .await
        .unwrap();
    let error = next_json(&mut alice).await;
    assert_eq!(error["error"]["code"], "message_too_long");
    assert_no_message(&mut bob).await;

    assert!(store.messages(42).is_empty());

    // The connection stays usable.
    alice.send(text("still here")).await.unwrap();
    assert_eq!(next_json(&mut bob).await["content"], "still here");

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn persistence_failure_reports_error_and_keeps_connection_open() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    store.fail_appends(true);
    alice.send(text("lost")).await.unwrap();
    let error = next_json(&mut alice).await;
    assert_eq!(error["error"]["code"], "message_not_persisted");
    assert_no_message(&mut bob).await;

    store.fail_appends(false);
    alice.send(text("retry")).await.unwrap();
    assert_eq!(next_json(&mut alice).await["content"], "retry");
    assert_eq!(next_json(&mut bob).await["content"], "retry");
    assert_eq!(store.messages(42).len(), 1);

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn closed_connection_is_unregistered_and_others_keep_receiving() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    bob.send(ws::Message::Close(None)).await.unwrap();
    drop(bob);
    server.wait_for_sessions(1).await;

    alice.send(text("anyone?")).await.unwrap();
    assert_eq!(next_json(&mut alice).await["content"], "anyone?");
    assert_eq!(store.messages(42).len(), 1);

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn peer_with_dropped_socket_still_finds_message_by_polling() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    // No close handshake, the socket just goes away.
    drop(bob);

    alice.send(text("are you there?")).await.unwrap();
    let echoed = next_json(&mut alice).await;
    server.wait_for_user_sessions(2, 0).await;
    server.wait_for_user_sessions(1, 1).await;

    let mut resp = client
        .get(server.api_url("/connections/42/messages"))
        .bearer_auth(token_for(2))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let history: Vec<serde_json::Value> = resp.json().await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], echoed["id"]);
    assert_eq!(history[0]["content"], "are you there?");
    assert_eq!(history[0]["sender_id"], 1);
    assert_eq!(history[0]["read"], true);

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn client_that_stops_reading_is_disconnected() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let settings = SessionSettings {
        heartbeat_interval: Duration::from_millis(50),
        client_timeout: Duration::from_secs(5),
        max_unacked_frames: 3,
        ..test_session_settings()
    };
    let server = start_chat_server_with(store.clone(), settings)
        .await
        .expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    // Alice reads and answers pings; bob reads nothing.
    for i in 0..5 {
        alice.send(text(&format!("m{i}"))).await.unwrap();
        assert_eq!(next_json(&mut alice).await["content"], format!("m{i}"));
        answer_ping(&mut alice).await;
    }

    server.wait_for_user_sessions(2, 0).await;
    server.wait_for_user_sessions(1, 1).await;

    let mut texts = 0;
    loop {
        match bob.next().await {
            Some(Ok(ws::Frame::Text(_))) => texts += 1,
            Some(Ok(ws::Frame::Ping(_))) | Some(Ok(ws::Frame::Pong(_))) => continue,
            Some(Ok(ws::Frame::Close(reason))) => {
                assert_eq!(reason.map(|r| r.code), Some(ws::CloseCode::Policy));
                break;
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
    assert_eq!(texts, 3);

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn malformed_frame_closes_only_that_session() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(2).await;

    bob.send(ws::Message::Text("not json".into())).await.unwrap();
    match bob.next().await {
        Some(Ok(ws::Frame::Close(reason))) => {
            assert_eq!(reason.map(|r| r.code), Some(ws::CloseCode::Invalid));
        }
        other => panic!("expected close frame, got {other:?}"),
    }
    server.wait_for_sessions(1).await;

    alice.send(text("hello")).await.unwrap();
    assert_eq!(next_json(&mut alice).await["content"], "hello");

    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn user_with_two_tabs_receives_on_both() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store.clone()).await.expect("start chat server");
    let client = Client::new();

    let (_, mut alice) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(1))
        .connect()
        .await
        .unwrap();
    let (_, mut bob_desktop) = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(2))
        .connect()
        .await
        .unwrap();
    let (_, mut bob_phone) = client
        .ws(format!("http://{}/ws/chat/42?token={}", server.addr, token_for(2)))
        .connect()
        .await
        .unwrap();
    server.wait_for_sessions(3).await;

    alice.send(text("ping")).await.unwrap();
    assert_eq!(next_json(&mut bob_desktop).await["content"], "ping");
    assert_eq!(next_json(&mut bob_phone).await["content"], "ping");

    server.handle.stop(true).await;
}
