//! Runs against a real PostgreSQL when `TEST_DATABASE_URL` is set; otherwise each
//! test returns early.

use chat_service::migrations;
use chat_service::services::{ConversationStore, PgConversationStore, StoreError};
use db_pool::{create_pool, DbConfig};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

static RUN_BASE: OnceLock<i64> = OnceLock::new();
static NEXT_USER: AtomicI64 = AtomicI64::new(0);

/// User ids unique to this run so tests never collide with earlier data
fn fresh_user() -> i64 {
    let base = *RUN_BASE.get_or_init(|| chrono::Utc::now().timestamp_micros() * 1000);
    base + NEXT_USER.fetch_add(1, Ordering::SeqCst)
}

async fn store() -> Option<PgConversationStore> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL store test");
            return None;
        }
    };
    let pool = create_pool(DbConfig {
        service_name: "chat-service-test".into(),
        database_url: url,
        max_connections: 4,
        ..DbConfig::default()
    })
    .await
    .expect("connect to test database");
    migrations::run_all(&pool).await.expect("apply migrations");
    Some(PgConversationStore::new(pool))
}

#[actix_rt::test]
async fn pg_create_conversation_is_symmetric_and_rejects_self() {
    let Some(store) = store().await else { return };
    let (a, b) = (fresh_user(), fresh_user());

    let id = store.create_conversation(a, b).await.unwrap();
    assert_eq!(store.create_conversation(b, a).await.unwrap(), id);
    assert_eq!(store.create_conversation(a, b).await.unwrap(), id);

    let participants = store.resolve_participants(id).await.unwrap();
    assert!(participants.contains(a) && participants.contains(b));

    assert!(matches!(
        store.create_conversation(a, a).await,
        Err(StoreError::InvalidPair(_))
    ));
}

#[actix_rt::test]
async fn pg_append_updates_cache_and_keeps_order() {
    let Some(store) = store().await else { return };
    let (a, b) = (fresh_user(), fresh_user());
    let id = store.create_conversation(a, b).await.unwrap();

    let first = store.append_message(id, a, "first").await.unwrap();
    let second = store.append_message(id, b, "second").await.unwrap();
    assert!(second.created_at >= first.created_at);
    assert!(second.id > first.id);
    assert!(!first.read);

    let summaries = store.list_conversations(a).await.unwrap();
    let summary = summaries.iter().find(|s| s.id == id).unwrap();
    assert_eq!(summary.other_user_id, b);
    assert_eq!(summary.last_message.as_deref(), Some("second"));
    assert_eq!(summary.last_message_at, Some(second.created_at));
    assert_eq!(summary.unread_count, 1);
}

#[actix_rt::test]
async fn pg_append_rejects_outsiders_and_blank_content() {
    let Some(store) = store().await else { return };
    let (a, b, outsider) = (fresh_user(), fresh_user(), fresh_user());
    let id = store.create_conversation(a, b).await.unwrap();

    assert!(matches!(
        store.append_message(id, outsider, "let me in").await,
        Err(StoreError::NotParticipant { .. })
    ));
    assert!(matches!(
        store.append_message(id, a, "  ").await,
        Err(StoreError::EmptyContent)
    ));
    assert!(matches!(
        store.resolve_participants(i64::MAX).await,
        Err(StoreError::NotFound(_))
    ));
}

#[actix_rt::test]
async fn pg_fetch_messages_marks_peer_messages_read() {
    let Some(store) = store().await else { return };
    let (a, b) = (fresh_user(), fresh_user());
    let id = store.create_conversation(a, b).await.unwrap();
    store.append_message(id, a, "hi").await.unwrap();
    store.append_message(id, b, "hey").await.unwrap();

    let history = store.fetch_messages(id, b).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["hi", "hey"]);
    assert!(history[0].read);
    assert!(!history[1].read);

    let summaries = store.list_conversations(b).await.unwrap();
    let summary = summaries.iter().find(|s| s.id == id).unwrap();
    assert_eq!(summary.unread_count, 0);
}
