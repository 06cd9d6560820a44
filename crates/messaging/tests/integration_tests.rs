//! Integration tests for the messaging services.

use std::sync::{Arc, Mutex};

use courier_database::{
    prepare_database, run_migrations, Message, MessageStatus, NewMessage, ParticipantRole,
    ParticipantRepository, Thread,
};
use courier_messaging::{
    DeliveryReceipt, EventSink, MessageService, MessagingError, NullEventSink, SyncCursor,
    SyncService, ThreadService,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn create_test_pool() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let config = courier_config::DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 5,
    };

    let pool = prepare_database(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (pool, temp_dir)
}

async fn seed_participants(pool: &SqlitePool) {
    let participants = ParticipantRepository::new(pool.clone());
    participants
        .upsert("alice", "Alice", ParticipantRole::Customer)
        .await
        .unwrap();
    participants
        .upsert("bob", "Bob", ParticipantRole::Provider)
        .await
        .unwrap();
}

/// Test sink that records every fan-out call and reports a configurable
/// number of live recipient connections.
#[derive(Default)]
struct RecordingSink {
    recipient_live: bool,
    created: Mutex<Vec<Message>>,
    receipts: Mutex<Vec<DeliveryReceipt>>,
}

impl RecordingSink {
    fn live() -> Self {
        Self {
            recipient_live: true,
            ..Default::default()
        }
    }

    fn receipts(&self) -> Vec<DeliveryReceipt> {
        self.receipts.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn message_created(&self, _thread: &Thread, message: &Message) -> bool {
        self.created.lock().unwrap().push(message.clone());
        self.recipient_live
    }

    fn status_changed(&self, _thread: &Thread, receipt: &DeliveryReceipt) {
        self.receipts.lock().unwrap().push(receipt.clone());
    }
}

#[tokio::test]
async fn concurrent_appends_assign_each_seq_exactly_once() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let service = Arc::new(MessageService::new(pool, Arc::new(NullEventSink), 3));

    const N: usize = 16;
    let mut handles = Vec::new();
    for i in 0..N {
        let service = service.clone();
        let thread_id = thread.public_id.clone();
        handles.push(tokio::spawn(async move {
            service
                .append(&thread_id, "alice", &NewMessage::text(format!("m{i}")))
                .await
                .unwrap()
                .seq
        }));
    }

    let mut seqs = Vec::new();
    for handle in handles {
        seqs.push(handle.await.unwrap());
    }
    seqs.sort_unstable();

    assert_eq!(seqs, (1..=N as i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn resolving_the_same_pair_concurrently_returns_one_thread() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let service = Arc::new(ThreadService::new(pool));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .resolve_thread("bob", "alice", None)
                .await
                .unwrap()
                .public_id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn resolve_thread_rejects_unknown_and_self_pairs() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let service = ThreadService::new(pool);

    assert!(matches!(
        service.resolve_thread("alice", "mallory", None).await,
        Err(MessagingError::InvalidParticipant(id)) if id == "mallory"
    ));
    assert!(matches!(
        service.resolve_thread("alice", "alice", None).await,
        Err(MessagingError::InvalidParticipant(_))
    ));
}

#[tokio::test]
async fn status_transitions_are_monotonic() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let sink = Arc::new(RecordingSink::default());
    let service = MessageService::new(pool, sink.clone(), 3);

    let message = service
        .append(&thread.public_id, "alice", &NewMessage::text("hi"))
        .await
        .unwrap();
    assert_eq!(message.status, MessageStatus::Sent);

    service
        .mark_thread_read(&thread.public_id, "bob", message.seq)
        .await
        .unwrap();

    // A delivered ack arriving after read is a no-op, not an error.
    let late = service
        .ack_delivered(&message.public_id, "bob")
        .await
        .unwrap();
    assert!(late.is_none());

    let receipts = sink.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].status, MessageStatus::Read);
}

#[tokio::test]
async fn offline_recipient_skips_delivered_entirely() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    // No live recipient connection: the sink reports no push.
    let sink = Arc::new(RecordingSink::default());
    let service = MessageService::new(pool, sink.clone(), 3);

    let message = service
        .append(&thread.public_id, "alice", &NewMessage::text("Hi"))
        .await
        .unwrap();
    assert_eq!(message.status, MessageStatus::Sent);
    assert!(sink.receipts().is_empty());

    // B later opens the thread and acks everything as read.
    let outcome = service
        .mark_thread_read(&thread.public_id, "bob", message.seq)
        .await
        .unwrap();
    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.unread_count, 0);

    // Exactly one status event, `read`, with no delivered intermediate.
    let receipts = sink.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].status, MessageStatus::Read);
    assert_eq!(receipts[0].actor, "bob");
    assert_eq!(receipts[0].message_id, message.public_id);
}

#[tokio::test]
async fn live_recipient_advances_to_delivered_on_push() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let sink = Arc::new(RecordingSink::live());
    let service = MessageService::new(pool, sink.clone(), 3);

    let message = service
        .append(&thread.public_id, "alice", &NewMessage::text("hi"))
        .await
        .unwrap();

    assert_eq!(message.status, MessageStatus::Delivered);
    let receipts = sink.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].status, MessageStatus::Delivered);
    assert_eq!(receipts[0].actor, "bob");
}

#[tokio::test]
async fn backfill_is_gap_free() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let service = MessageService::new(pool.clone(), Arc::new(NullEventSink), 3);
    for i in 1..=6 {
        service
            .append(&thread.public_id, "alice", &NewMessage::text(format!("m{i}")))
            .await
            .unwrap();
    }

    let sync = SyncService::new(pool, 100);
    let cursor = SyncCursor {
        thread_id: thread.public_id.clone(),
        last_seq: 2,
    };
    let (_, batch) = sync.sync_thread("bob", &cursor).await.unwrap();

    assert_eq!(
        batch.messages.iter().map(|m| m.seq).collect::<Vec<_>>(),
        vec![3, 4, 5, 6]
    );
    assert_eq!(batch.unread_count, 6);
    assert_eq!(batch.latest_seq, 6);
}

#[tokio::test]
async fn backfill_batches_are_restartable() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let service = MessageService::new(pool.clone(), Arc::new(NullEventSink), 3);
    for i in 1..=5 {
        service
            .append(&thread.public_id, "alice", &NewMessage::text(format!("m{i}")))
            .await
            .unwrap();
    }

    let sync = SyncService::new(pool, 2);
    let mut cursor = SyncCursor {
        thread_id: thread.public_id.clone(),
        last_seq: 0,
    };

    let mut collected = Vec::new();
    loop {
        let (_, batch) = sync.sync_thread("bob", &cursor).await.unwrap();
        if batch.messages.is_empty() {
            break;
        }
        collected.extend(batch.messages.iter().map(|m| m.seq));
        cursor.last_seq = batch.latest_seq;
    }

    assert_eq!(collected, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn sync_rejects_non_members() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;
    ParticipantRepository::new(pool.clone())
        .upsert("carol", "Carol", ParticipantRole::Customer)
        .await
        .unwrap();

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let sync = SyncService::new(pool, 100);
    let cursor = SyncCursor {
        thread_id: thread.public_id,
        last_seq: 0,
    };
    assert!(matches!(
        sync.sync_thread("carol", &cursor).await,
        Err(MessagingError::Unauthorized)
    ));
}

#[tokio::test]
async fn archived_threads_refuse_new_messages() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();
    threads.archive_thread(&thread.public_id).await.unwrap();

    let service = MessageService::new(pool, Arc::new(NullEventSink), 3);
    assert!(matches!(
        service
            .append(&thread.public_id, "alice", &NewMessage::text("hi"))
            .await,
        Err(MessagingError::ThreadArchived)
    ));
}

#[tokio::test]
async fn conversation_list_orders_by_recent_activity() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;
    ParticipantRepository::new(pool.clone())
        .upsert("carol", "Carol", ParticipantRole::Provider)
        .await
        .unwrap();

    let threads = ThreadService::new(pool.clone());
    let with_bob = threads.resolve_thread("alice", "bob", None).await.unwrap();
    let with_carol = threads
        .resolve_thread("alice", "carol", Some("booking-42"))
        .await
        .unwrap();

    let service = MessageService::new(pool, Arc::new(NullEventSink), 3);
    service
        .append(&with_bob.public_id, "bob", &NewMessage::text("first"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    service
        .append(&with_carol.public_id, "carol", &NewMessage::text("second"))
        .await
        .unwrap();

    let summaries = service.list_threads("alice").await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].thread_id, with_carol.public_id);
    assert_eq!(summaries[0].other_participant, "carol");
    assert_eq!(summaries[0].booking_ref.as_deref(), Some("booking-42"));
    assert_eq!(summaries[0].unread_count, 1);
    assert_eq!(summaries[1].thread_id, with_bob.public_id);
    assert_eq!(
        summaries[1].last_message.as_ref().unwrap().body,
        "first"
    );
}

#[tokio::test]
async fn non_member_cannot_list_messages() {
    let (pool, _dir) = create_test_pool().await;
    seed_participants(&pool).await;
    ParticipantRepository::new(pool.clone())
        .upsert("carol", "Carol", ParticipantRole::Customer)
        .await
        .unwrap();

    let threads = ThreadService::new(pool.clone());
    let thread = threads.resolve_thread("alice", "bob", None).await.unwrap();

    let service = MessageService::new(pool, Arc::new(NullEventSink), 3);
    assert!(matches!(
        service.list_since(&thread.public_id, "carol", 0, None).await,
        Err(MessagingError::Unauthorized)
    ));
}
