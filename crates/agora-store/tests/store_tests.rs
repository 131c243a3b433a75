use agora_store::{MemoryStore, MessageStore, SqliteStore, StoreError};
use agora_types::models::User;
use uuid::Uuid;

fn user(email: &str, fname: &str, lname: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.into(),
        fname: fname.into(),
        lname: lname.into(),
    }
}

/// Fresh store with three seeded accounts.
fn seeded_store() -> (SqliteStore, User, User, User) {
    let store = SqliteStore::open_in_memory().unwrap();
    let alice = user("alice@example.com", "Alice", "Anders");
    let bob = user("bob@example.com", "Bob", "Berg");
    let carol = user("carol@example.com", "Carol", "Chen");
    for u in [&alice, &bob, &carol] {
        store.create_user(u).unwrap();
    }
    (store, alice, bob, carol)
}

#[tokio::test]
async fn sent_message_is_retrievable_in_conversation() {
    let (store, alice, bob, _) = seeded_store();

    let record = store
        .send_message(alice.id, &bob.email, "hi bob")
        .await
        .unwrap();
    assert_eq!(record.sender_id, alice.id);
    assert_eq!(record.receiver_id, bob.id);
    assert!(record.read_at.is_none());

    // Visible to both sides immediately, whether or not bob was online.
    let from_alice = store
        .list_conversation(alice.id, &bob.email, 50, 0)
        .await
        .unwrap();
    let from_bob = store
        .list_conversation(bob.id, &alice.email, 50, 0)
        .await
        .unwrap();
    assert_eq!(from_alice.len(), 1);
    assert_eq!(from_bob.len(), 1);
    assert_eq!(from_alice[0].message_id, record.message_id);
    assert_eq!(from_bob[0].content, "hi bob");
}

#[tokio::test]
async fn send_to_unknown_recipient_is_not_found() {
    let (store, alice, _, _) = seeded_store();

    let err = store
        .send_message(alice.id, "ghost@example.com", "anyone there?")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn send_to_self_is_rejected() {
    let (store, alice, _, _) = seeded_store();

    let err = store
        .send_message(alice.id, &alice.email, "note to self")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let (store, alice, bob, _) = seeded_store();
    let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

    let first = store.mark_as_read(record.message_id, bob.id).await.unwrap();
    let second = store.mark_as_read(record.message_id, bob.id).await.unwrap();

    assert_eq!(first.read_at, second.read_at);
    assert_eq!(first.sender_id, alice.id);
}

#[tokio::test]
async fn only_receiver_can_mark_read() {
    let (store, alice, bob, carol) = seeded_store();
    let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

    for intruder in [alice.id, carol.id] {
        let err = store
            .mark_as_read(record.message_id, intruder)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
    }

    // The read transition never happened.
    let listed = store
        .list_conversation(bob.id, &alice.email, 50, 0)
        .await
        .unwrap();
    assert!(listed[0].read_at.is_none());
    assert_eq!(store.unread_count(bob.id).await.unwrap(), 1);
}

#[tokio::test]
async fn mark_read_unknown_message_is_not_found() {
    let (store, _, bob, _) = seeded_store();

    let err = store
        .mark_as_read(Uuid::new_v4(), bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn only_sender_can_delete() {
    let (store, alice, bob, _) = seeded_store();
    let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

    let err = store.delete(record.message_id, bob.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Forbidden(_)));

    // Still there for the receiver.
    let listed = store.list_for_user(bob.id, 50, 0).await.unwrap();
    assert_eq!(listed.len(), 1);

    store.delete(record.message_id, alice.id).await.unwrap();
    let listed = store.list_for_user(bob.id, 50, 0).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn unread_count_tracks_read_transitions() {
    let (store, alice, bob, _) = seeded_store();

    let first = store
        .send_message(alice.id, &bob.email, "one")
        .await
        .unwrap();
    store.send_message(alice.id, &bob.email, "two").await.unwrap();
    store.send_message(bob.id, &alice.email, "reply").await.unwrap();

    assert_eq!(store.unread_count(bob.id).await.unwrap(), 2);
    assert_eq!(store.unread_count(alice.id).await.unwrap(), 1);

    store.mark_as_read(first.message_id, bob.id).await.unwrap();
    assert_eq!(store.unread_count(bob.id).await.unwrap(), 1);
    assert_eq!(store.unread_count(alice.id).await.unwrap(), 1);
}

#[tokio::test]
async fn list_for_user_is_newest_first_and_paginated() {
    let (store, alice, bob, _) = seeded_store();
    for content in ["one", "two", "three"] {
        store
            .send_message(alice.id, &bob.email, content)
            .await
            .unwrap();
    }

    let all = store.list_for_user(bob.id, 50, 0).await.unwrap();
    let contents: Vec<&str> = all.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, ["three", "two", "one"]);

    let page = store.list_for_user(bob.id, 2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].content, "three");

    let rest = store.list_for_user(bob.id, 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].content, "one");
}

#[tokio::test]
async fn conversation_is_oldest_first_and_excludes_third_parties() {
    let (store, alice, bob, carol) = seeded_store();
    store.send_message(alice.id, &bob.email, "one").await.unwrap();
    store.send_message(bob.id, &alice.email, "two").await.unwrap();
    store
        .send_message(alice.id, &carol.email, "other thread")
        .await
        .unwrap();

    let convo = store
        .list_conversation(alice.id, &bob.email, 50, 0)
        .await
        .unwrap();
    let contents: Vec<&str> = convo.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, ["one", "two"]);
}

#[tokio::test]
async fn conversation_with_unknown_peer_is_not_found() {
    let (store, alice, _, _) = seeded_store();

    let err = store
        .list_conversation(alice.id, "ghost@example.com", 50, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn records_carry_display_identity() {
    let (store, alice, bob, _) = seeded_store();
    let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

    assert_eq!(record.sender_email, "alice@example.com");
    assert_eq!(record.receiver_email, "bob@example.com");
    assert_eq!(record.sender_name, "Alice Anders");
    assert_eq!(record.receiver_name, "Bob Berg");
}

// The in-memory store backs the gateway tests; pin its semantics to the
// SQLite implementation for the invariants those tests lean on.
mod memory_parity {
    use super::*;

    fn seeded_memory() -> (MemoryStore, User, User) {
        let store = MemoryStore::new();
        let alice = user("alice@example.com", "Alice", "Anders");
        let bob = user("bob@example.com", "Bob", "Berg");
        store.add_user(alice.clone());
        store.add_user(bob.clone());
        (store, alice, bob)
    }

    #[tokio::test]
    async fn mark_read_rules_match_sqlite() {
        let (store, alice, bob) = seeded_memory();
        let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

        let err = store
            .mark_as_read(record.message_id, alice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let first = store.mark_as_read(record.message_id, bob.id).await.unwrap();
        let second = store.mark_as_read(record.message_id, bob.id).await.unwrap();
        assert_eq!(first.read_at, second.read_at);
    }

    #[tokio::test]
    async fn unread_count_matches_sqlite() {
        let (store, alice, bob) = seeded_memory();
        let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

        assert_eq!(store.unread_count(bob.id).await.unwrap(), 1);
        store.mark_as_read(record.message_id, bob.id).await.unwrap();
        assert_eq!(store.unread_count(bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_rules_match_sqlite() {
        let (store, alice, bob) = seeded_memory();
        let record = store.send_message(alice.id, &bob.email, "hi").await.unwrap();

        let err = store.delete(record.message_id, bob.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        store.delete(record.message_id, alice.id).await.unwrap();
        assert!(store.list_for_user(bob.id, 50, 0).await.unwrap().is_empty());
    }
}
