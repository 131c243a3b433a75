use tokio::sync::mpsc;
use uuid::Uuid;

use agora_gateway::registry::ConnectionRegistry;
use agora_types::events::{PresenceStatus, ServerEvent};

#[tokio::test]
async fn user_key_exists_iff_connections_remain() {
    let registry = ConnectionRegistry::new();
    let user = Uuid::new_v4();

    assert!(!registry.is_online(user).await);

    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let (tx_b, _rx_b) = mpsc::unbounded_channel();
    let conn_a = registry.register(user, tx_a).await;
    let conn_b = registry.register(user, tx_b).await;

    assert!(registry.is_online(user).await);
    assert_eq!(registry.connection_count(user).await, 2);

    registry.unregister(user, conn_a).await;
    assert!(registry.is_online(user).await);
    assert_eq!(registry.connection_count(user).await, 1);

    registry.unregister(user, conn_b).await;
    assert!(!registry.is_online(user).await);
    assert!(registry.online_users().await.is_empty());
    assert_eq!(registry.connection_count(user).await, 0);
}

#[tokio::test]
async fn unregister_is_safe_to_repeat() {
    let registry = ConnectionRegistry::new();
    let user = Uuid::new_v4();

    let (tx, _rx) = mpsc::unbounded_channel();
    let conn = registry.register(user, tx).await;

    registry.unregister(user, conn).await;
    registry.unregister(user, conn).await;
    assert!(!registry.is_online(user).await);
}

#[tokio::test]
async fn send_to_offline_user_has_no_effect() {
    let registry = ConnectionRegistry::new();

    // Offline recipient is not an error; nothing to deliver to.
    registry
        .send_to_user(
            Uuid::new_v4(),
            ServerEvent::UnreadCountUpdate { unread_count: 1 },
        )
        .await;
    assert!(registry.online_users().await.is_empty());
}

#[tokio::test]
async fn fanout_survives_one_dead_connection() {
    let registry = ConnectionRegistry::new();
    let user = Uuid::new_v4();

    let (tx_dead, rx_dead) = mpsc::unbounded_channel();
    let (tx_live, mut rx_live) = mpsc::unbounded_channel();
    registry.register(user, tx_dead).await;
    registry.register(user, tx_live).await;

    // Simulate a closing connection: its writer half is gone.
    drop(rx_dead);

    registry
        .send_to_user(user, ServerEvent::UnreadCountUpdate { unread_count: 7 })
        .await;

    // The healthy device still got the event and only the dead one was pruned.
    match rx_live.try_recv().unwrap() {
        ServerEvent::UnreadCountUpdate { unread_count } => assert_eq!(unread_count, 7),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(registry.connection_count(user).await, 1);
    assert!(registry.is_online(user).await);
}

#[tokio::test]
async fn all_connections_dead_removes_user() {
    let registry = ConnectionRegistry::new();
    let user = Uuid::new_v4();

    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    registry.register(user, tx_a).await;
    registry.register(user, tx_b).await;
    drop(rx_a);
    drop(rx_b);

    registry
        .send_to_user(user, ServerEvent::UnreadCountUpdate { unread_count: 1 })
        .await;

    assert!(!registry.is_online(user).await);
}

#[tokio::test]
async fn broadcast_skips_the_excluded_user() {
    let registry = ConnectionRegistry::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let (tx_alice, mut rx_alice) = mpsc::unbounded_channel();
    let (tx_bob, mut rx_bob) = mpsc::unbounded_channel();
    registry.register(alice, tx_alice).await;
    registry.register(bob, tx_bob).await;

    registry
        .broadcast_status(alice, PresenceStatus::Online, Some(alice))
        .await;

    match rx_bob.try_recv().unwrap() {
        ServerEvent::UserStatus { user_id, status } => {
            assert_eq!(user_id, alice);
            assert_eq!(status, PresenceStatus::Online);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx_alice.try_recv().is_err());
}
