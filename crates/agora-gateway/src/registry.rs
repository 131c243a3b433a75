use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use agora_types::events::{PresenceStatus, ServerEvent};

/// Identifies one live connection within a user's device set.
pub type ConnectionId = Uuid;

/// Outbound half of a connection: events queued here are drained into the
/// socket by that connection's writer task, preserving per-connection order.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Tracks live connections per user and provides best-effort delivery.
///
/// A user id is a key iff its connection set is non-empty; presence is
/// derived from exactly that. Constructed once in main and cloned into
/// every handler — cloning shares the same registry.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    connections: RwLock<HashMap<Uuid, HashMap<ConnectionId, EventSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Add a connection to the user's set, creating the set if absent.
    /// Returns the id used to unregister this connection later.
    pub async fn register(&self, user_id: Uuid, sender: EventSender) -> ConnectionId {
        let conn_id = Uuid::new_v4();
        let mut map = self.inner.connections.write().await;
        let conns = map.entry(user_id).or_default();
        conns.insert(conn_id, sender);
        info!(
            "User {} connected. Total connections: {}",
            user_id,
            conns.len()
        );
        conn_id
    }

    /// Remove a connection; drops the user key when the set empties.
    /// Safe to call for a connection that was already pruned.
    pub async fn unregister(&self, user_id: Uuid, conn_id: ConnectionId) {
        let mut map = self.inner.connections.write().await;
        if let Some(conns) = map.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                map.remove(&user_id);
                info!("User {} fully disconnected", user_id);
            } else {
                info!(
                    "User {} connection closed. Remaining: {}",
                    user_id,
                    conns.len()
                );
            }
        }
    }

    /// Deliver an event to every connection of a user. An offline recipient
    /// is not an error: the event is simply dropped (the durable record, if
    /// any, is already persisted). Connections whose queue is gone are
    /// pruned and delivery continues to the rest.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) {
        // Snapshot the senders so fan-out never holds the lock across sends.
        let targets: Vec<(ConnectionId, EventSender)> = {
            let map = self.inner.connections.read().await;
            match map.get(&user_id) {
                Some(conns) => conns.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => {
                    debug!("User {} not connected, event not sent", user_id);
                    return;
                }
            }
        };

        let mut dead = Vec::new();
        for (conn_id, tx) in targets {
            if tx.send(event.clone()).is_err() {
                warn!("Failed to deliver event to {}, pruning connection", user_id);
                dead.push(conn_id);
            }
        }

        for conn_id in dead {
            self.unregister(user_id, conn_id).await;
        }
    }

    /// Presence fan-out: tell every online user (except `exclude`) that a
    /// user's status changed. Linear in the number of online users, which
    /// is fine — presence changes are rare next to message traffic.
    pub async fn broadcast_status(
        &self,
        user_id: Uuid,
        status: PresenceStatus,
        exclude: Option<Uuid>,
    ) {
        let event = ServerEvent::UserStatus { user_id, status };
        for uid in self.online_users().await {
            if Some(uid) == exclude {
                continue;
            }
            self.send_to_user(uid, event.clone()).await;
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.connections.read().await.contains_key(&user_id)
    }

    pub async fn online_users(&self) -> Vec<Uuid> {
        self.inner.connections.read().await.keys().copied().collect()
    }

    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .connections
            .read()
            .await
            .get(&user_id)
            .map_or(0, HashMap::len)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
