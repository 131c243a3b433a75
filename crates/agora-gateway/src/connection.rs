use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use agora_store::{MessageStore, StoreError};
use agora_types::api::Claims;
use agora_types::events::{ClientEvent, PresenceStatus, ServerEvent};
use agora_types::models::MessageRecord;

use crate::auth::CLOSE_UNAUTHORIZED;
use crate::registry::{ConnectionRegistry, EventSender};

/// Drive one WebSocket connection through its lifetime.
///
/// `claims` is the outcome of handshake authentication: `None` closes the
/// socket with the unauthorized close code before the registry ever sees
/// the connection.
pub async fn handle_connection(
    socket: WebSocket,
    registry: ConnectionRegistry,
    store: Arc<dyn MessageStore>,
    claims: Option<Claims>,
) {
    let Some(claims) = claims else {
        reject_unauthorized(socket).await;
        return;
    };
    let user_id = claims.sub;

    let (mut sink, mut stream) = socket.split();

    // The connection, as far as the registry is concerned, is the sending
    // half of this queue.
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let conn_id = registry.register(user_id, tx.clone()).await;

    info!("{} ({}) connected to messaging gateway", claims.email, user_id);

    // Tell everyone else this user is online, then give this connection its
    // unread snapshot.
    registry
        .broadcast_status(user_id, PresenceStatus::Online, Some(user_id))
        .await;

    match store.unread_count(user_id).await {
        Ok(unread_count) => {
            let _ = tx.send(ServerEvent::UnreadCountUpdate { unread_count });
        }
        Err(e) => error!("Initial unread count for {} failed: {}", user_id, e),
    }

    // Writer: drain the outbound queue into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = serde_json::to_string(&event).unwrap();
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader: events on one connection are handled strictly in arrival
    // order — the next frame is not read until this one is dispatched.
    let registry_recv = registry.clone();
    let store_recv = store.clone();
    let email_recv = claims.email.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        dispatch_event(&registry_recv, store_recv.as_ref(), user_id, &tx, event)
                            .await;
                    }
                    Err(e) => {
                        let preview: String = text.chars().take(200).collect();
                        warn!(
                            "{} ({}) bad event: {} -- raw: {}",
                            email_recv, user_id, e, preview
                        );
                        let _ = tx.send(ServerEvent::Error {
                            message: format!("malformed event: {e}"),
                        });
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Either side finishing tears the connection down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(user_id, conn_id).await;
    if !registry.is_online(user_id).await {
        registry
            .broadcast_status(user_id, PresenceStatus::Offline, None)
            .await;
    }

    info!(
        "{} ({}) disconnected from messaging gateway",
        claims.email, user_id
    );
}

/// Close the socket with the unauthorized code, before registration.
pub async fn reject_unauthorized(mut socket: WebSocket) {
    warn!("Unauthorized WebSocket handshake rejected");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_UNAUTHORIZED,
            reason: "unauthorized".into(),
        })))
        .await;
}

/// Handle one inbound event. Every failure is scoped to that event: it is
/// reported as an `error` event on the originating connection and the loop
/// keeps running.
pub async fn dispatch_event(
    registry: &ConnectionRegistry,
    store: &dyn MessageStore,
    user_id: Uuid,
    reply: &EventSender,
    event: ClientEvent,
) {
    if let Err(err) = handle_event(registry, store, user_id, reply, event).await {
        if err.is_domain() {
            warn!("Rejected event from {}: {}", user_id, err);
        } else {
            error!("Event from {} failed: {}", user_id, err);
        }
        let _ = reply.send(ServerEvent::Error {
            message: err.to_string(),
        });
    }
}

async fn handle_event(
    registry: &ConnectionRegistry,
    store: &dyn MessageStore,
    user_id: Uuid,
    reply: &EventSender,
    event: ClientEvent,
) -> Result<(), StoreError> {
    match event {
        ClientEvent::SendMessage {
            receiver_email,
            content,
        } => {
            if receiver_email.is_empty() || content.is_empty() {
                return Err(StoreError::Invalid(
                    "missing receiver_email or content".into(),
                ));
            }
            // Persisted first; pushes after this are best-effort.
            let record = store.send_message(user_id, &receiver_email, &content).await?;
            notify_message_sent(registry, store, &record).await
        }

        ClientEvent::MarkRead { message_id } => {
            let receipt = store.mark_as_read(message_id, user_id).await?;
            registry
                .send_to_user(
                    receipt.sender_id,
                    ServerEvent::ReadReceipt {
                        message_id: receipt.message_id,
                        read_at: receipt.read_at,
                        reader_id: user_id,
                    },
                )
                .await;

            let unread_count = store.unread_count(user_id).await?;
            registry
                .send_to_user(user_id, ServerEvent::UnreadCountUpdate { unread_count })
                .await;
            Ok(())
        }

        ClientEvent::TypingStart { receiver_id } => {
            send_typing(registry, store, user_id, receiver_id, true).await
        }

        ClientEvent::TypingStop { receiver_id } => {
            send_typing(registry, store, user_id, receiver_id, false).await
        }

        ClientEvent::GetUnreadCount {} => {
            let unread_count = store.unread_count(user_id).await?;
            // Snapshot goes to the requesting connection only.
            let _ = reply.send(ServerEvent::UnreadCountUpdate { unread_count });
            Ok(())
        }
    }
}

/// Push the events a freshly persisted message triggers: the record to the
/// receiver (if online), their new unread counter, and a confirmation to
/// the sender's connections. Shared by the WebSocket path and REST sends.
pub async fn notify_message_sent(
    registry: &ConnectionRegistry,
    store: &dyn MessageStore,
    record: &MessageRecord,
) -> Result<(), StoreError> {
    registry
        .send_to_user(
            record.receiver_id,
            ServerEvent::MessageReceived(record.clone()),
        )
        .await;

    let unread_count = store.unread_count(record.receiver_id).await?;
    registry
        .send_to_user(
            record.receiver_id,
            ServerEvent::UnreadCountUpdate { unread_count },
        )
        .await;

    registry
        .send_to_user(record.sender_id, ServerEvent::MessageSent(record.clone()))
        .await;
    Ok(())
}

/// Typing indicators are fire-and-forget: no persistence, and a frame with
/// no receiver is dropped silently.
async fn send_typing(
    registry: &ConnectionRegistry,
    store: &dyn MessageStore,
    user_id: Uuid,
    receiver_id: Option<Uuid>,
    typing: bool,
) -> Result<(), StoreError> {
    let Some(receiver_id) = receiver_id else {
        return Ok(());
    };

    let user_email = store.user_by_id(user_id).await?.map(|u| u.email);
    registry
        .send_to_user(
            receiver_id,
            ServerEvent::TypingIndicator {
                user_id,
                user_email,
                typing,
            },
        )
        .await;
    Ok(())
}
