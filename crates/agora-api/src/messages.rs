use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use agora_gateway::connection;
use agora_types::api::{Claims, MarkReadResponse, SendMessageRequest, UnreadCountResponse};

use crate::error::status_for;
use crate::state::AppState;

const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// Persist a message and push the live events. The REST path and the
/// WebSocket `send_message` event share the same store call and fan-out.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let record = state
        .store
        .send_message(claims.sub, &req.receiver_email, &req.content)
        .await
        .map_err(status_for)?;

    // The message is durable at this point; a failed push only costs the
    // live notification.
    if let Err(err) =
        connection::notify_message_sent(&state.registry, state.store.as_ref(), &record).await
    {
        warn!("Live push after REST send failed: {}", err);
    }

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn user_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let records = state
        .store
        .list_for_user(claims.sub, query.limit.min(MAX_PAGE), query.offset)
        .await
        .map_err(status_for)?;
    Ok(Json(records))
}

pub async fn conversation(
    State(state): State<AppState>,
    Path(other_user_email): Path<String>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let records = state
        .store
        .list_conversation(
            claims.sub,
            &other_user_email,
            query.limit.min(MAX_PAGE),
            query.offset,
        )
        .await
        .map_err(status_for)?;
    Ok(Json(records))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let receipt = state
        .store
        .mark_as_read(message_id, claims.sub)
        .await
        .map_err(status_for)?;
    Ok(Json(MarkReadResponse {
        read_at: receipt.read_at,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let unread_count = state
        .store
        .unread_count(claims.sub)
        .await
        .map_err(status_for)?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .store
        .delete(message_id, claims.sub)
        .await
        .map_err(status_for)?;
    Ok(StatusCode::NO_CONTENT)
}
