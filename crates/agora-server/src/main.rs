use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::HeaderMap,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::messages;
use agora_api::middleware::require_auth;
use agora_api::state::{AppState, AppStateInner};
use agora_gateway::registry::ConnectionRegistry;
use agora_gateway::{auth, connection};
use agora_store::{MessageStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("AGORA_DB_PATH").unwrap_or_else(|_| "agora.db".into());
    let host = std::env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AGORA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Shared state
    let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::open(&PathBuf::from(&db_path))?);
    let registry = ConnectionRegistry::new();
    let state: AppState = Arc::new(AppStateInner {
        store,
        registry,
        jwt_secret,
    });

    // Routes
    let message_routes = Router::new()
        .route("/messages/send", post(messages::send_message))
        .route("/messages/user-messages", get(messages::user_messages))
        .route(
            "/messages/conversation/{other_user_email}",
            get(messages::conversation),
        )
        .route("/messages/{message_id}/read", patch(messages::mark_read))
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/messages/{message_id}", delete(messages::delete_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/ws/messages", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(message_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Agora messaging server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Authenticate from the handshake metadata, then hand the socket to the
/// gateway. Rejections are closed inside the gateway with code 4001 so the
/// client can tell an auth failure apart from a transport error.
async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let claims = auth::authenticate_handshake(&headers, &state.jwt_secret);
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.registry.clone(), state.store.clone(), claims)
    })
}
