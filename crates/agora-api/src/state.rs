use std::sync::Arc;

use agora_gateway::registry::ConnectionRegistry;
use agora_store::MessageStore;

pub type AppState = Arc<AppStateInner>;

/// Shared application state: the message store, the live-connection
/// registry, and the secret for verifying session tokens.
pub struct AppStateInner {
    pub store: Arc<dyn MessageStore>,
    pub registry: ConnectionRegistry,
    pub jwt_secret: String,
}
