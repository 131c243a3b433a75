use axum::http::{HeaderMap, header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use agora_types::api::Claims;

/// Close code sent when the handshake carries no valid credential.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// Authenticate a WebSocket upgrade request from its handshake metadata.
/// The browser sends the `auth_token` session cookie with the upgrade, so
/// there is no separate in-band login step.
pub fn authenticate_handshake(headers: &HeaderMap, jwt_secret: &str) -> Option<Claims> {
    let Some(token) = token_from_cookies(headers) else {
        warn!("No auth_token cookie on WebSocket handshake");
        return None;
    };
    verify_token(&token, jwt_secret)
}

/// Extract the `auth_token` cookie value, if present.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix("auth_token=").map(str::to_string))
}

/// Verify a JWT and return its claims. Expired or tampered tokens yield
/// `None`; the caller decides whether that is a 401 or a close frame.
pub fn verify_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            warn!("Invalid token on handshake: {}", e);
            None
        }
    }
}
