use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

use agora_gateway::auth::{token_from_cookies, verify_token};

use crate::state::AppState;

/// Validate the session token and stash its claims for the handlers.
/// Accepts a bearer Authorization header or the `auth_token` cookie the
/// browser already sends — the same credential the WebSocket handshake uses.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = bearer
        .or_else(|| token_from_cookies(req.headers()))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = verify_token(&token, &state.jwt_secret).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
