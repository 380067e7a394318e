use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use tokio::time::timeout;

use crate::auth::middleware::bearer_token;
use crate::auth::AuthError;
use crate::state::AppState;
use crate::ws::actor;
use crate::ws::protocol::{parse_client_event, ClientEvent};

/// Close code sent when no credential arrives within the authentication window.
pub const CLOSE_AUTH_TIMEOUT: u16 = 4006;

/// Query parameters for WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws?token=JWT
///
/// The credential may come from the query string, an `Authorization: Bearer`
/// header, or (when neither is present) an `authenticate` first frame.
/// On auth failure, upgrades then immediately closes with the matching code.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = params
        .token
        .or_else(|| bearer_token(&headers).map(str::to_string));

    let Some(token) = credential else {
        return ws.on_upgrade(move |socket| await_credential(socket, state));
    };

    match state.verifier.verify(&token) {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, user_id))
        }
        Err(err) => {
            tracing::warn!(
                close_code = err.close_code(),
                error = %err,
                "WebSocket auth failed"
            );
            ws.on_upgrade(move |socket| reject(socket, err.close_code(), err.close_reason()))
        }
    }
}

/// Connecting state: the transport is open but unauthenticated. Wait a bounded
/// time for an `authenticate` frame, then verify it or refuse the connection.
async fn await_credential(mut socket: WebSocket, state: AppState) {
    let window = state.settings.auth_timeout;

    let token = match timeout(window, first_credential(&mut socket)).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            let err = AuthError::Missing;
            tracing::warn!(error = %err, "WebSocket closed before authenticating");
            reject(socket, err.close_code(), err.close_reason()).await;
            return;
        }
        Err(_) => {
            tracing::warn!(timeout = ?window, "WebSocket authentication timed out");
            reject(socket, CLOSE_AUTH_TIMEOUT, "Authentication timeout").await;
            return;
        }
    };

    match state.verifier.verify(&token) {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "WebSocket connection authenticated by first frame");
            actor::run_connection(socket, state, user_id).await;
        }
        Err(err) => {
            tracing::warn!(
                close_code = err.close_code(),
                error = %err,
                "WebSocket auth failed"
            );
            reject(socket, err.close_code(), err.close_reason()).await;
        }
    }
}

/// Read frames until the first meaningful one. Returns the token if it is an
/// `authenticate` event, `None` for anything else or a closed transport.
async fn first_credential(socket: &mut WebSocket) -> Option<String> {
    while let Some(frame) = socket.recv().await {
        match frame.ok()? {
            Message::Text(text) => {
                return match parse_client_event(text.as_str()) {
                    Ok(ClientEvent::Authenticate { token }) => Some(token),
                    _ => None,
                };
            }
            Message::Ping(data) => {
                let _ = socket.send(Message::Pong(data)).await;
            }
            Message::Pong(_) => {}
            Message::Binary(_) | Message::Close(_) => return None,
        }
    }
    None
}

/// Send a Close frame with the given code. The peer sees a refused connection.
async fn reject(mut socket: WebSocket, code: u16, reason: &'static str) {
    let close_frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(close_frame))).await;
}
