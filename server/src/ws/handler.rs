use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use serde::Deserialize;

use crate::auth::gate;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws?token=JWT (or `Authorization: Bearer JWT`)
///
/// The gate runs before the upgrade is accepted. On failure the socket is
/// upgraded and immediately closed with the gate's close code, and no
/// session is created. On success an actor takes over the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = params.token.or_else(|| bearer_token(&headers));

    match gate::authenticate(&state.jwt_secret, state.identity.as_ref(), credential.as_deref()).await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, user))
        }
        Err(err) => {
            let close_code = err.close_code();
            let reason = err.to_string();

            tracing::warn!(
                close_code = close_code,
                error = ?err,
                "WebSocket auth failed"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_string())
}
