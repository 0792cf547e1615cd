use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::config::KeepaliveConfig;
use crate::identity::UserRecord;
use crate::rooms::presence;
use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::SessionHandle;

/// Upper bound on waiting for the writer to flush a queued close frame.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from the session's queue
/// - Keepalive task: pings periodically, gives up when pongs stop
/// - Reader loop (this task): decodes frames and dispatches them in order
///
/// Whatever ends the loop (close frame, socket error, keepalive expiry), the
/// disconnect transition runs exactly once before the session is dropped.
pub async fn run_connection(socket: WebSocket, state: AppState, user: UserRecord) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let session = Arc::new(SessionHandle::new(&user, tx.clone()));
    state
        .sessions
        .insert(session.connection_id, session.clone());

    tracing::info!(
        user_id = %session.user_id,
        connection_id = %session.connection_id,
        sessions = state.sessions.len(),
        "WebSocket actor started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut keepalive_handle = tokio::spawn(keepalive_task(tx.clone(), pong_rx, state.keepalive));

    let mut keepalive_expired = false;

    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = &mut keepalive_handle => {
                tracing::warn!(
                    user_id = %session.user_id,
                    connection_id = %session.connection_id,
                    "Keepalive expired, dropping connection"
                );
                keepalive_expired = true;
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_frame(text.as_str().as_bytes(), &state, &session);
                }
                Message::Binary(data) => {
                    // Same JSON, different frame type
                    protocol::handle_frame(&data, &state, &session);
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %session.user_id,
                        connection_id = %session.connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %session.user_id,
                    connection_id = %session.connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(
                    user_id = %session.user_id,
                    connection_id = %session.connection_id,
                    "WebSocket stream ended"
                );
                break;
            }
        }
    }

    keepalive_handle.abort();
    if keepalive_expired {
        // The keepalive task queued a close frame; the writer exits once it is sent
        let _ = timeout(CLOSE_FLUSH_TIMEOUT, &mut writer_handle).await;
    }
    writer_handle.abort();

    presence::disconnect(&state.rooms, &session);
    state.sessions.remove(&session.connection_id);

    tracing::info!(
        user_id = %session.user_id,
        connection_id = %session.connection_id,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from the session queue and forwards them to the sink.
/// Stops after forwarding a close frame.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || is_close {
            break;
        }
    }
}

/// Keepalive task: pings every interval and returns once a pong is missed
/// (after queueing a close frame) or the writer is gone.
async fn keepalive_task(
    tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    keepalive: KeepaliveConfig,
) {
    let mut ping_timer = interval(keepalive.ping_interval());
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        // Pongs that arrived unprompted don't count toward this round
        while pong_rx.try_recv().is_ok() {}

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            return;
        }

        match timeout(keepalive.pong_timeout(), pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                return;
            }
        }
    }
}
