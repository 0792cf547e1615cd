use axum::extract::ws::Message;
use std::sync::Arc;

use crate::ws::protocol::ServerMessage;
use crate::ws::SessionHandle;

/// Encode a server message as a JSON text frame.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server message");
            None
        }
    }
}

/// Fire-and-forget fan-out: encode once, queue to every session given.
/// Returns how many queues accepted the frame.
pub fn send_to_sessions(sessions: &[Arc<SessionHandle>], message: &ServerMessage) -> usize {
    if sessions.is_empty() {
        return 0;
    }
    let Some(frame) = encode(message) else {
        return 0;
    };

    sessions
        .iter()
        .filter(|session| session.send_frame(frame.clone()))
        .count()
}
