//! Transcript broadcast: caption text and audio-activity notices fanned out
//! to the rest of the sender's room. Fire-and-forget.

use serde_json::Value;
use std::sync::Arc;

use crate::rooms::RoomRegistry;
use crate::ws::broadcast::send_to_sessions;
use crate::ws::protocol::{CaptionEvent, ServerMessage};
use crate::ws::SessionHandle;

/// A caption as submitted by a client.
#[derive(Debug, Clone)]
pub struct Caption {
    pub text: String,
    pub timestamp: Value,
    pub confidence: Option<f64>,
}

/// Send `caption` to every other member of the sender's room. The sender
/// never gets an echo. Returns the number of recipients.
pub fn broadcast_caption(
    registry: &RoomRegistry,
    session: &Arc<SessionHandle>,
    caption: Caption,
    default_confidence: f64,
) -> usize {
    let Some(room_id) = session.current_room() else {
        tracing::debug!(user_id = %session.user_id, "Caption from session outside any room, dropping");
        return 0;
    };

    let recipients = registry.members_except(&room_id, session.connection_id);
    if recipients.is_empty() {
        tracing::debug!(user_id = %session.user_id, room_id = %room_id, "Caption has no recipients");
        return 0;
    }

    let confidence = caption
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(default_confidence);

    let message = ServerMessage::CaptionReceived(CaptionEvent {
        speaker_id: session.user_id.clone(),
        speaker_name: session.display_name.clone(),
        text: caption.text,
        timestamp: caption.timestamp,
        confidence,
    });

    send_to_sessions(&recipients, &message)
}

/// Let the other members know this user is streaming audio. The audio
/// itself is not relayed.
pub fn broadcast_audio_activity(
    registry: &RoomRegistry,
    session: &Arc<SessionHandle>,
    timestamp: Value,
) -> usize {
    let Some(room_id) = session.current_room() else {
        return 0;
    };

    let recipients = registry.members_except(&room_id, session.connection_id);
    let message = ServerMessage::AudioReceived {
        user_id: session.user_id.clone(),
        timestamp,
    };
    send_to_sessions(&recipients, &message)
}
