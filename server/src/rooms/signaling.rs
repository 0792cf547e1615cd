//! Signaling relay: targeted WebRTC negotiation messages between two
//! participants of the same room. Payloads are passed through untouched.

use serde_json::Value;
use std::sync::Arc;

use crate::rooms::RoomRegistry;
use crate::ws::broadcast::send_to_sessions;
use crate::ws::protocol::ServerMessage;
use crate::ws::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// One in-flight negotiation message. The sender is implicit: the session
/// that submitted it.
#[derive(Debug, Clone)]
pub struct SignalingEnvelope {
    pub kind: SignalKind,
    pub target_user_id: String,
    pub payload: Value,
}

impl SignalingEnvelope {
    fn into_server_message(self, from_user_id: String) -> ServerMessage {
        match self.kind {
            SignalKind::Offer => ServerMessage::SignalOffer {
                from_user_id,
                payload: self.payload,
            },
            SignalKind::Answer => ServerMessage::SignalAnswer {
                from_user_id,
                payload: self.payload,
            },
            SignalKind::IceCandidate => ServerMessage::SignalIce {
                from_user_id,
                payload: self.payload,
            },
        }
    }
}

/// Deliver `envelope` to every connection of the target user in the
/// sender's current room. At most once per target connection, no retry.
///
/// Senders outside any room, and targets not present in the room, are
/// dropped silently (debug log only). Returns the number of deliveries.
pub fn relay_signal(
    registry: &RoomRegistry,
    session: &Arc<SessionHandle>,
    envelope: SignalingEnvelope,
) -> usize {
    let Some(room_id) = session.current_room() else {
        tracing::debug!(
            user_id = %session.user_id,
            kind = envelope.kind.as_str(),
            "Signal from session outside any room, dropping"
        );
        return 0;
    };

    let targets: Vec<Arc<SessionHandle>> = registry
        .members_except(&room_id, session.connection_id)
        .into_iter()
        .filter(|member| member.user_id == envelope.target_user_id)
        .collect();

    if targets.is_empty() {
        tracing::debug!(
            user_id = %session.user_id,
            target_user_id = %envelope.target_user_id,
            room_id = %room_id,
            kind = envelope.kind.as_str(),
            "Signal target not in room, dropping"
        );
        return 0;
    }

    let kind = envelope.kind;
    let message = envelope.into_server_message(session.user_id.clone());
    let delivered = send_to_sessions(&targets, &message);

    tracing::debug!(
        user_id = %session.user_id,
        room_id = %room_id,
        kind = kind.as_str(),
        delivered,
        "Relayed signal"
    );
    delivered
}
