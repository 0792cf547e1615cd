//! JSON wire protocol for the real-time channel.
//!
//! Every frame is an object tagged by `type` with camelCase fields, e.g.
//! `{"type":"room.join","roomId":"m1"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::rooms::captions::{self, Caption};
use crate::rooms::presence;
use crate::rooms::signaling::{self, SignalKind, SignalingEnvelope};
use crate::state::AppState;
use crate::ws::SessionHandle;

/// Client-to-server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "room.join", rename_all = "camelCase")]
    RoomJoin { room_id: String },
    #[serde(rename = "room.leave", rename_all = "camelCase")]
    RoomLeave { room_id: String },
    #[serde(rename = "signal.offer", rename_all = "camelCase")]
    SignalOffer { target_user_id: String, payload: Value },
    #[serde(rename = "signal.answer", rename_all = "camelCase")]
    SignalAnswer { target_user_id: String, payload: Value },
    #[serde(rename = "signal.ice", rename_all = "camelCase")]
    SignalIce { target_user_id: String, payload: Value },
    #[serde(rename = "caption.send", rename_all = "camelCase")]
    CaptionSend {
        text: String,
        timestamp: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    /// Audio chunk notification. The audio bytes are not relayed; other
    /// members only learn that this user is streaming.
    #[serde(rename = "audio.stream", rename_all = "camelCase")]
    AudioStream { timestamp: Value },
}

/// Join/leave notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub room_id: String,
    pub user_id: String,
    pub display_name: String,
    /// RFC 3339, server clock
    pub timestamp: String,
}

/// Relayed caption payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionEvent {
    pub speaker_id: String,
    pub speaker_name: String,
    pub text: String,
    pub timestamp: Value,
    pub confidence: f64,
}

/// Server-to-client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "room.joined", rename_all = "camelCase")]
    RoomJoined { room_id: String },
    #[serde(rename = "presence.joined")]
    PresenceJoined(PresenceEvent),
    #[serde(rename = "presence.left")]
    PresenceLeft(PresenceEvent),
    #[serde(rename = "signal.offer", rename_all = "camelCase")]
    SignalOffer { from_user_id: String, payload: Value },
    #[serde(rename = "signal.answer", rename_all = "camelCase")]
    SignalAnswer { from_user_id: String, payload: Value },
    #[serde(rename = "signal.ice", rename_all = "camelCase")]
    SignalIce { from_user_id: String, payload: Value },
    #[serde(rename = "caption.received")]
    CaptionReceived(CaptionEvent),
    #[serde(rename = "audio.received", rename_all = "camelCase")]
    AudioReceived { user_id: String, timestamp: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

impl ClientMessage {
    /// Decode and check required string fields are present and non-empty.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let message: ClientMessage = serde_json::from_slice(data)?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::RoomJoin { room_id } | ClientMessage::RoomLeave { room_id } => {
                if room_id.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("roomId"));
                }
            }
            ClientMessage::SignalOffer { target_user_id, .. }
            | ClientMessage::SignalAnswer { target_user_id, .. }
            | ClientMessage::SignalIce { target_user_id, .. } => {
                if target_user_id.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("targetUserId"));
                }
            }
            ClientMessage::CaptionSend { .. } | ClientMessage::AudioStream { .. } => {}
        }
        Ok(())
    }
}

/// Handle one inbound frame body (text, or binary carrying the same JSON).
///
/// Bad frames are logged and dropped; they never end the session.
pub fn handle_frame(data: &[u8], state: &AppState, session: &Arc<SessionHandle>) {
    let message = match ClientMessage::parse(data) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                user_id = %session.user_id,
                connection_id = %session.connection_id,
                error = %e,
                "Dropping invalid client message"
            );
            return;
        }
    };

    dispatch(message, state, session);
}

/// Route a decoded message to the coordinator, relay or broadcaster.
pub fn dispatch(message: ClientMessage, state: &AppState, session: &Arc<SessionHandle>) {
    match message {
        ClientMessage::RoomJoin { room_id } => {
            presence::join_room(&state.rooms, session, &room_id);
        }
        ClientMessage::RoomLeave { room_id } => {
            presence::leave_room(&state.rooms, session, &room_id);
        }
        ClientMessage::SignalOffer {
            target_user_id,
            payload,
        } => relay(state, session, SignalKind::Offer, target_user_id, payload),
        ClientMessage::SignalAnswer {
            target_user_id,
            payload,
        } => relay(state, session, SignalKind::Answer, target_user_id, payload),
        ClientMessage::SignalIce {
            target_user_id,
            payload,
        } => relay(state, session, SignalKind::IceCandidate, target_user_id, payload),
        ClientMessage::CaptionSend {
            text,
            timestamp,
            confidence,
        } => {
            captions::broadcast_caption(
                &state.rooms,
                session,
                Caption {
                    text,
                    timestamp,
                    confidence,
                },
                state.captions.default_confidence,
            );
        }
        ClientMessage::AudioStream { timestamp } => {
            captions::broadcast_audio_activity(&state.rooms, session, timestamp);
        }
    }
}

fn relay(
    state: &AppState,
    session: &Arc<SessionHandle>,
    kind: SignalKind,
    target_user_id: String,
    payload: Value,
) {
    signaling::relay_signal(
        &state.rooms,
        session,
        SignalingEnvelope {
            kind,
            target_user_id,
            payload,
        },
    );
}
