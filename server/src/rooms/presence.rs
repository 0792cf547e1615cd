//! Presence coordinator: the only code that moves a session between
//! `Unjoined` and `Joined`, and the only code that broadcasts presence.

use chrono::Utc;
use std::sync::Arc;

use crate::rooms::RoomRegistry;
use crate::ws::broadcast::send_to_sessions;
use crate::ws::protocol::{PresenceEvent, ServerMessage};
use crate::ws::{Membership, SessionHandle};

fn presence_event(session: &SessionHandle, room_id: &str) -> PresenceEvent {
    PresenceEvent {
        room_id: room_id.to_string(),
        user_id: session.user_id.clone(),
        display_name: session.display_name.clone(),
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// Handle `room.join`.
///
/// Acks the joiner and tells the other members. Re-joining the current room
/// only re-sends the ack. Joining a different room leaves the current one
/// first, with the usual departure broadcast there.
pub fn join_room(registry: &RoomRegistry, session: &Arc<SessionHandle>, room_id: &str) {
    let mut membership = session.lock_membership();

    // Checked under the lock: disconnect sets the flag before taking it, so a
    // join can never slip in after the departure cleanup.
    if session.is_closed() {
        return;
    }

    let current = match &*membership {
        Membership::Joined { room_id } => Some(room_id.clone()),
        Membership::Unjoined => None,
    };

    if let Some(current) = current {
        if current == room_id {
            tracing::debug!(
                user_id = %session.user_id,
                room_id = %room_id,
                "Already in room, re-sending ack"
            );
            session.send(&ServerMessage::RoomJoined {
                room_id: room_id.to_string(),
            });
            return;
        }
        depart(registry, session, &current);
        *membership = Membership::Unjoined;
    }

    let outcome = registry.join(room_id, session);
    *membership = Membership::Joined {
        room_id: room_id.to_string(),
    };
    drop(membership);

    session.send(&ServerMessage::RoomJoined {
        room_id: room_id.to_string(),
    });

    if outcome.newly_joined {
        let event = ServerMessage::PresenceJoined(presence_event(session, room_id));
        send_to_sessions(&outcome.others, &event);
    }

    tracing::info!(
        user_id = %session.user_id,
        connection_id = %session.connection_id,
        room_id = %room_id,
        others = outcome.others.len(),
        "Joined room"
    );
}

/// Handle `room.leave`. Leaving a room the session is not in is a no-op.
pub fn leave_room(registry: &RoomRegistry, session: &Arc<SessionHandle>, room_id: &str) {
    let mut membership = session.lock_membership();

    let in_room = matches!(
        &*membership,
        Membership::Joined { room_id: current } if current == room_id
    );
    if !in_room {
        tracing::debug!(
            user_id = %session.user_id,
            room_id = %room_id,
            "Leave for a room this session is not in, ignoring"
        );
        return;
    }

    depart(registry, session, room_id);
    *membership = Membership::Unjoined;
}

/// Connection closed. Runs the departure at most once per session, no matter
/// how many close paths reach it or whether an explicit leave came first.
///
/// Returns true for the call that actually performed the cleanup.
pub fn disconnect(registry: &RoomRegistry, session: &Arc<SessionHandle>) -> bool {
    if !session.mark_closed() {
        return false;
    }

    let mut membership = session.lock_membership();
    if let Membership::Joined { room_id } = std::mem::take(&mut *membership) {
        depart(registry, session, &room_id);
    }
    true
}

/// Registry removal plus the `presence.left` broadcast. Only broadcasts when
/// the registry actually held the session.
fn depart(registry: &RoomRegistry, session: &SessionHandle, room_id: &str) {
    let outcome = registry.leave(room_id, session.connection_id);
    if !outcome.was_member {
        return;
    }

    let event = ServerMessage::PresenceLeft(presence_event(session, room_id));
    send_to_sessions(&outcome.remaining, &event);

    tracing::info!(
        user_id = %session.user_id,
        connection_id = %session.connection_id,
        room_id = %room_id,
        room_closed = outcome.room_closed,
        "Left room"
    );
}
