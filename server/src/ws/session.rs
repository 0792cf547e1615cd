use axum::extract::ws::Message;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::identity::UserRecord;
use crate::ws::protocol::ServerMessage;
use crate::ws::{broadcast, ConnectionSender};

/// Process-local, ephemeral id of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Room membership of one session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Membership {
    #[default]
    Unjoined,
    Joined { room_id: String },
}

/// Server-side representative of one authenticated connection.
///
/// Owned by the connection actor. The room registry only keeps weak
/// references, so dropping the actor's Arc releases the handle.
pub struct SessionHandle {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub display_name: String,
    sender: ConnectionSender,
    /// Only the presence coordinator transitions this.
    membership: Mutex<Membership>,
    /// One-shot: set by the first disconnect.
    closed: AtomicBool,
}

impl SessionHandle {
    pub fn new(user: &UserRecord, sender: ConnectionSender) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            user_id: user.id.clone(),
            display_name: user.display_name(),
            sender,
            membership: Mutex::new(Membership::Unjoined),
            closed: AtomicBool::new(false),
        }
    }

    /// Room this session is currently joined to, if any.
    pub fn current_room(&self) -> Option<String> {
        match &*self.lock_membership() {
            Membership::Joined { room_id } => Some(room_id.clone()),
            Membership::Unjoined => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Encode and queue one message. Returns false if the writer is gone.
    pub fn send(&self, message: &ServerMessage) -> bool {
        match broadcast::encode(message) {
            Some(frame) => self.send_frame(frame),
            None => false,
        }
    }

    /// Queue an already-encoded frame.
    pub fn send_frame(&self, frame: Message) -> bool {
        self.sender.send(frame).is_ok()
    }

    pub(crate) fn lock_membership(&self) -> MutexGuard<'_, Membership> {
        // Membership is a plain enum; a panic elsewhere cannot leave it torn.
        self.membership.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip the closed flag. True only for the first caller.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("connection_id", &self.connection_id)
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("membership", &*self.lock_membership())
            .field("closed", &self.is_closed())
            .finish()
    }
}
