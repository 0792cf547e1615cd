pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod session;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use session::{ConnectionId, Membership, SessionHandle};

/// Sender half of a connection's outbound queue. The writer task owns the
/// receiving end and forwards everything to the socket.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Every live session by connection id. A user may appear under several
/// connection ids (multiple devices/tabs).
pub type SessionDirectory = Arc<DashMap<ConnectionId, Arc<SessionHandle>>>;

/// Create a new empty session directory.
pub fn new_session_directory() -> SessionDirectory {
    Arc::new(DashMap::new())
}
