use std::sync::Arc;

use crate::config::{CaptionsConfig, KeepaliveConfig};
use crate::identity::IdentityStore;
use crate::rooms::RoomRegistry;
use crate::ws::SessionDirectory;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// User directory consulted by the connection gate
    pub identity: Arc<dyn IdentityStore>,
    /// Shared HMAC secret for bearer credentials
    pub jwt_secret: Vec<u8>,
    /// Room membership, the only shared mutable state of the session layer
    pub rooms: RoomRegistry,
    /// Live sessions by connection id
    pub sessions: SessionDirectory,
    pub keepalive: KeepaliveConfig,
    pub captions: CaptionsConfig,
}
