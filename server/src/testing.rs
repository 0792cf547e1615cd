//! Helpers shared by the unit tests.

use async_trait::async_trait;
use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::identity::{IdentityError, IdentityStore, UserRecord};
use crate::ws::protocol::ServerMessage;
use crate::ws::SessionHandle;

/// A session wired to an in-memory queue instead of a socket.
pub fn session(
    user_id: &str,
    display_name: &str,
) -> (Arc<SessionHandle>, mpsc::UnboundedReceiver<Message>) {
    let (first_name, last_name) = display_name
        .split_once(' ')
        .unwrap_or((display_name, ""));
    let user = UserRecord {
        id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    };
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(SessionHandle::new(&user, tx)), rx)
}

/// Everything queued for a session so far, decoded.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        match frame {
            Message::Text(text) => {
                out.push(serde_json::from_str(text.as_str()).expect("valid server message"))
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
    out
}

/// Identity store over a fixed map.
#[derive(Default)]
pub struct MemoryIdentityStore {
    users: HashMap<String, UserRecord>,
}

impl MemoryIdentityStore {
    pub fn with_users(users: &[(&str, &str, &str)]) -> Self {
        let users = users
            .iter()
            .map(|(id, first, last)| {
                (
                    id.to_string(),
                    UserRecord {
                        id: id.to_string(),
                        email: format!("{id}@example.com"),
                        first_name: first.to_string(),
                        last_name: last.to_string(),
                    },
                )
            })
            .collect();
        Self { users }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, IdentityError> {
        Ok(self.users.get(user_id).cloned())
    }
}
