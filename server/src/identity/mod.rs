//! Identity lookup used by the connection gate.
//!
//! The gate only needs "user id -> user record or nothing"; the store behind
//! it is a trait so the server can sit in front of any user directory.

pub mod sqlite;

use async_trait::async_trait;

pub use sqlite::SqliteIdentityStore;

/// A user as seen by the real-time layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserRecord {
    /// "First Last", or the email when both name parts are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("identity lookup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// External user directory.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve a user id taken from a verified credential.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> UserRecord {
        UserRecord {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn display_name_joins_first_and_last() {
        assert_eq!(user("Ada", "Lovelace").display_name(), "Ada Lovelace");
    }

    #[test]
    fn display_name_handles_missing_last_name() {
        assert_eq!(user("Ada", "").display_name(), "Ada");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(user(" ", "").display_name(), "ada@example.com");
    }
}
