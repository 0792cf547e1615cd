use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use super::{IdentityError, IdentityStore, UserRecord};
use crate::db::DbPool;

/// Identity store backed by the `users` table.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    db: DbPool,
}

impl SqliteIdentityStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Insert a user and return the stored record. Used for seeding and tests;
    /// account management proper belongs to the HTTP layer.
    pub fn insert_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, IdentityError> {
        let conn = self.db.lock().map_err(|_| IdentityError::LockPoisoned)?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, email, first_name, last_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![id, email, first_name, last_name, now],
        )?;

        Ok(UserRecord {
            id,
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, IdentityError> {
        let db = self.db.clone();
        let uid = user_id.to_string();

        // rusqlite blocks; keep it off the reactor threads
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| IdentityError::LockPoisoned)?;
            let user = conn
                .query_row(
                    "SELECT id, email, first_name, last_name FROM users WHERE id = ?1",
                    rusqlite::params![uid],
                    |row| {
                        Ok(UserRecord {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            first_name: row.get(2)?,
                            last_name: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn store() -> (SqliteIdentityStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("temp dir");
        let pool = db::init_db(tmp.path().to_str().unwrap()).expect("init db");
        (SqliteIdentityStore::new(pool), tmp)
    }

    #[tokio::test]
    async fn finds_inserted_user() {
        let (store, _tmp) = store();
        let inserted = store.insert_user("grace@example.com", "Grace", "Hopper").unwrap();

        let found = store.find_user(&inserted.id).await.unwrap();
        assert_eq!(found, Some(inserted));
    }

    #[tokio::test]
    async fn unknown_user_is_none() {
        let (store, _tmp) = store();
        assert_eq!(store.find_user("nobody").await.unwrap(), None);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (store, _tmp) = store();
        store.insert_user("dup@example.com", "A", "B").unwrap();
        assert!(store.insert_user("dup@example.com", "C", "D").is_err());
    }
}
