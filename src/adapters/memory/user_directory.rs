//! In-memory user directory for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{UserDirectory, UserRecord};

/// In-memory [`UserDirectory`].
pub struct InMemoryUserDirectory {
    users: Mutex<Vec<UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
        }
    }

    /// Registers a user and returns their id (for test setup).
    pub fn add_user(&self, email: impl Into<String>) -> UserId {
        let id = UserId::new();
        self.users
            .lock()
            .expect("InMemoryUserDirectory: lock poisoned")
            .push(UserRecord {
                id,
                email: email.into(),
                display_name: None,
            });
        id
    }
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, DomainError> {
        Ok(self
            .users
            .lock()
            .expect("InMemoryUserDirectory: lock poisoned")
            .iter()
            .find(|u| &u.id == user_id)
            .cloned())
    }
}
