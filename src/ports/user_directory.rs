//! UserDirectory port - read-only lookup of user accounts.
//!
//! Users live in the identity system; this engine only needs to confirm a
//! user exists and fetch the contact fields notifications use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, UserId};

/// A user account as the identity system knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
}

/// Read-only port into the identity system.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks a user up by id.
    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directory_is_object_safe() {
        fn _accepts_dyn(_directory: &dyn UserDirectory) {}
    }
}
