//! Recording community role API for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::CommunityRoleApi;

/// In-memory [`CommunityRoleApi`] that records calls for assertions.
pub struct RecordingCommunityRoleApi {
    granted: Mutex<Vec<(UserId, String)>>,
    revoked: Mutex<Vec<(UserId, String)>>,
    fail_revoke: AtomicBool,
}

impl RecordingCommunityRoleApi {
    pub fn new() -> Self {
        Self {
            granted: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            fail_revoke: AtomicBool::new(false),
        }
    }

    /// Makes subsequent `revoke_role` calls fail (for test setup).
    pub fn fail_revokes(&self) {
        self.fail_revoke.store(true, Ordering::SeqCst);
    }

    /// Roles granted so far (for test assertions).
    pub fn granted(&self) -> Vec<(UserId, String)> {
        self.granted
            .lock()
            .expect("RecordingCommunityRoleApi: lock poisoned")
            .clone()
    }

    /// Roles revoked so far (for test assertions).
    pub fn revoked(&self) -> Vec<(UserId, String)> {
        self.revoked
            .lock()
            .expect("RecordingCommunityRoleApi: lock poisoned")
            .clone()
    }
}

impl Default for RecordingCommunityRoleApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommunityRoleApi for RecordingCommunityRoleApi {
    async fn grant_role(&self, user_id: &UserId, role_id: &str) -> Result<(), DomainError> {
        self.granted
            .lock()
            .expect("RecordingCommunityRoleApi: lock poisoned")
            .push((*user_id, role_id.to_string()));
        Ok(())
    }

    async fn revoke_role(&self, user_id: &UserId, role_id: &str) -> Result<(), DomainError> {
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                "Simulated role API failure",
            ));
        }
        self.revoked
            .lock()
            .expect("RecordingCommunityRoleApi: lock poisoned")
            .push((*user_id, role_id.to_string()));
        Ok(())
    }
}
