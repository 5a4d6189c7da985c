//! RBAC audit trail: who granted or revoked what, and whether it succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rentdesk_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RbacAction {
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    RoleAssigned,
    RoleRevoked,
    PermissionGranted,
    PermissionRevoked,
    UserUnlocked,
    LoginFailed,
    AccountLocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacAuditEntry {
    pub id: Uuid,
    pub actor: Option<UserId>,
    pub action: RbacAction,
    pub target_user: Option<UserId>,
    /// Role or permission name the action concerned.
    pub subject: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RbacAuditEntry {
    pub fn new(actor: Option<UserId>, action: RbacAction, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor,
            action,
            target_user: None,
            subject: None,
            success: true,
            detail: None,
            timestamp: now,
        }
    }

    pub fn target(mut self, user: UserId) -> Self {
        self.target_user = Some(user);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn failed(mut self, detail: impl Into<String>) -> Self {
        self.success = false;
        self.detail = Some(detail.into());
        self
    }
}
