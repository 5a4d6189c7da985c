//! Audit columns carried by every entity (who/when + soft delete).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
    pub is_active: bool,
}

impl AuditStamp {
    pub fn new(actor: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor,
            updated_by: actor,
            is_active: true,
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, actor: Option<UserId>, now: DateTime<Utc>) {
        self.updated_at = now;
        self.updated_by = actor;
    }

    /// Soft delete.
    pub fn deactivate(&mut self, actor: Option<UserId>, now: DateTime<Utc>) {
        self.is_active = false;
        self.touch(actor, now);
    }

    pub fn activate(&mut self, actor: Option<UserId>, now: DateTime<Utc>) {
        self.is_active = true;
        self.touch(actor, now);
    }
}
