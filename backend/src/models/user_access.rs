//! User access (grant record) model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Grant record keyed by `(user_id, access_id)`.
///
/// A row is either active (`revoked_on` is `None`) or revoked, in which case
/// `revoked_by_directive_id` is always set as well.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, ToSchema)]
pub struct UserAccess {
    pub user_id: Uuid,
    pub access_id: Uuid,
    pub granted_by_directive_id: Uuid,
    pub granted_on: DateTime<Utc>,
    pub revoked_on: Option<DateTime<Utc>>,
    pub revoked_by_directive_id: Option<Uuid>,
}

impl UserAccess {
    pub fn key(&self) -> (Uuid, Uuid) {
        (self.user_id, self.access_id)
    }

    pub fn is_active(&self) -> bool {
        self.revoked_on.is_none()
    }

    pub fn references_directive(&self, directive_id: Uuid) -> bool {
        self.granted_by_directive_id == directive_id
            || self.revoked_by_directive_id == Some(directive_id)
    }
}
