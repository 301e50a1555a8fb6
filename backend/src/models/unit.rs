//! Unit and unit grant models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unit entity, owned by exactly one department
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, ToSchema)]
pub struct Unit {
    pub id: Uuid,
    pub description: String,
    pub department_id: Uuid,
    pub deleted_on: Option<DateTime<Utc>>,
}

impl Unit {
    pub fn new(department_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            department_id,
            deleted_on: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_on.is_some()
    }
}

/// Unit grant: the user may act on the unit (distinct from placement)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, ToSchema)]
pub struct UnitUser {
    pub unit_id: Uuid,
    pub user_id: Uuid,
    pub deleted_on: Option<DateTime<Utc>>,
}

impl UnitUser {
    pub fn new(unit_id: Uuid, user_id: Uuid) -> Self {
        Self {
            unit_id,
            user_id,
            deleted_on: None,
        }
    }

    pub fn key(&self) -> (Uuid, Uuid) {
        (self.unit_id, self.user_id)
    }

    pub fn is_active(&self) -> bool {
        self.deleted_on.is_none()
    }
}
