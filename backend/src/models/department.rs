//! Department model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Department entity, the top level of the organizational tree
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, ToSchema)]
pub struct Department {
    pub id: Uuid,
    pub description: String,
    pub deleted_on: Option<DateTime<Utc>>,
}

impl Department {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            deleted_on: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_on.is_some()
    }
}
