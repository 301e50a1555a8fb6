//! Access model.

use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Access entity: a node in an information system's permission tree.
///
/// The parent is stored as an id, never as a loaded object; tree walks go
/// through [`crate::services::access_tree::AccessTree`].
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, ToSchema)]
pub struct Access {
    pub id: Uuid,
    pub description: String,
    pub information_system_id: Uuid,
    pub parent_access_id: Option<Uuid>,
}

impl Access {
    pub fn root(information_system_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            information_system_id,
            parent_access_id: None,
        }
    }

    pub fn child_of(parent: &Access, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            information_system_id: parent.information_system_id,
            parent_access_id: Some(parent.id),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_access_id.is_none()
    }
}
