//! Audit log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of change recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "log_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Add,
    Edit,
    Delete,
    Restore,
    HardDelete,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Add => "ADD",
            LogAction::Edit => "EDIT",
            LogAction::Delete => "DELETE",
            LogAction::Restore => "RESTORE",
            LogAction::HardDelete => "HARD_DELETE",
        }
    }
}

/// Append-only audit log row
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct LogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor: String,
    pub action: LogAction,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
