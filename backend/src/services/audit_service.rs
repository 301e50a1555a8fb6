//! Audit logging service.
//!
//! Records every change made through the console. Logging is fire-and-forget
//! from the caller's point of view: a failed insert is reported through
//! tracing and never rolls back the operation being logged.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::log::{LogAction, LogEntry};
use crate::services::visibility::CallerContext;
use crate::storage::Store;

/// Audit log entry builder
pub struct AuditEntry {
    actor_id: Option<Uuid>,
    actor: String,
    action: LogAction,
    description: String,
}

impl AuditEntry {
    pub fn new(action: LogAction, description: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            actor: "system".to_string(),
            action,
            description: description.into(),
        }
    }

    pub fn actor(mut self, caller: &CallerContext) -> Self {
        self.actor_id = Some(caller.user_id);
        self.actor = caller.username.clone();
        self
    }

    fn into_log_entry(self) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            actor_id: self.actor_id,
            actor: self.actor,
            action: self.action,
            description: self.description,
            created_at: Utc::now(),
        }
    }
}

/// Audit service
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
}

impl AuditService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditEntry) -> Result<Uuid> {
        let entry = entry.into_log_entry();
        self.store.insert_log(&entry).await?;
        Ok(entry.id)
    }

    /// Log a change made by `caller`; failures are only traced.
    pub async fn record(
        &self,
        caller: &CallerContext,
        action: LogAction,
        description: impl Into<String>,
    ) {
        let description = description.into();
        tracing::info!(
            actor = %caller.username,
            action = action.as_str(),
            "{}",
            description
        );
        if let Err(e) = self
            .log(AuditEntry::new(action, description).actor(caller))
            .await
        {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }

    /// Query audit logs, newest first
    pub async fn query(&self, offset: i64, limit: i64) -> Result<(Vec<LogEntry>, i64)> {
        self.store.list_logs(offset, limit).await
    }

    /// Remove every audit log row
    pub async fn purge(&self) -> Result<u64> {
        self.store.purge_logs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::AuthorityLevel;
    use crate::services::test_support::LogFailingStore;
    use crate::storage::memory::MemoryStore;
    use std::collections::BTreeSet;

    fn caller() -> CallerContext {
        CallerContext {
            user_id: Uuid::new_v4(),
            username: "auditor".to_string(),
            reading: AuthorityLevel::Full,
            writing: AuthorityLevel::Full,
            unit_ids: BTreeSet::new(),
        }
    }

    #[test]
    fn test_log_action_as_str() {
        assert_eq!(LogAction::Add.as_str(), "ADD");
        assert_eq!(LogAction::Edit.as_str(), "EDIT");
        assert_eq!(LogAction::Delete.as_str(), "DELETE");
        assert_eq!(LogAction::Restore.as_str(), "RESTORE");
        assert_eq!(LogAction::HardDelete.as_str(), "HARD_DELETE");
    }

    #[test]
    fn test_audit_entry_defaults_to_system_actor() {
        let entry = AuditEntry::new(LogAction::Add, "created").into_log_entry();
        assert!(entry.actor_id.is_none());
        assert_eq!(entry.actor, "system");
        assert_eq!(entry.description, "created");
    }

    #[test]
    fn test_audit_entry_builder_actor() {
        let c = caller();
        let entry = AuditEntry::new(LogAction::Edit, "renamed")
            .actor(&c)
            .into_log_entry();
        assert_eq!(entry.actor_id, Some(c.user_id));
        assert_eq!(entry.actor, "auditor");
        assert_eq!(entry.action, LogAction::Edit);
    }

    #[tokio::test]
    async fn test_record_query_and_purge() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()));
        let c = caller();
        audit.record(&c, LogAction::Add, "Added department 'HR'").await;
        audit.record(&c, LogAction::Delete, "Deleted department 'HR'").await;

        let (entries, total) = audit.query(0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.actor == "auditor"));

        let (page, total) = audit.query(1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);

        assert_eq!(audit.purge().await.unwrap(), 2);
        let (entries, total) = audit.query(0, 10).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_record_swallows_store_failure() {
        let inner: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let audit = AuditService::new(Arc::new(LogFailingStore::new(inner.clone())));
        let c = caller();

        assert!(audit
            .log(AuditEntry::new(LogAction::Add, "direct"))
            .await
            .is_err());
        audit.record(&c, LogAction::Add, "Added department 'HR'").await;
        let (_, total) = inner.list_logs(0, 10).await.unwrap();
        assert_eq!(total, 0);
    }
}
