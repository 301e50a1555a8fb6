//! Relational store backends.
//!
//! Services never talk to a database directly; they go through [`Store`],
//! which exposes plain CRUD plus the few compound operations that must be
//! atomic (grant upsert, revoke, cascades, reset).

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::department::Department;
use crate::models::directive::Directive;
use crate::models::information_system::InformationSystem;
use crate::models::log::LogEntry;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::User;
use crate::models::user_access::UserAccess;

/// What a cascade does to the rows listed in a [`CascadePlan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOp {
    /// Stamp `deleted_on` with the given instant
    SoftDelete(DateTime<Utc>),
    /// Clear `deleted_on`
    Restore,
    /// Physically remove the rows, grants first
    HardDelete,
}

/// Rows touched by one delete/restore cascade.
///
/// Applied by [`Store::apply_cascade`] as a single atomic unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadePlan {
    pub department_ids: Vec<Uuid>,
    pub unit_ids: Vec<Uuid>,
    pub user_ids: Vec<Uuid>,
    /// `(unit_id, user_id)`
    pub unit_user_keys: Vec<(Uuid, Uuid)>,
    /// `(user_id, access_id)`; only removed by [`CascadeOp::HardDelete`]
    pub user_access_keys: Vec<(Uuid, Uuid)>,
}

impl CascadePlan {
    pub fn is_empty(&self) -> bool {
        self.department_ids.is_empty()
            && self.unit_ids.is_empty()
            && self.user_ids.is_empty()
            && self.unit_user_keys.is_empty()
            && self.user_access_keys.is_empty()
    }
}

/// Relational store trait
#[async_trait]
pub trait Store: Send + Sync {
    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    // Departments
    async fn list_departments(&self) -> Result<Vec<Department>>;
    async fn get_department(&self, id: Uuid) -> Result<Option<Department>>;
    async fn insert_department(&self, department: &Department) -> Result<()>;
    async fn update_department(&self, department: &Department) -> Result<()>;

    // Units
    async fn list_units(&self) -> Result<Vec<Unit>>;
    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>>;
    async fn units_of_department(&self, department_id: Uuid) -> Result<Vec<Unit>>;
    async fn insert_unit(&self, unit: &Unit) -> Result<()>;
    async fn update_unit(&self, unit: &Unit) -> Result<()>;

    // Unit grants
    async fn list_unit_users(&self) -> Result<Vec<UnitUser>>;
    async fn unit_users_of_user(&self, user_id: Uuid) -> Result<Vec<UnitUser>>;
    async fn unit_users_of_unit(&self, unit_id: Uuid) -> Result<Vec<UnitUser>>;
    /// Insert the row, or overwrite `deleted_on` if `(unit_id, user_id)` exists
    async fn upsert_unit_user(&self, unit_user: &UnitUser) -> Result<()>;

    // Users
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn users_of_unit(&self, unit_id: Uuid) -> Result<Vec<User>>;
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn update_user(&self, user: &User) -> Result<()>;

    // Information systems
    async fn list_information_systems(&self) -> Result<Vec<InformationSystem>>;
    async fn get_information_system(&self, id: Uuid) -> Result<Option<InformationSystem>>;
    async fn insert_information_system(&self, system: &InformationSystem) -> Result<()>;
    async fn update_information_system(&self, system: &InformationSystem) -> Result<()>;
    async fn delete_information_system(&self, id: Uuid) -> Result<()>;

    // Accesses
    async fn list_accesses(&self) -> Result<Vec<Access>>;
    async fn get_access(&self, id: Uuid) -> Result<Option<Access>>;
    async fn children_of_access(&self, id: Uuid) -> Result<Vec<Access>>;
    async fn insert_access(&self, access: &Access) -> Result<()>;
    async fn update_access(&self, access: &Access) -> Result<()>;
    async fn delete_access(&self, id: Uuid) -> Result<()>;

    // Directives
    async fn list_directives(&self) -> Result<Vec<Directive>>;
    async fn get_directive(&self, id: Uuid) -> Result<Option<Directive>>;
    async fn insert_directive(&self, directive: &Directive) -> Result<()>;
    async fn update_directive(&self, directive: &Directive) -> Result<()>;
    async fn delete_directive(&self, id: Uuid) -> Result<()>;

    // Grants
    async fn list_user_accesses(&self) -> Result<Vec<UserAccess>>;
    async fn user_accesses_of_user(&self, user_id: Uuid) -> Result<Vec<UserAccess>>;
    async fn user_accesses_of_access(&self, access_id: Uuid) -> Result<Vec<UserAccess>>;
    async fn get_user_access(&self, user_id: Uuid, access_id: Uuid)
        -> Result<Option<UserAccess>>;
    /// Create or reactivate the grant row for `(user_id, access_id)` atomically
    async fn upsert_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess>;
    /// Revoke an active grant; `NotFound` without a row, `AlreadyRevoked` when revoked
    async fn revoke_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess>;
    /// Number of grant rows naming the directive as granting or revoking
    async fn count_directive_references(&self, directive_id: Uuid) -> Result<i64>;

    // Cascades
    async fn apply_cascade(&self, op: CascadeOp, plan: &CascadePlan) -> Result<()>;

    // Audit log
    async fn insert_log(&self, entry: &LogEntry) -> Result<()>;
    /// Newest first
    async fn list_logs(&self, offset: i64, limit: i64) -> Result<(Vec<LogEntry>, i64)>;
    async fn purge_logs(&self) -> Result<u64>;

    /// Remove all directory, catalog and grant data except `keep_user_id`,
    /// its placement unit and that unit's department. The audit log stays.
    async fn reset(&self, keep_user_id: Uuid) -> Result<()>;
}

/// Create the store selected by configuration, running migrations for postgres
pub async fn from_config(config: &Config) -> Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::Config("DATABASE_URL not set".into()))?;
            let pool = crate::db::create_pool(url).await?;
            tracing::info!("Connected to database");
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations complete");
            Ok(Arc::new(postgres::PgStore::new(pool)))
        }
    }
}
