//! Seeded in-memory organization shared by service tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::department::Department;
use crate::models::directive::Directive;
use crate::models::information_system::InformationSystem;
use crate::models::log::LogEntry;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::{AuthorityLevel, User};
use crate::models::user_access::UserAccess;
use crate::services::visibility::CallerContext;
use crate::storage::memory::MemoryStore;
use crate::storage::{CascadeOp, CascadePlan, Store};

/// HR (Payroll) and IT (Helpdesk), an HR information system with
/// `HR -> Payroll`, two directives and users at every authority level.
pub struct Fixture {
    pub store: Arc<dyn Store>,
    pub hr: Department,
    pub it: Department,
    pub payroll: Unit,
    pub helpdesk: Unit,
    /// SuperAdmin / SuperAdmin, placed in Helpdesk
    pub admin: User,
    /// Full / Full, placed in Helpdesk
    pub manager: User,
    /// Restricted / Restricted with a unit grant on Payroll
    pub clerk: User,
    /// Restricted / None with a unit grant on Payroll
    pub viewer: User,
    /// None / None, placed in Payroll
    pub anna: User,
    /// None / None, placed in Helpdesk
    pub vera: User,
    pub system: InformationSystem,
    pub hr_access: Access,
    pub payroll_access: Access,
    pub order_1: Directive,
    pub order_2: Directive,
}

impl Fixture {
    pub async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let hr = Department::new("HR");
        let it = Department::new("IT");
        store.insert_department(&hr).await.unwrap();
        store.insert_department(&it).await.unwrap();

        let payroll = Unit::new(hr.id, "Payroll");
        let helpdesk = Unit::new(it.id, "Helpdesk");
        store.insert_unit(&payroll).await.unwrap();
        store.insert_unit(&helpdesk).await.unwrap();

        let admin = User::new("admin", "Admin", "Adminov", helpdesk.id)
            .with_authority(AuthorityLevel::SuperAdmin, AuthorityLevel::SuperAdmin);
        let manager = User::new("manager", "Maria", "Koleva", helpdesk.id)
            .with_authority(AuthorityLevel::Full, AuthorityLevel::Full);
        let clerk = User::new("clerk", "Kiril", "Stoyanov", payroll.id)
            .with_authority(AuthorityLevel::Restricted, AuthorityLevel::Restricted);
        let viewer = User::new("viewer", "Viktor", "Nikolov", payroll.id)
            .with_authority(AuthorityLevel::Restricted, AuthorityLevel::None);
        let anna = User::new("anna", "Anna", "Ivanova", payroll.id);
        let vera = User::new("vera", "Vera", "Dimitrova", helpdesk.id);
        for user in [&admin, &manager, &clerk, &viewer, &anna, &vera] {
            store.insert_user(user).await.unwrap();
        }
        store
            .upsert_unit_user(&UnitUser::new(payroll.id, clerk.id))
            .await
            .unwrap();
        store
            .upsert_unit_user(&UnitUser::new(payroll.id, viewer.id))
            .await
            .unwrap();

        let system = InformationSystem::new("HRIS");
        store.insert_information_system(&system).await.unwrap();
        let hr_access = Access::root(system.id, "HR");
        let payroll_access = Access::child_of(&hr_access, "Payroll");
        store.insert_access(&hr_access).await.unwrap();
        store.insert_access(&payroll_access).await.unwrap();

        let order_1 = Directive::new("Order 1/2024");
        let order_2 = Directive::new("Order 2/2024");
        store.insert_directive(&order_1).await.unwrap();
        store.insert_directive(&order_2).await.unwrap();

        Self {
            store,
            hr,
            it,
            payroll,
            helpdesk,
            admin,
            manager,
            clerk,
            viewer,
            anna,
            vera,
            system,
            hr_access,
            payroll_access,
            order_1,
            order_2,
        }
    }

    pub async fn caller(&self, user: &User) -> CallerContext {
        CallerContext::load(self.store.as_ref(), user).await.unwrap()
    }
}

/// Store whose audit log writes always fail; everything else goes to `inner`.
pub struct LogFailingStore {
    inner: Arc<dyn Store>,
}

impl LogFailingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Store for LogFailingStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn list_departments(&self) -> Result<Vec<Department>> {
        self.inner.list_departments().await
    }
    async fn get_department(&self, id: Uuid) -> Result<Option<Department>> {
        self.inner.get_department(id).await
    }
    async fn insert_department(&self, department: &Department) -> Result<()> {
        self.inner.insert_department(department).await
    }
    async fn update_department(&self, department: &Department) -> Result<()> {
        self.inner.update_department(department).await
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        self.inner.list_units().await
    }
    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>> {
        self.inner.get_unit(id).await
    }
    async fn units_of_department(&self, department_id: Uuid) -> Result<Vec<Unit>> {
        self.inner.units_of_department(department_id).await
    }
    async fn insert_unit(&self, unit: &Unit) -> Result<()> {
        self.inner.insert_unit(unit).await
    }
    async fn update_unit(&self, unit: &Unit) -> Result<()> {
        self.inner.update_unit(unit).await
    }

    async fn list_unit_users(&self) -> Result<Vec<UnitUser>> {
        self.inner.list_unit_users().await
    }
    async fn unit_users_of_user(&self, user_id: Uuid) -> Result<Vec<UnitUser>> {
        self.inner.unit_users_of_user(user_id).await
    }
    async fn unit_users_of_unit(&self, unit_id: Uuid) -> Result<Vec<UnitUser>> {
        self.inner.unit_users_of_unit(unit_id).await
    }
    async fn upsert_unit_user(&self, unit_user: &UnitUser) -> Result<()> {
        self.inner.upsert_unit_user(unit_user).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.inner.list_users().await
    }
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.inner.find_user_by_username(username).await
    }
    async fn users_of_unit(&self, unit_id: Uuid) -> Result<Vec<User>> {
        self.inner.users_of_unit(unit_id).await
    }
    async fn insert_user(&self, user: &User) -> Result<()> {
        self.inner.insert_user(user).await
    }
    async fn update_user(&self, user: &User) -> Result<()> {
        self.inner.update_user(user).await
    }

    async fn list_information_systems(&self) -> Result<Vec<InformationSystem>> {
        self.inner.list_information_systems().await
    }
    async fn get_information_system(&self, id: Uuid) -> Result<Option<InformationSystem>> {
        self.inner.get_information_system(id).await
    }
    async fn insert_information_system(&self, system: &InformationSystem) -> Result<()> {
        self.inner.insert_information_system(system).await
    }
    async fn update_information_system(&self, system: &InformationSystem) -> Result<()> {
        self.inner.update_information_system(system).await
    }
    async fn delete_information_system(&self, id: Uuid) -> Result<()> {
        self.inner.delete_information_system(id).await
    }

    async fn list_accesses(&self) -> Result<Vec<Access>> {
        self.inner.list_accesses().await
    }
    async fn get_access(&self, id: Uuid) -> Result<Option<Access>> {
        self.inner.get_access(id).await
    }
    async fn children_of_access(&self, id: Uuid) -> Result<Vec<Access>> {
        self.inner.children_of_access(id).await
    }
    async fn insert_access(&self, access: &Access) -> Result<()> {
        self.inner.insert_access(access).await
    }
    async fn update_access(&self, access: &Access) -> Result<()> {
        self.inner.update_access(access).await
    }
    async fn delete_access(&self, id: Uuid) -> Result<()> {
        self.inner.delete_access(id).await
    }

    async fn list_directives(&self) -> Result<Vec<Directive>> {
        self.inner.list_directives().await
    }
    async fn get_directive(&self, id: Uuid) -> Result<Option<Directive>> {
        self.inner.get_directive(id).await
    }
    async fn insert_directive(&self, directive: &Directive) -> Result<()> {
        self.inner.insert_directive(directive).await
    }
    async fn update_directive(&self, directive: &Directive) -> Result<()> {
        self.inner.update_directive(directive).await
    }
    async fn delete_directive(&self, id: Uuid) -> Result<()> {
        self.inner.delete_directive(id).await
    }

    async fn list_user_accesses(&self) -> Result<Vec<UserAccess>> {
        self.inner.list_user_accesses().await
    }
    async fn user_accesses_of_user(&self, user_id: Uuid) -> Result<Vec<UserAccess>> {
        self.inner.user_accesses_of_user(user_id).await
    }
    async fn user_accesses_of_access(&self, access_id: Uuid) -> Result<Vec<UserAccess>> {
        self.inner.user_accesses_of_access(access_id).await
    }
    async fn get_user_access(
        &self,
        user_id: Uuid,
        access_id: Uuid,
    ) -> Result<Option<UserAccess>> {
        self.inner.get_user_access(user_id, access_id).await
    }
    async fn upsert_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess> {
        self.inner
            .upsert_grant(user_id, access_id, directive_id, at)
            .await
    }
    async fn revoke_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess> {
        self.inner
            .revoke_grant(user_id, access_id, directive_id, at)
            .await
    }
    async fn count_directive_references(&self, directive_id: Uuid) -> Result<i64> {
        self.inner.count_directive_references(directive_id).await
    }

    async fn apply_cascade(&self, op: CascadeOp, plan: &CascadePlan) -> Result<()> {
        self.inner.apply_cascade(op, plan).await
    }

    async fn insert_log(&self, _entry: &LogEntry) -> Result<()> {
        Err(AppError::Database("audit table unavailable".to_string()))
    }
    async fn list_logs(&self, offset: i64, limit: i64) -> Result<(Vec<LogEntry>, i64)> {
        self.inner.list_logs(offset, limit).await
    }
    async fn purge_logs(&self) -> Result<u64> {
        self.inner.purge_logs().await
    }

    async fn reset(&self, keep_user_id: Uuid) -> Result<()> {
        self.inner.reset(keep_user_id).await
    }
}
