//! Organizational directory service.
//!
//! Departments, units, users and unit grants. Reads are filtered through
//! the visibility scoper; every mutation checks the caller's writing level
//! and writes an audit entry.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::department::Department;
use crate::models::log::LogAction;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::{AuthorityLevel, User};
use crate::services::audit_service::AuditService;
use crate::services::auth_service::AuthService;
use crate::services::cascade::{self, Selection};
use crate::services::validation;
use crate::services::visibility::{self, CallerContext, Capability};
use crate::storage::{CascadeOp, CascadePlan, Store};

/// List options shared by the directory listings
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Case-insensitive substring match
    pub search: Option<String>,
    /// Include soft-deleted rows; needs reading `Full`
    pub include_deleted: bool,
}

impl ListFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            include_deleted: false,
        }
    }

    /// Lowercased search term, `None` when blank
    pub(crate) fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

fn matches_search(needle: &Option<String>, fields: &[&str]) -> bool {
    match needle {
        None => true,
        Some(n) => fields.iter().any(|f| f.to_lowercase().contains(n)),
    }
}

/// Request to create a user
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub egn: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub unit_id: Uuid,
    #[serde(default)]
    pub reading_access: AuthorityLevel,
    #[serde(default)]
    pub writing_access: AuthorityLevel,
}

/// Request to update a user. Absent fields are left unchanged; an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub egn: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub unit_id: Option<Uuid>,
    pub reading_access: Option<AuthorityLevel>,
    pub writing_access: Option<AuthorityLevel>,
    pub password: Option<String>,
}

/// Directory service
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    async fn load_department(&self, id: Uuid) -> Result<Department> {
        self.store
            .get_department(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Department not found".to_string()))
    }

    async fn load_unit(&self, id: Uuid) -> Result<Unit> {
        self.store
            .get_unit(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Unit not found".to_string()))
    }

    async fn load_user(&self, id: Uuid) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// A unit that can receive users or grants
    async fn live_unit(&self, id: Uuid) -> Result<Unit> {
        let unit = self.load_unit(id).await?;
        if unit.is_deleted() {
            return Err(AppError::Validation(format!(
                "Unit '{}' is deleted",
                unit.description
            )));
        }
        Ok(unit)
    }

    async fn writable_user(&self, caller: &CallerContext, id: Uuid) -> Result<User> {
        let user = self.load_user(id).await?;
        if user.is_deleted() {
            return Err(AppError::Validation(format!(
                "User '{}' is deleted",
                user.username
            )));
        }
        caller.require_user(Capability::Write, &user)?;
        Ok(user)
    }

    fn can_read_unit(caller: &CallerContext, unit: &Unit) -> bool {
        caller.reading.is_unscoped()
            || (!unit.is_deleted() && caller.covers_unit(Capability::Read, unit.id))
    }

    fn can_read_user(caller: &CallerContext, user: &User) -> bool {
        caller.reading.is_unscoped()
            || (!user.is_deleted() && caller.covers_user(Capability::Read, user))
    }

    /// Authority levels may never be raised above the caller's own.
    fn check_authority(
        caller: &CallerContext,
        reading: AuthorityLevel,
        writing: AuthorityLevel,
    ) -> Result<()> {
        if reading > caller.reading || writing > caller.writing {
            return Err(AppError::Authorization(
                "Cannot assign an authority level above your own".to_string(),
            ));
        }
        Ok(())
    }

    async fn apply(&self, op: CascadeOp, plan: &CascadePlan) -> Result<()> {
        tracing::debug!(
            ?op,
            departments = plan.department_ids.len(),
            units = plan.unit_ids.len(),
            users = plan.user_ids.len(),
            unit_grants = plan.unit_user_keys.len(),
            grants = plan.user_access_keys.len(),
            "Applying cascade"
        );
        self.store.apply_cascade(op, plan).await
    }

    fn guard_self(caller: &CallerContext, plan: &CascadePlan) -> Result<()> {
        if plan.user_ids.contains(&caller.user_id) {
            return Err(AppError::Blocked(
                "The operation would delete your own account".to_string(),
            ));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Departments
    // ---------------------------------------------------------------------

    pub async fn list_departments(
        &self,
        caller: &CallerContext,
        filter: &ListFilter,
    ) -> Result<Vec<Department>> {
        let departments = self.store.list_departments().await?;
        let mut out = if filter.include_deleted {
            caller.require_level(Capability::Read, AuthorityLevel::Full)?;
            departments
        } else {
            let units = self.store.list_units().await?;
            visibility::accessible_departments(caller, Capability::Read, &departments, &units)
        };
        let needle = filter.needle();
        out.retain(|d| matches_search(&needle, &[d.description.as_str()]));
        Ok(out)
    }

    pub async fn get_department(&self, caller: &CallerContext, id: Uuid) -> Result<Department> {
        let department = self.load_department(id).await?;
        if caller.reading.is_unscoped() {
            return Ok(department);
        }
        let units = self.store.list_units().await?;
        let visible = !department.is_deleted()
            && visibility::accessible_units(caller, Capability::Read, &units)
                .iter()
                .any(|u| u.department_id == department.id);
        if !visible {
            return Err(AppError::NotFound("Department not found".to_string()));
        }
        Ok(department)
    }

    pub async fn create_department(
        &self,
        caller: &CallerContext,
        description: &str,
    ) -> Result<Department> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let department = Department::new(validation::required_text("Description", description)?);
        self.store.insert_department(&department).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!("Added department '{}'", department.description),
            )
            .await;
        Ok(department)
    }

    pub async fn rename_department(
        &self,
        caller: &CallerContext,
        id: Uuid,
        description: &str,
    ) -> Result<Department> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let mut department = self.load_department(id).await?;
        if department.is_deleted() {
            return Err(AppError::Validation("Department is deleted".to_string()));
        }
        let old = std::mem::replace(
            &mut department.description,
            validation::required_text("Description", description)?,
        );
        self.store.update_department(&department).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!(
                    "Renamed department '{}' to '{}'",
                    old, department.description
                ),
            )
            .await;
        Ok(department)
    }

    /// Soft delete: stamps the department, its units, their grants and users.
    pub async fn delete_department(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let department = self.load_department(id).await?;
        if department.is_deleted() {
            return Err(AppError::Validation("Department is already deleted".to_string()));
        }
        let plan = cascade::plan_department(self.store.as_ref(), &department, Selection::Live).await?;
        Self::guard_self(caller, &plan)?;
        self.apply(CascadeOp::SoftDelete(Utc::now()), &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::Delete,
                format!("Deleted department '{}'", department.description),
            )
            .await;
        Ok(())
    }

    pub async fn restore_department(&self, caller: &CallerContext, id: Uuid) -> Result<Department> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let department = self.load_department(id).await?;
        let Some(stamp) = department.deleted_on else {
            return Err(AppError::Validation("Department is not deleted".to_string()));
        };
        let plan =
            cascade::plan_department(self.store.as_ref(), &department, Selection::Stamped(stamp))
                .await?;
        self.apply(CascadeOp::Restore, &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::Restore,
                format!("Restored department '{}'", department.description),
            )
            .await;
        self.load_department(id).await
    }

    /// Physically remove the department and everything below it.
    pub async fn hard_delete_department(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        caller.require_super_admin()?;
        let department = self.load_department(id).await?;
        let plan = cascade::plan_department(self.store.as_ref(), &department, Selection::All).await?;
        Self::guard_self(caller, &plan)?;
        self.apply(CascadeOp::HardDelete, &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::HardDelete,
                format!(
                    "Permanently deleted department '{}' with {} units and {} users",
                    department.description,
                    plan.unit_ids.len(),
                    plan.user_ids.len()
                ),
            )
            .await;
        Ok(())
    }

    pub async fn units_of_department(
        &self,
        caller: &CallerContext,
        department_id: Uuid,
    ) -> Result<Vec<Unit>> {
        self.get_department(caller, department_id).await?;
        let units = self.store.units_of_department(department_id).await?;
        Ok(visibility::accessible_units(caller, Capability::Read, &units))
    }

    // ---------------------------------------------------------------------
    // Units
    // ---------------------------------------------------------------------

    pub async fn list_units(&self, caller: &CallerContext, filter: &ListFilter) -> Result<Vec<Unit>> {
        let units = self.store.list_units().await?;
        let mut out = if filter.include_deleted {
            caller.require_level(Capability::Read, AuthorityLevel::Full)?;
            units
        } else {
            visibility::accessible_units(caller, Capability::Read, &units)
        };
        let needle = filter.needle();
        out.retain(|u| matches_search(&needle, &[u.description.as_str()]));
        Ok(out)
    }

    pub async fn get_unit(&self, caller: &CallerContext, id: Uuid) -> Result<Unit> {
        let unit = self.load_unit(id).await?;
        if !Self::can_read_unit(caller, &unit) {
            return Err(AppError::NotFound("Unit not found".to_string()));
        }
        Ok(unit)
    }

    pub async fn create_unit(
        &self,
        caller: &CallerContext,
        department_id: Uuid,
        description: &str,
    ) -> Result<Unit> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let department = self.load_department(department_id).await?;
        if department.is_deleted() {
            return Err(AppError::Validation(format!(
                "Department '{}' is deleted",
                department.description
            )));
        }
        let unit = Unit::new(
            department.id,
            validation::required_text("Description", description)?,
        );
        self.store.insert_unit(&unit).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!(
                    "Added unit '{}' to department '{}'",
                    unit.description, department.description
                ),
            )
            .await;
        Ok(unit)
    }

    pub async fn rename_unit(
        &self,
        caller: &CallerContext,
        id: Uuid,
        description: &str,
    ) -> Result<Unit> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let mut unit = self.live_unit(id).await?;
        let old = std::mem::replace(
            &mut unit.description,
            validation::required_text("Description", description)?,
        );
        self.store.update_unit(&unit).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!("Renamed unit '{}' to '{}'", old, unit.description),
            )
            .await;
        Ok(unit)
    }

    pub async fn delete_unit(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let unit = self.live_unit(id).await?;
        let plan = cascade::plan_unit(self.store.as_ref(), &unit, Selection::Live).await?;
        Self::guard_self(caller, &plan)?;
        self.apply(CascadeOp::SoftDelete(Utc::now()), &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::Delete,
                format!("Deleted unit '{}'", unit.description),
            )
            .await;
        Ok(())
    }

    /// Restore a unit; its department must not be deleted.
    pub async fn restore_unit(&self, caller: &CallerContext, id: Uuid) -> Result<Unit> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)?;
        let unit = self.load_unit(id).await?;
        let Some(stamp) = unit.deleted_on else {
            return Err(AppError::Validation("Unit is not deleted".to_string()));
        };
        let department = self.load_department(unit.department_id).await?;
        if department.is_deleted() {
            return Err(AppError::Blocked(format!(
                "Department '{}' is deleted; restore it first",
                department.description
            )));
        }
        let plan = cascade::plan_unit(self.store.as_ref(), &unit, Selection::Stamped(stamp)).await?;
        self.apply(CascadeOp::Restore, &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::Restore,
                format!("Restored unit '{}'", unit.description),
            )
            .await;
        self.load_unit(id).await
    }

    pub async fn hard_delete_unit(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        caller.require_super_admin()?;
        let unit = self.load_unit(id).await?;
        let plan = cascade::plan_unit(self.store.as_ref(), &unit, Selection::All).await?;
        Self::guard_self(caller, &plan)?;
        self.apply(CascadeOp::HardDelete, &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::HardDelete,
                format!(
                    "Permanently deleted unit '{}' with {} users",
                    unit.description,
                    plan.user_ids.len()
                ),
            )
            .await;
        Ok(())
    }

    pub async fn users_of_unit(&self, caller: &CallerContext, unit_id: Uuid) -> Result<Vec<User>> {
        let unit = self.get_unit(caller, unit_id).await?;
        let users = self.store.users_of_unit(unit_id).await?;
        Ok(visibility::accessible_users(
            caller,
            Capability::Read,
            &users,
            std::slice::from_ref(&unit),
        ))
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    pub async fn list_users(&self, caller: &CallerContext, filter: &ListFilter) -> Result<Vec<User>> {
        let users = self.store.list_users().await?;
        let mut out = if filter.include_deleted {
            caller.require_level(Capability::Read, AuthorityLevel::Full)?;
            users
        } else {
            let units = self.store.list_units().await?;
            visibility::accessible_users(caller, Capability::Read, &users, &units)
        };
        let needle = filter.needle();
        out.retain(|u| {
            matches_search(
                &needle,
                &[
                    u.username.as_str(),
                    u.first_name.as_str(),
                    u.last_name.as_str(),
                    u.position.as_deref().unwrap_or_default(),
                ],
            )
        });
        Ok(out)
    }

    pub async fn get_user(&self, caller: &CallerContext, id: Uuid) -> Result<User> {
        let user = self.load_user(id).await?;
        if !Self::can_read_user(caller, &user) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(user)
    }

    pub async fn create_user(&self, caller: &CallerContext, req: CreateUserRequest) -> Result<User> {
        caller.require_unit(Capability::Write, req.unit_id)?;
        Self::check_authority(caller, req.reading_access, req.writing_access)?;
        let unit = self.live_unit(req.unit_id).await?;

        let mut user = User::new(
            validation::username(&req.username)?,
            validation::required_text("First name", &req.first_name)?,
            validation::required_text("Last name", &req.last_name)?,
            unit.id,
        )
        .with_authority(req.reading_access, req.writing_access);
        user.middle_name = validation::optional_text("Middle name", req.middle_name.as_deref())?;
        user.egn = validation::egn(req.egn.as_deref())?;
        user.phone = validation::phone(req.phone.as_deref())?;
        user.position = validation::optional_text("Position", req.position.as_deref())?;
        if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
            validation::password(password)?;
            user.password_hash = Some(AuthService::hash_password(password)?);
        }

        self.store.insert_user(&user).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!(
                    "Added user '{}' ({}) to unit '{}'",
                    user.username,
                    user.full_name(),
                    unit.description
                ),
            )
            .await;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        caller: &CallerContext,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User> {
        let mut user = self.writable_user(caller, id).await?;

        if let Some(first_name) = req.first_name.as_deref() {
            user.first_name = validation::required_text("First name", first_name)?;
        }
        if let Some(last_name) = req.last_name.as_deref() {
            user.last_name = validation::required_text("Last name", last_name)?;
        }
        if req.middle_name.is_some() {
            user.middle_name = validation::optional_text("Middle name", req.middle_name.as_deref())?;
        }
        if req.egn.is_some() {
            user.egn = validation::egn(req.egn.as_deref())?;
        }
        if req.phone.is_some() {
            user.phone = validation::phone(req.phone.as_deref())?;
        }
        if req.position.is_some() {
            user.position = validation::optional_text("Position", req.position.as_deref())?;
        }
        if let Some(unit_id) = req.unit_id.filter(|u| *u != user.unit_id) {
            caller.require_unit(Capability::Write, unit_id)?;
            user.unit_id = self.live_unit(unit_id).await?.id;
        }
        if req.reading_access.is_some() || req.writing_access.is_some() {
            let reading = req.reading_access.unwrap_or(user.reading_access);
            let writing = req.writing_access.unwrap_or(user.writing_access);
            if (reading, writing) != (user.reading_access, user.writing_access) {
                Self::check_authority(caller, reading, writing)?;
                if user.id == caller.user_id {
                    return Err(AppError::Authorization(
                        "Cannot change your own authority levels".to_string(),
                    ));
                }
            }
            user.reading_access = reading;
            user.writing_access = writing;
        }
        if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
            validation::password(password)?;
            user.password_hash = Some(AuthService::hash_password(password)?);
        }

        self.store.update_user(&user).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!("Edited user '{}'", user.username),
            )
            .await;
        Ok(user)
    }

    pub async fn delete_user(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        let user = self.writable_user(caller, id).await?;
        let plan = cascade::plan_user(self.store.as_ref(), &user, Selection::Live).await?;
        Self::guard_self(caller, &plan)?;
        self.apply(CascadeOp::SoftDelete(Utc::now()), &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::Delete,
                format!("Deleted user '{}'", user.username),
            )
            .await;
        Ok(())
    }

    /// Restore a user; the placement unit must not be deleted.
    pub async fn restore_user(&self, caller: &CallerContext, id: Uuid) -> Result<User> {
        let user = self.load_user(id).await?;
        let Some(stamp) = user.deleted_on else {
            return Err(AppError::Validation("User is not deleted".to_string()));
        };
        caller.require_user(Capability::Write, &user)?;
        let unit = self.load_unit(user.unit_id).await?;
        if unit.is_deleted() {
            return Err(AppError::Blocked(format!(
                "Unit '{}' is deleted; restore it first",
                unit.description
            )));
        }
        let plan = cascade::plan_user(self.store.as_ref(), &user, Selection::Stamped(stamp)).await?;
        self.apply(CascadeOp::Restore, &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::Restore,
                format!("Restored user '{}'", user.username),
            )
            .await;
        self.load_user(id).await
    }

    pub async fn hard_delete_user(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        caller.require_super_admin()?;
        let user = self.load_user(id).await?;
        let plan = cascade::plan_user(self.store.as_ref(), &user, Selection::All).await?;
        Self::guard_self(caller, &plan)?;
        self.apply(CascadeOp::HardDelete, &plan).await?;
        self.audit
            .record(
                caller,
                LogAction::HardDelete,
                format!(
                    "Permanently deleted user '{}' and {} access grants",
                    user.username,
                    plan.user_access_keys.len()
                ),
            )
            .await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Unit grants
    // ---------------------------------------------------------------------

    /// Units the user holds an active grant on
    pub async fn unit_grants_of_user(&self, caller: &CallerContext, user_id: Uuid) -> Result<Vec<Unit>> {
        self.get_user(caller, user_id).await?;
        let grants = self.store.unit_users_of_user(user_id).await?;
        let mut units = Vec::new();
        for grant in grants.iter().filter(|g| g.is_active()) {
            if let Some(unit) = self.store.get_unit(grant.unit_id).await? {
                if !unit.is_deleted() {
                    units.push(unit);
                }
            }
        }
        units.sort_by(|a, b| a.description.cmp(&b.description));
        Ok(units)
    }

    /// Units the caller could still grant to the user
    pub async fn available_units(&self, caller: &CallerContext, user_id: Uuid) -> Result<Vec<Unit>> {
        self.get_user(caller, user_id).await?;
        let grants = self.store.unit_users_of_user(user_id).await?;
        let units = self.store.list_units().await?;
        Ok(visibility::inaccessible_units(caller, &grants, &units))
    }

    /// Grant a unit; a previously revoked grant is reactivated.
    pub async fn grant_unit(&self, caller: &CallerContext, user_id: Uuid, unit_id: Uuid) -> Result<UnitUser> {
        let user = self.writable_user(caller, user_id).await?;
        caller.require_unit(Capability::Write, unit_id)?;
        let unit = self.live_unit(unit_id).await?;
        let grant = UnitUser::new(unit.id, user.id);
        self.store.upsert_unit_user(&grant).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!(
                    "Granted unit '{}' to user '{}'",
                    unit.description, user.username
                ),
            )
            .await;
        Ok(grant)
    }

    /// Revoke a unit grant by soft-deleting the row
    pub async fn revoke_unit(&self, caller: &CallerContext, user_id: Uuid, unit_id: Uuid) -> Result<()> {
        let user = self.writable_user(caller, user_id).await?;
        caller.require_unit(Capability::Write, unit_id)?;
        let mut grant = self
            .store
            .unit_users_of_user(user_id)
            .await?
            .into_iter()
            .find(|g| g.unit_id == unit_id && g.is_active())
            .ok_or_else(|| AppError::NotFound("Unit grant not found".to_string()))?;
        grant.deleted_on = Some(Utc::now());
        self.store.upsert_unit_user(&grant).await?;

        let unit = self.load_unit(unit_id).await?;
        self.audit
            .record(
                caller,
                LogAction::Delete,
                format!(
                    "Revoked unit '{}' from user '{}'",
                    unit.description, user.username
                ),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, LogFailingStore};

    fn service(f: &Fixture) -> DirectoryService {
        DirectoryService::new(f.store.clone(), AuditService::new(f.store.clone()))
    }

    fn new_user(username: &str, unit_id: Uuid) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: None,
            first_name: "Petar".to_string(),
            middle_name: None,
            last_name: "Petrov".to_string(),
            egn: Some("8001011234".to_string()),
            phone: Some("0888 123 456".to_string()),
            position: Some("Accountant".to_string()),
            unit_id,
            reading_access: AuthorityLevel::None,
            writing_access: AuthorityLevel::None,
        }
    }

    #[tokio::test]
    async fn test_department_crud_and_audit() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let manager = f.caller(&f.manager).await;

        let finance = svc.create_department(&manager, "  Finance ").await.unwrap();
        assert_eq!(finance.description, "Finance");
        let renamed = svc
            .rename_department(&manager, finance.id, "Finance & Accounting")
            .await
            .unwrap();
        assert_eq!(renamed.description, "Finance & Accounting");

        let err = svc.create_department(&manager, "HR").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = svc
            .create_department(&manager, &"x".repeat(51))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (logs, _) = f.store.list_logs(0, 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.actor == "manager"));
    }

    #[tokio::test]
    async fn test_structure_changes_need_full_writing() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let clerk = f.caller(&f.clerk).await;
        assert!(matches!(
            svc.create_department(&clerk, "Finance").await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            svc.delete_unit(&clerk, f.payroll.id).await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_restricted_reader_lists_only_its_footprint() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let viewer = f.caller(&f.viewer).await;

        let departments = svc
            .list_departments(&viewer, &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(departments.len(), 1);
        assert_eq!(departments[0].id, f.hr.id);

        let users = svc.list_users(&viewer, &ListFilter::default()).await.unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["anna", "clerk", "viewer"]);

        assert!(matches!(
            svc.get_user(&viewer, f.vera.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.list_users(
                &viewer,
                &ListFilter {
                    search: None,
                    include_deleted: true
                }
            )
            .await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_user_lookup_needs_full_reading() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;
        let manager = f.caller(&f.manager).await;
        let clerk = f.caller(&f.clerk).await;

        assert_eq!(svc.get_user(&clerk, f.anna.id).await.unwrap().id, f.anna.id);
        svc.delete_user(&admin, f.anna.id).await.unwrap();

        let anna = svc.get_user(&manager, f.anna.id).await.unwrap();
        assert!(anna.is_deleted());
        assert!(matches!(
            svc.get_user(&clerk, f.anna.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_search() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;
        let found = svc.list_users(&admin, &ListFilter::search("IVAN")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "anna");
    }

    #[tokio::test]
    async fn test_department_soft_delete_and_restore() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;

        svc.delete_department(&admin, f.hr.id).await.unwrap();
        let visible = svc
            .list_departments(&admin, &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        let all = svc
            .list_departments(
                &admin,
                &ListFilter {
                    search: None,
                    include_deleted: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        let anna = f.store.get_user(f.anna.id).await.unwrap().unwrap();
        assert!(anna.is_deleted());

        // units of a deleted department cannot be restored on their own
        assert!(matches!(
            svc.restore_unit(&admin, f.payroll.id).await,
            Err(AppError::Blocked(_))
        ));

        svc.restore_department(&admin, f.hr.id).await.unwrap();
        let anna = f.store.get_user(f.anna.id).await.unwrap().unwrap();
        assert!(!anna.is_deleted());
        let payroll = f.store.get_unit(f.payroll.id).await.unwrap().unwrap();
        assert!(!payroll.is_deleted());
    }

    #[tokio::test]
    async fn test_cannot_delete_own_department() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;
        assert!(matches!(
            svc.delete_department(&admin, f.it.id).await,
            Err(AppError::Blocked(_))
        ));
        assert!(matches!(
            svc.delete_user(&admin, f.admin.id).await,
            Err(AppError::Blocked(_))
        ));
    }

    #[tokio::test]
    async fn test_hard_delete_needs_super_admin() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let manager = f.caller(&f.manager).await;
        assert!(matches!(
            svc.hard_delete_department(&manager, f.hr.id).await,
            Err(AppError::Authorization(_))
        ));

        let admin = f.caller(&f.admin).await;
        svc.hard_delete_department(&admin, f.hr.id).await.unwrap();
        assert!(f.store.get_department(f.hr.id).await.unwrap().is_none());
        assert!(f.store.get_user(f.anna.id).await.unwrap().is_none());
        let (logs, _) = f.store.list_logs(0, 10).await.unwrap();
        assert_eq!(logs[0].action, LogAction::HardDelete);
    }

    #[tokio::test]
    async fn test_create_user_validates_and_scopes() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let clerk = f.caller(&f.clerk).await;

        let user = svc
            .create_user(&clerk, new_user("ppetrov", f.payroll.id))
            .await
            .unwrap();
        assert_eq!(user.phone.as_deref(), Some("0888123456"));

        assert!(matches!(
            svc.create_user(&clerk, new_user("outsider", f.helpdesk.id)).await,
            Err(AppError::Authorization(_))
        ));

        let mut bad_egn = new_user("badegn", f.payroll.id);
        bad_egn.egn = Some("123".to_string());
        assert!(matches!(
            svc.create_user(&clerk, bad_egn).await,
            Err(AppError::Validation(_))
        ));

        let mut escalated = new_user("escalated", f.payroll.id);
        escalated.writing_access = AuthorityLevel::Full;
        assert!(matches!(
            svc.create_user(&clerk, escalated).await,
            Err(AppError::Authorization(_))
        ));

        assert!(matches!(
            svc.create_user(&clerk, new_user("ppetrov", f.payroll.id)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_fields_and_placement() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;

        let updated = svc
            .update_user(
                &admin,
                f.anna.id,
                UpdateUserRequest {
                    middle_name: Some("Petrova".to_string()),
                    position: Some(String::new()),
                    unit_id: Some(f.helpdesk.id),
                    reading_access: Some(AuthorityLevel::Restricted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name(), "Anna Petrova Ivanova");
        assert_eq!(updated.position, None);
        assert_eq!(updated.unit_id, f.helpdesk.id);
        assert_eq!(updated.reading_access, AuthorityLevel::Restricted);
        assert_eq!(updated.writing_access, AuthorityLevel::None);

        assert!(matches!(
            svc.update_user(
                &admin,
                f.admin.id,
                UpdateUserRequest {
                    reading_access: Some(AuthorityLevel::None),
                    ..Default::default()
                }
            )
            .await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_restricted_writer_cannot_move_user_out_of_scope() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let clerk = f.caller(&f.clerk).await;
        assert!(matches!(
            svc.update_user(
                &clerk,
                f.anna.id,
                UpdateUserRequest {
                    unit_id: Some(f.helpdesk.id),
                    ..Default::default()
                }
            )
            .await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_user_restore_requires_live_unit() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;

        svc.delete_user(&admin, f.anna.id).await.unwrap();
        svc.delete_unit(&admin, f.payroll.id).await.unwrap();
        assert!(matches!(
            svc.restore_user(&admin, f.anna.id).await,
            Err(AppError::Blocked(_))
        ));

        svc.restore_unit(&admin, f.payroll.id).await.unwrap();
        // anna was deleted before the unit and keeps her own stamp
        assert!(f.store.get_user(f.anna.id).await.unwrap().unwrap().is_deleted());
        let anna = svc.restore_user(&admin, f.anna.id).await.unwrap();
        assert!(!anna.is_deleted());
    }

    #[tokio::test]
    async fn test_unit_grants_revoke_and_regrant() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;

        let available = svc.available_units(&admin, f.clerk.id).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, f.helpdesk.id);

        svc.grant_unit(&admin, f.clerk.id, f.helpdesk.id).await.unwrap();
        assert_eq!(
            svc.unit_grants_of_user(&admin, f.clerk.id).await.unwrap().len(),
            2
        );
        assert!(svc.available_units(&admin, f.clerk.id).await.unwrap().is_empty());

        svc.revoke_unit(&admin, f.clerk.id, f.helpdesk.id).await.unwrap();
        assert!(matches!(
            svc.revoke_unit(&admin, f.clerk.id, f.helpdesk.id).await,
            Err(AppError::NotFound(_))
        ));
        let rows = f.store.unit_users_of_user(f.clerk.id).await.unwrap();
        assert_eq!(rows.len(), 2);

        svc.grant_unit(&admin, f.clerk.id, f.helpdesk.id).await.unwrap();
        let rows = f.store.unit_users_of_user(f.clerk.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.is_active()));
    }

    #[tokio::test]
    async fn test_restricted_writer_cannot_grant_foreign_unit() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let clerk = f.caller(&f.clerk).await;
        assert!(matches!(
            svc.grant_unit(&clerk, f.anna.id, f.helpdesk.id).await,
            Err(AppError::Authorization(_))
        ));
        assert!(svc.grant_unit(&clerk, f.anna.id, f.payroll.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_survives_audit_failure() {
        let f = Fixture::new().await;
        let store: Arc<dyn Store> = Arc::new(LogFailingStore::new(f.store.clone()));
        let svc = DirectoryService::new(store.clone(), AuditService::new(store));
        let admin = f.caller(&f.admin).await;

        svc.delete_department(&admin, f.hr.id).await.unwrap();
        let hr = f.store.get_department(f.hr.id).await.unwrap().unwrap();
        assert!(hr.is_deleted());
        let anna = f.store.get_user(f.anna.id).await.unwrap().unwrap();
        assert!(anna.is_deleted());
    }
}
