//! In-memory store backend.
//!
//! Every operation runs under one lock, so compound operations (grant
//! upsert, cascades, reset) are atomic with respect to each other. Used by
//! tests and by `STORE_BACKEND=memory` for local runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CascadeOp, CascadePlan, Store};
use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::department::Department;
use crate::models::directive::Directive;
use crate::models::information_system::InformationSystem;
use crate::models::log::LogEntry;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::User;
use crate::models::user_access::UserAccess;
use crate::services::grant_service::{apply_grant, apply_revoke};

#[derive(Default)]
struct MemoryState {
    departments: HashMap<Uuid, Department>,
    units: HashMap<Uuid, Unit>,
    unit_users: BTreeMap<(Uuid, Uuid), UnitUser>,
    users: HashMap<Uuid, User>,
    information_systems: HashMap<Uuid, InformationSystem>,
    accesses: HashMap<Uuid, Access>,
    directives: HashMap<Uuid, Directive>,
    user_accesses: BTreeMap<(Uuid, Uuid), UserAccess>,
    logs: Vec<LogEntry>,
}

impl MemoryState {
    fn check_department_unique(&self, department: &Department) -> Result<()> {
        if self
            .departments
            .values()
            .any(|d| d.id != department.id && d.description == department.description)
        {
            return Err(AppError::Conflict(format!(
                "Department '{}' already exists",
                department.description
            )));
        }
        Ok(())
    }

    fn check_unit_unique(&self, unit: &Unit) -> Result<()> {
        if self.units.values().any(|u| {
            u.id != unit.id
                && u.department_id == unit.department_id
                && u.description == unit.description
        }) {
            return Err(AppError::Conflict(format!(
                "Unit '{}' already exists in this department",
                unit.description
            )));
        }
        Ok(())
    }

    fn check_user_unique(&self, user: &User) -> Result<()> {
        if self
            .users
            .values()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        Ok(())
    }

    fn check_system_unique(&self, system: &InformationSystem) -> Result<()> {
        if self
            .information_systems
            .values()
            .any(|s| s.id != system.id && s.name == system.name)
        {
            return Err(AppError::Conflict(format!(
                "Information system '{}' already exists",
                system.name
            )));
        }
        Ok(())
    }

    fn check_access_unique(&self, access: &Access) -> Result<()> {
        if self
            .accesses
            .values()
            .any(|a| a.id != access.id && a.description == access.description)
        {
            return Err(AppError::Conflict(format!(
                "Access '{}' already exists",
                access.description
            )));
        }
        Ok(())
    }

    fn check_directive_unique(&self, directive: &Directive) -> Result<()> {
        if self
            .directives
            .values()
            .any(|d| d.id != directive.id && d.name == directive.name)
        {
            return Err(AppError::Conflict(format!(
                "Directive '{}' already exists",
                directive.name
            )));
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Same outcome as a foreign-key violation in Postgres
fn missing_reference(what: &str) -> AppError {
    AppError::Blocked(format!("Referenced {} is missing", what))
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_departments(&self) -> Result<Vec<Department>> {
        let state = self.state.read().await;
        Ok(sorted(state.departments.values().cloned().collect(), |d| {
            d.description.clone()
        }))
    }

    async fn get_department(&self, id: Uuid) -> Result<Option<Department>> {
        Ok(self.state.read().await.departments.get(&id).cloned())
    }

    async fn insert_department(&self, department: &Department) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_department_unique(department)?;
        state.departments.insert(department.id, department.clone());
        Ok(())
    }

    async fn update_department(&self, department: &Department) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.departments.contains_key(&department.id) {
            return Err(AppError::NotFound("Department not found".to_string()));
        }
        state.check_department_unique(department)?;
        state.departments.insert(department.id, department.clone());
        Ok(())
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        let state = self.state.read().await;
        Ok(sorted(state.units.values().cloned().collect(), |u| {
            u.description.clone()
        }))
    }

    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>> {
        Ok(self.state.read().await.units.get(&id).cloned())
    }

    async fn units_of_department(&self, department_id: Uuid) -> Result<Vec<Unit>> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .units
                .values()
                .filter(|u| u.department_id == department_id)
                .cloned()
                .collect(),
            |u| u.description.clone(),
        ))
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.departments.contains_key(&unit.department_id) {
            return Err(missing_reference("department"));
        }
        state.check_unit_unique(unit)?;
        state.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn update_unit(&self, unit: &Unit) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.units.contains_key(&unit.id) {
            return Err(AppError::NotFound("Unit not found".to_string()));
        }
        state.check_unit_unique(unit)?;
        state.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn list_unit_users(&self) -> Result<Vec<UnitUser>> {
        Ok(self.state.read().await.unit_users.values().cloned().collect())
    }

    async fn unit_users_of_user(&self, user_id: Uuid) -> Result<Vec<UnitUser>> {
        let state = self.state.read().await;
        Ok(state
            .unit_users
            .values()
            .filter(|uu| uu.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn unit_users_of_unit(&self, unit_id: Uuid) -> Result<Vec<UnitUser>> {
        let state = self.state.read().await;
        Ok(state
            .unit_users
            .values()
            .filter(|uu| uu.unit_id == unit_id)
            .cloned()
            .collect())
    }

    async fn upsert_unit_user(&self, unit_user: &UnitUser) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.units.contains_key(&unit_user.unit_id) {
            return Err(missing_reference("unit"));
        }
        if !state.users.contains_key(&unit_user.user_id) {
            return Err(missing_reference("user"));
        }
        state.unit_users.insert(unit_user.key(), unit_user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(sorted(state.users.values().cloned().collect(), |u| {
            u.username.clone()
        }))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn users_of_unit(&self, unit_id: Uuid) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .users
                .values()
                .filter(|u| u.unit_id == unit_id)
                .cloned()
                .collect(),
            |u| u.username.clone(),
        ))
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.units.contains_key(&user.unit_id) {
            return Err(missing_reference("unit"));
        }
        state.check_user_unique(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if !state.units.contains_key(&user.unit_id) {
            return Err(missing_reference("unit"));
        }
        state.check_user_unique(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_information_systems(&self) -> Result<Vec<InformationSystem>> {
        let state = self.state.read().await;
        Ok(sorted(
            state.information_systems.values().cloned().collect(),
            |s| s.name.clone(),
        ))
    }

    async fn get_information_system(&self, id: Uuid) -> Result<Option<InformationSystem>> {
        Ok(self.state.read().await.information_systems.get(&id).cloned())
    }

    async fn insert_information_system(&self, system: &InformationSystem) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_system_unique(system)?;
        state.information_systems.insert(system.id, system.clone());
        Ok(())
    }

    async fn update_information_system(&self, system: &InformationSystem) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.information_systems.contains_key(&system.id) {
            return Err(AppError::NotFound("Information system not found".to_string()));
        }
        state.check_system_unique(system)?;
        state.information_systems.insert(system.id, system.clone());
        Ok(())
    }

    async fn delete_information_system(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .accesses
            .values()
            .any(|a| a.information_system_id == id)
        {
            return Err(AppError::Blocked(
                "Information system still has accesses".to_string(),
            ));
        }
        state
            .information_systems
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Information system not found".to_string()))
    }

    async fn list_accesses(&self) -> Result<Vec<Access>> {
        let state = self.state.read().await;
        Ok(sorted(state.accesses.values().cloned().collect(), |a| {
            a.description.clone()
        }))
    }

    async fn get_access(&self, id: Uuid) -> Result<Option<Access>> {
        Ok(self.state.read().await.accesses.get(&id).cloned())
    }

    async fn children_of_access(&self, id: Uuid) -> Result<Vec<Access>> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .accesses
                .values()
                .filter(|a| a.parent_access_id == Some(id))
                .cloned()
                .collect(),
            |a| a.description.clone(),
        ))
    }

    async fn insert_access(&self, access: &Access) -> Result<()> {
        let mut state = self.state.write().await;
        if !state
            .information_systems
            .contains_key(&access.information_system_id)
        {
            return Err(missing_reference("information system"));
        }
        if let Some(parent_id) = access.parent_access_id {
            if !state.accesses.contains_key(&parent_id) {
                return Err(missing_reference("parent access"));
            }
        }
        state.check_access_unique(access)?;
        state.accesses.insert(access.id, access.clone());
        Ok(())
    }

    async fn update_access(&self, access: &Access) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.accesses.contains_key(&access.id) {
            return Err(AppError::NotFound("Access not found".to_string()));
        }
        state.check_access_unique(access)?;
        state.accesses.insert(access.id, access.clone());
        Ok(())
    }

    async fn delete_access(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .accesses
            .values()
            .any(|a| a.parent_access_id == Some(id))
        {
            return Err(AppError::Blocked("Access still has child accesses".to_string()));
        }
        if state.user_accesses.values().any(|ua| ua.access_id == id) {
            return Err(AppError::Blocked("Access is referenced by grants".to_string()));
        }
        state
            .accesses
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Access not found".to_string()))
    }

    async fn list_directives(&self) -> Result<Vec<Directive>> {
        let state = self.state.read().await;
        Ok(sorted(state.directives.values().cloned().collect(), |d| {
            d.name.clone()
        }))
    }

    async fn get_directive(&self, id: Uuid) -> Result<Option<Directive>> {
        Ok(self.state.read().await.directives.get(&id).cloned())
    }

    async fn insert_directive(&self, directive: &Directive) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_directive_unique(directive)?;
        state.directives.insert(directive.id, directive.clone());
        Ok(())
    }

    async fn update_directive(&self, directive: &Directive) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.directives.contains_key(&directive.id) {
            return Err(AppError::NotFound("Directive not found".to_string()));
        }
        state.check_directive_unique(directive)?;
        state.directives.insert(directive.id, directive.clone());
        Ok(())
    }

    async fn delete_directive(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .user_accesses
            .values()
            .any(|ua| ua.references_directive(id))
        {
            return Err(AppError::Blocked(
                "Directive is referenced by grants".to_string(),
            ));
        }
        state
            .directives
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Directive not found".to_string()))
    }

    async fn list_user_accesses(&self) -> Result<Vec<UserAccess>> {
        Ok(self
            .state
            .read()
            .await
            .user_accesses
            .values()
            .cloned()
            .collect())
    }

    async fn user_accesses_of_user(&self, user_id: Uuid) -> Result<Vec<UserAccess>> {
        let state = self.state.read().await;
        Ok(state
            .user_accesses
            .values()
            .filter(|ua| ua.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn user_accesses_of_access(&self, access_id: Uuid) -> Result<Vec<UserAccess>> {
        let state = self.state.read().await;
        Ok(state
            .user_accesses
            .values()
            .filter(|ua| ua.access_id == access_id)
            .cloned()
            .collect())
    }

    async fn get_user_access(
        &self,
        user_id: Uuid,
        access_id: Uuid,
    ) -> Result<Option<UserAccess>> {
        Ok(self
            .state
            .read()
            .await
            .user_accesses
            .get(&(user_id, access_id))
            .cloned())
    }

    async fn upsert_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess> {
        let mut state = self.state.write().await;
        let existing = state.user_accesses.get(&(user_id, access_id)).cloned();
        let row = apply_grant(existing, user_id, access_id, directive_id, at);
        state.user_accesses.insert(row.key(), row.clone());
        Ok(row)
    }

    async fn revoke_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess> {
        let mut state = self.state.write().await;
        let existing = state
            .user_accesses
            .get(&(user_id, access_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound("Grant not found".to_string()))?;
        let row = apply_revoke(existing, directive_id, at)?;
        state.user_accesses.insert(row.key(), row.clone());
        Ok(row)
    }

    async fn count_directive_references(&self, directive_id: Uuid) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .user_accesses
            .values()
            .filter(|ua| ua.references_directive(directive_id))
            .count() as i64)
    }

    async fn apply_cascade(&self, op: CascadeOp, plan: &CascadePlan) -> Result<()> {
        let mut state = self.state.write().await;
        match op {
            CascadeOp::SoftDelete(_) | CascadeOp::Restore => {
                let stamp = match op {
                    CascadeOp::SoftDelete(at) => Some(at),
                    _ => None,
                };
                for id in &plan.department_ids {
                    if let Some(d) = state.departments.get_mut(id) {
                        d.deleted_on = stamp;
                    }
                }
                for id in &plan.unit_ids {
                    if let Some(u) = state.units.get_mut(id) {
                        u.deleted_on = stamp;
                    }
                }
                for id in &plan.user_ids {
                    if let Some(u) = state.users.get_mut(id) {
                        u.deleted_on = stamp;
                    }
                }
                for key in &plan.unit_user_keys {
                    if let Some(uu) = state.unit_users.get_mut(key) {
                        uu.deleted_on = stamp;
                    }
                }
            }
            CascadeOp::HardDelete => {
                for key in &plan.user_access_keys {
                    state.user_accesses.remove(key);
                }
                for key in &plan.unit_user_keys {
                    state.unit_users.remove(key);
                }
                for id in &plan.user_ids {
                    state.users.remove(id);
                }
                for id in &plan.unit_ids {
                    state.units.remove(id);
                }
                for id in &plan.department_ids {
                    state.departments.remove(id);
                }
            }
        }
        Ok(())
    }

    async fn insert_log(&self, entry: &LogEntry) -> Result<()> {
        self.state.write().await.logs.push(entry.clone());
        Ok(())
    }

    async fn list_logs(&self, offset: i64, limit: i64) -> Result<(Vec<LogEntry>, i64)> {
        let state = self.state.read().await;
        let total = state.logs.len() as i64;
        let mut logs = state.logs.clone();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let items = logs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    async fn purge_logs(&self) -> Result<u64> {
        let mut state = self.state.write().await;
        let removed = state.logs.len() as u64;
        state.logs.clear();
        Ok(removed)
    }

    async fn reset(&self, keep_user_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let keep = state
            .users
            .get(&keep_user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let keep_unit = state.units.get(&keep.unit_id).cloned();

        state.user_accesses.clear();
        state.unit_users.clear();
        state.accesses.clear();
        state.information_systems.clear();
        state.directives.clear();
        state.users.retain(|id, _| *id == keep_user_id);
        state.units.retain(|id, _| *id == keep.unit_id);
        let keep_department = keep_unit.map(|u| u.department_id);
        state
            .departments
            .retain(|id, _| Some(*id) == keep_department);
        Ok(())
    }
}
