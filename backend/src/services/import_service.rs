//! Bulk CSV upload and full reset.
//!
//! Imports are line-oriented: a bad line is reported and skipped, the rest
//! of the file still applies. Both imports and the reset are reserved for
//! SuperAdmins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::department::Department;
use crate::models::information_system::InformationSystem;
use crate::models::log::LogAction;
use crate::models::unit::Unit;
use crate::models::user::User;
use crate::services::access_tree::PATH_SEPARATOR;
use crate::services::audit_service::AuditService;
use crate::services::validation;
use crate::services::visibility::CallerContext;
use crate::storage::Store;

/// One problem line of an upload
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportError {
    /// 1-based line number, header included
    pub line: usize,
    pub message: String,
}

/// Outcome of an upload
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    fn error(&mut self, line: usize, error: AppError) {
        self.errors.push(ImportError {
            line,
            message: error.to_string(),
        });
    }
}

#[derive(Debug, Deserialize)]
struct UserRow {
    username: String,
    first_name: String,
    last_name: String,
    department: String,
    unit: String,
    #[serde(default)]
    position: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessRow {
    information_system: String,
    path: String,
}

enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Import service
#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl ImportService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Upload users from `username,first_name,last_name,department,unit,position`.
    ///
    /// Missing departments and units are created. New users get no
    /// authority and no password; existing users have names, position and
    /// placement updated.
    pub async fn import_users(&self, caller: &CallerContext, data: &[u8]) -> Result<ImportReport> {
        caller.require_super_admin()?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data);
        let mut report = ImportReport::default();

        for (index, record) in rdr.deserialize::<UserRow>().enumerate() {
            let line = index + 2;
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    report.error(line, AppError::Csv(e));
                    continue;
                }
            };
            match self.upsert_user_row(row).await {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Unchanged) => report.skipped += 1,
                Err(e) => report.error(line, e),
            }
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "User import finished"
        );
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!(
                    "Imported users: {} created, {} updated, {} skipped, {} errors",
                    report.created,
                    report.updated,
                    report.skipped,
                    report.errors.len()
                ),
            )
            .await;
        Ok(report)
    }

    async fn find_or_create_department(&self, description: &str) -> Result<Department> {
        let description = validation::required_text("Department", description)?;
        let existing = self
            .store
            .list_departments()
            .await?
            .into_iter()
            .find(|d| d.description == description);
        match existing {
            Some(d) if d.is_deleted() => Err(AppError::Validation(format!(
                "Department '{}' is deleted",
                d.description
            ))),
            Some(d) => Ok(d),
            None => {
                let department = Department::new(description);
                self.store.insert_department(&department).await?;
                Ok(department)
            }
        }
    }

    async fn find_or_create_unit(&self, department: &Department, description: &str) -> Result<Unit> {
        let description = validation::required_text("Unit", description)?;
        let existing = self
            .store
            .units_of_department(department.id)
            .await?
            .into_iter()
            .find(|u| u.description == description);
        match existing {
            Some(u) if u.is_deleted() => Err(AppError::Validation(format!(
                "Unit '{}' is deleted",
                u.description
            ))),
            Some(u) => Ok(u),
            None => {
                let unit = Unit::new(department.id, description);
                self.store.insert_unit(&unit).await?;
                Ok(unit)
            }
        }
    }

    async fn upsert_user_row(&self, row: UserRow) -> Result<Outcome> {
        let username = validation::username(&row.username)?;
        let first_name = validation::required_text("First name", &row.first_name)?;
        let last_name = validation::required_text("Last name", &row.last_name)?;
        let position = validation::optional_text("Position", row.position.as_deref())?;
        let department = self.find_or_create_department(&row.department).await?;
        let unit = self.find_or_create_unit(&department, &row.unit).await?;

        match self.store.find_user_by_username(&username).await? {
            Some(existing) if existing.is_deleted() => Err(AppError::Validation(format!(
                "User '{}' is deleted",
                existing.username
            ))),
            Some(mut existing) => {
                let unchanged = existing.first_name == first_name
                    && existing.last_name == last_name
                    && existing.position == position
                    && existing.unit_id == unit.id;
                if unchanged {
                    return Ok(Outcome::Unchanged);
                }
                existing.first_name = first_name;
                existing.last_name = last_name;
                existing.position = position;
                existing.unit_id = unit.id;
                self.store.update_user(&existing).await?;
                Ok(Outcome::Updated)
            }
            None => {
                let mut user = User::new(username, first_name, last_name, unit.id);
                user.position = position;
                self.store.insert_user(&user).await?;
                Ok(Outcome::Created)
            }
        }
    }

    /// Upload access trees from `information_system,path` where the path is
    /// `Root -> Child -> Leaf`. Every missing node on the path is created.
    pub async fn import_accesses(&self, caller: &CallerContext, data: &[u8]) -> Result<ImportReport> {
        caller.require_super_admin()?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data);
        let mut report = ImportReport::default();

        for (index, record) in rdr.deserialize::<AccessRow>().enumerate() {
            let line = index + 2;
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    report.error(line, AppError::Csv(e));
                    continue;
                }
            };
            match self.create_access_path(row).await {
                Ok(0) => report.skipped += 1,
                Ok(n) => report.created += n,
                Err(e) => report.error(line, e),
            }
        }

        tracing::info!(
            created = report.created,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Access import finished"
        );
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!(
                    "Imported accesses: {} created, {} skipped, {} errors",
                    report.created,
                    report.skipped,
                    report.errors.len()
                ),
            )
            .await;
        Ok(report)
    }

    /// Create the system and missing path nodes; returns how many were created.
    async fn create_access_path(&self, row: AccessRow) -> Result<usize> {
        let name = validation::required_text("Information system", &row.information_system)?;
        let segments = row
            .path
            .split(PATH_SEPARATOR.trim())
            .map(|s| validation::required_text("Access", s))
            .collect::<Result<Vec<_>>>()?;

        let mut created = 0;
        let existing = self
            .store
            .list_information_systems()
            .await?
            .into_iter()
            .find(|s| s.name == name);
        let system = match existing {
            Some(system) => system,
            None => {
                let system = InformationSystem::new(name);
                self.store.insert_information_system(&system).await?;
                created += 1;
                system
            }
        };

        let accesses = self.store.list_accesses().await?;
        let mut parent: Option<Access> = None;
        for description in segments {
            let parent_id = parent.as_ref().map(|p| p.id);
            let found = accesses.iter().find(|a| {
                a.information_system_id == system.id
                    && a.parent_access_id == parent_id
                    && a.description == description
            });
            let node = match found {
                Some(a) => a.clone(),
                None => {
                    let access = match &parent {
                        Some(p) => Access::child_of(p, description),
                        None => Access::root(system.id, description),
                    };
                    self.store.insert_access(&access).await?;
                    created += 1;
                    access
                }
            };
            parent = Some(node);
        }
        Ok(created)
    }

    /// Remove every department, unit, user, catalog entry and grant except
    /// the caller, its placement unit and department. The audit log stays.
    pub async fn reset(&self, caller: &CallerContext) -> Result<()> {
        caller.require_super_admin()?;
        tracing::warn!(actor = %caller.username, "Resetting all data");
        self.store.reset(caller.user_id).await?;
        self.audit
            .record(caller, LogAction::HardDelete, "Reset all data")
            .await;
        Ok(())
    }
}
