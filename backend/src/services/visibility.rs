//! Visibility scoping.
//!
//! Pure predicates over the caller's authority levels and organizational
//! footprint. Every list the API returns is filtered through here.
//!
//! | Level        | Sees                                                  |
//! |--------------|-------------------------------------------------------|
//! | `None`       | nothing                                               |
//! | `Restricted` | units in the caller's unit grants, and what they hold |
//! | `Full`       | the whole non-deleted org tree                        |
//! | `SuperAdmin` | as `Full`, plus hard delete, log purge, import, reset |

use std::collections::{BTreeSet, HashSet};

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::department::Department;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::{AuthorityLevel, User};
use crate::storage::Store;

/// Which of the caller's two authority levels applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
}

/// The authenticated caller, threaded explicitly through every service call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub username: String,
    pub reading: AuthorityLevel,
    pub writing: AuthorityLevel,
    /// Units from the caller's non-deleted unit grants
    pub unit_ids: BTreeSet<Uuid>,
}

impl CallerContext {
    pub fn new(user: &User, unit_grants: &[UnitUser]) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            reading: user.reading_access,
            writing: user.writing_access,
            unit_ids: unit_grants
                .iter()
                .filter(|g| g.user_id == user.id && g.is_active())
                .map(|g| g.unit_id)
                .collect(),
        }
    }

    /// Resolve the caller's footprint through the store.
    pub async fn load(store: &dyn Store, user: &User) -> Result<Self> {
        let grants = store.unit_users_of_user(user.id).await?;
        Ok(Self::new(user, &grants))
    }

    pub fn level(&self, capability: Capability) -> AuthorityLevel {
        match capability {
            Capability::Read => self.reading,
            Capability::Write => self.writing,
        }
    }

    /// Whether `unit_id` lies inside the caller's scope for the capability.
    pub fn covers_unit(&self, capability: Capability, unit_id: Uuid) -> bool {
        match self.level(capability) {
            AuthorityLevel::None => false,
            AuthorityLevel::Restricted => self.unit_ids.contains(&unit_id),
            AuthorityLevel::Full | AuthorityLevel::SuperAdmin => true,
        }
    }

    /// Whether the caller may see or act on `user`, based on its placement.
    pub fn covers_user(&self, capability: Capability, user: &User) -> bool {
        self.covers_unit(capability, user.unit_id)
    }

    pub fn require_level(&self, capability: Capability, min: AuthorityLevel) -> Result<()> {
        if self.level(capability) >= min {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "{} access '{}' is required",
                match capability {
                    Capability::Read => "Reading",
                    Capability::Write => "Writing",
                },
                min.as_str()
            )))
        }
    }

    pub fn require_super_admin(&self) -> Result<()> {
        self.require_level(Capability::Write, AuthorityLevel::SuperAdmin)
    }

    pub fn require_unit(&self, capability: Capability, unit_id: Uuid) -> Result<()> {
        if self.covers_unit(capability, unit_id) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Unit is outside of your scope".to_string(),
            ))
        }
    }

    pub fn require_user(&self, capability: Capability, user: &User) -> Result<()> {
        if self.covers_user(capability, user) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "User '{}' is outside of your scope",
                user.username
            )))
        }
    }
}

/// Non-deleted units the caller may see or act on, sorted by description.
pub fn accessible_units(caller: &CallerContext, capability: Capability, units: &[Unit]) -> Vec<Unit> {
    let mut out: Vec<Unit> = units
        .iter()
        .filter(|u| !u.is_deleted() && caller.covers_unit(capability, u.id))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.description.cmp(&b.description));
    out
}

/// Non-deleted departments reachable through accessible units, or all of
/// them for `Full` and above.
pub fn accessible_departments(
    caller: &CallerContext,
    capability: Capability,
    departments: &[Department],
    units: &[Unit],
) -> Vec<Department> {
    let level = caller.level(capability);
    let reachable: HashSet<Uuid> = accessible_units(caller, capability, units)
        .into_iter()
        .map(|u| u.department_id)
        .collect();
    let mut out: Vec<Department> = departments
        .iter()
        .filter(|d| !d.is_deleted())
        .filter(|d| level.is_unscoped() || reachable.contains(&d.id))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.description.cmp(&b.description));
    out
}

/// Non-deleted users placed in accessible units; every non-deleted user
/// for `Full` and above.
pub fn accessible_users(
    caller: &CallerContext,
    capability: Capability,
    users: &[User],
    units: &[Unit],
) -> Vec<User> {
    let level = caller.level(capability);
    let unit_ids: HashSet<Uuid> = accessible_units(caller, capability, units)
        .into_iter()
        .map(|u| u.id)
        .collect();
    let mut out: Vec<User> = users
        .iter()
        .filter(|u| !u.is_deleted())
        .filter(|u| level.is_unscoped() || unit_ids.contains(&u.unit_id))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.username.cmp(&b.username));
    out
}

/// Units the caller could grant to the target: readable by the caller,
/// not deleted, and not already granted to the target.
pub fn inaccessible_units(
    caller: &CallerContext,
    target_grants: &[UnitUser],
    units: &[Unit],
) -> Vec<Unit> {
    let granted: HashSet<Uuid> = target_grants
        .iter()
        .filter(|g| g.is_active())
        .map(|g| g.unit_id)
        .collect();
    accessible_units(caller, Capability::Read, units)
        .into_iter()
        .filter(|u| !granted.contains(&u.id))
        .collect()
}

/// The access catalog is not org-scoped: any reading level above `None` sees it.
pub fn can_see_accesses(caller: &CallerContext) -> bool {
    caller.reading > AuthorityLevel::None
}

/// Whether the caller may edit `user`, its unit grants and its access grants.
pub fn can_write_user(caller: &CallerContext, user: &User) -> bool {
    !user.is_deleted() && caller.covers_user(Capability::Write, user)
}
