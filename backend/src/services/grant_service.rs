//! Grant resolver.
//!
//! A `(user, access)` pair has at most one grant row. The row moves between
//! three states; the transitions are pure functions so that every store
//! backend applies them the same way inside its own critical section.
//!
//! ```text
//! NeverGranted --grant--> ActiveGrant --revoke--> Revoked
//!                              ^                     |
//!                              +-------grant---------+
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::directive::Directive;
use crate::models::log::LogAction;
use crate::models::user::User;
use crate::models::user_access::UserAccess;
use crate::services::access_tree::AccessTree;
use crate::services::audit_service::AuditService;
use crate::services::visibility::{CallerContext, Capability};
use crate::storage::Store;

/// Resolved state of a `(user, access)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GrantState {
    NeverGranted,
    ActiveGrant {
        directive_id: Uuid,
        granted_on: DateTime<Utc>,
    },
    Revoked {
        granted_by_directive_id: Uuid,
        revoked_by_directive_id: Uuid,
        revoked_on: DateTime<Utc>,
    },
}

impl GrantState {
    pub fn is_active(&self) -> bool {
        matches!(self, GrantState::ActiveGrant { .. })
    }
}

/// Map an optional grant row to its state.
pub fn resolve_grant_state(row: Option<&UserAccess>) -> Result<GrantState> {
    let Some(row) = row else {
        return Ok(GrantState::NeverGranted);
    };
    match (row.revoked_on, row.revoked_by_directive_id) {
        (None, _) => Ok(GrantState::ActiveGrant {
            directive_id: row.granted_by_directive_id,
            granted_on: row.granted_on,
        }),
        (Some(revoked_on), Some(revoked_by)) => Ok(GrantState::Revoked {
            granted_by_directive_id: row.granted_by_directive_id,
            revoked_by_directive_id: revoked_by,
            revoked_on,
        }),
        (Some(_), None) => Err(AppError::Internal(format!(
            "Grant of access {} to user {} is revoked without a directive",
            row.access_id, row.user_id
        ))),
    }
}

/// Grant transition: create the row, or reactivate it in place.
///
/// Reactivation replaces the granting directive and clears the revocation
/// but keeps the original `granted_on`.
pub fn apply_grant(
    existing: Option<UserAccess>,
    user_id: Uuid,
    access_id: Uuid,
    directive_id: Uuid,
    now: DateTime<Utc>,
) -> UserAccess {
    match existing {
        Some(mut row) => {
            row.granted_by_directive_id = directive_id;
            row.revoked_on = None;
            row.revoked_by_directive_id = None;
            row
        }
        None => UserAccess {
            user_id,
            access_id,
            granted_by_directive_id: directive_id,
            granted_on: now,
            revoked_on: None,
            revoked_by_directive_id: None,
        },
    }
}

/// Revoke transition; a row that is already revoked is left untouched.
pub fn apply_revoke(
    mut row: UserAccess,
    directive_id: Uuid,
    now: DateTime<Utc>,
) -> Result<UserAccess> {
    if row.revoked_on.is_some() {
        return Err(AppError::AlreadyRevoked(
            "Access has already been revoked".to_string(),
        ));
    }
    row.revoked_on = Some(now);
    row.revoked_by_directive_id = Some(directive_id);
    Ok(row)
}

/// A grant row joined with display names
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GrantView {
    pub user_id: Uuid,
    pub username: String,
    pub access_id: Uuid,
    pub information_system: String,
    /// `Root -> Child -> Leaf`
    pub access_path: String,
    pub active: bool,
    pub granted_by_directive: String,
    pub granted_on: DateTime<Utc>,
    pub revoked_by_directive: Option<String>,
    pub revoked_on: Option<DateTime<Utc>>,
}

/// Grant service
#[derive(Clone)]
pub struct GrantService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl GrantService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn load_access(&self, access_id: Uuid) -> Result<Access> {
        self.store
            .get_access(access_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Access not found".to_string()))
    }

    /// A directive that may justify a new grant or revocation
    async fn load_live_directive(&self, directive_id: Uuid) -> Result<Directive> {
        let directive = self
            .store
            .get_directive(directive_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Directive not found".to_string()))?;
        if directive.is_deleted() {
            return Err(AppError::Validation(format!(
                "Directive '{}' is deleted",
                directive.name
            )));
        }
        Ok(directive)
    }

    async fn writable_user(&self, caller: &CallerContext, user_id: Uuid) -> Result<User> {
        let user = self.load_user(user_id).await?;
        if user.is_deleted() {
            return Err(AppError::Validation(format!(
                "User '{}' is deleted",
                user.username
            )));
        }
        caller.require_user(Capability::Write, &user)?;
        Ok(user)
    }

    /// Full path description of an access
    pub async fn access_path(&self, access_id: Uuid) -> Result<String> {
        let tree = AccessTree::from_accesses(self.store.list_accesses().await?);
        tree.path(access_id)
    }

    /// Current state of the `(user, access)` pair
    pub async fn state(
        &self,
        caller: &CallerContext,
        user_id: Uuid,
        access_id: Uuid,
    ) -> Result<GrantState> {
        let user = self.load_user(user_id).await?;
        caller.require_user(Capability::Read, &user)?;
        self.load_access(access_id).await?;
        let row = self.store.get_user_access(user_id, access_id).await?;
        resolve_grant_state(row.as_ref())
    }

    /// Grant `access_id` to `user_id` under `directive_id`.
    pub async fn grant(
        &self,
        caller: &CallerContext,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
    ) -> Result<UserAccess> {
        let user = self.writable_user(caller, user_id).await?;
        self.load_access(access_id).await?;
        let directive = self.load_live_directive(directive_id).await?;
        let path = self.access_path(access_id).await?;

        let row = self
            .store
            .upsert_grant(user_id, access_id, directive_id, Utc::now())
            .await?;

        self.audit
            .record(
                caller,
                LogAction::Add,
                format!(
                    "Granted access '{}' to user '{}' by directive '{}'",
                    path, user.username, directive.name
                ),
            )
            .await;
        Ok(row)
    }

    /// Revoke the active grant of `access_id` from `user_id`.
    pub async fn revoke(
        &self,
        caller: &CallerContext,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
    ) -> Result<UserAccess> {
        let user = self.writable_user(caller, user_id).await?;
        self.load_access(access_id).await?;
        let directive = self.load_live_directive(directive_id).await?;
        let path = self.access_path(access_id).await?;

        let row = self
            .store
            .revoke_grant(user_id, access_id, directive_id, Utc::now())
            .await?;

        self.audit
            .record(
                caller,
                LogAction::Delete,
                format!(
                    "Revoked access '{}' from user '{}' by directive '{}'",
                    path, user.username, directive.name
                ),
            )
            .await;
        Ok(row)
    }

    /// Every grant row of a user, active first, then by access path.
    pub async fn grants_of_user(
        &self,
        caller: &CallerContext,
        user_id: Uuid,
    ) -> Result<Vec<GrantView>> {
        let user = self.load_user(user_id).await?;
        caller.require_user(Capability::Read, &user)?;
        let rows = self.store.user_accesses_of_user(user_id).await?;
        let mut views = self.enrich(rows, &[user]).await?;
        views.sort_by(|a, b| {
            b.active
                .cmp(&a.active)
                .then_with(|| a.access_path.cmp(&b.access_path))
        });
        Ok(views)
    }

    /// Every grant row on an access, for users the caller can read.
    pub async fn grants_of_access(
        &self,
        caller: &CallerContext,
        access_id: Uuid,
    ) -> Result<Vec<GrantView>> {
        self.load_access(access_id).await?;
        let users: Vec<User> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| caller.covers_user(Capability::Read, u))
            .collect();
        let rows = self.store.user_accesses_of_access(access_id).await?;
        let mut views = self.enrich(rows, &users).await?;
        views.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(views)
    }

    /// Join rows with user, system, path and directive names. Rows whose
    /// user is not in `users` are dropped.
    pub(crate) async fn enrich(
        &self,
        rows: Vec<UserAccess>,
        users: &[User],
    ) -> Result<Vec<GrantView>> {
        let tree = AccessTree::from_accesses(self.store.list_accesses().await?);
        let systems: HashMap<Uuid, String> = self
            .store
            .list_information_systems()
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        let directives: HashMap<Uuid, String> = self
            .store
            .list_directives()
            .await?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect();
        let usernames: HashMap<Uuid, &str> =
            users.iter().map(|u| (u.id, u.username.as_str())).collect();
        let directive_name = |id: Uuid| directives.get(&id).cloned().unwrap_or_default();

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(username) = usernames.get(&row.user_id) else {
                continue;
            };
            let access = tree
                .get(row.access_id)
                .ok_or_else(|| AppError::NotFound("Access not found".to_string()))?;
            views.push(GrantView {
                user_id: row.user_id,
                username: username.to_string(),
                access_id: row.access_id,
                information_system: systems
                    .get(&access.information_system_id)
                    .cloned()
                    .unwrap_or_default(),
                access_path: tree.path(row.access_id)?,
                active: row.is_active(),
                granted_by_directive: directive_name(row.granted_by_directive_id),
                granted_on: row.granted_on,
                revoked_by_directive: row.revoked_by_directive_id.map(directive_name),
                revoked_on: row.revoked_on,
            });
        }
        Ok(views)
    }
}
