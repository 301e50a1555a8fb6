//! Access catalog service.
//!
//! Information systems, their access trees and the directive ledger. None
//! of these are org-scoped: any caller with a reading level may browse
//! them, and changes require writing `Full`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::directive::Directive;
use crate::models::information_system::InformationSystem;
use crate::models::log::LogAction;
use crate::models::user::AuthorityLevel;
use crate::services::access_tree::{AccessTree, PATH_SEPARATOR};
use crate::services::audit_service::AuditService;
use crate::services::directory_service::ListFilter;
use crate::services::validation;
use crate::services::visibility::{self, CallerContext, Capability};
use crate::storage::Store;

/// An access with its resolved path
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessView {
    pub id: Uuid,
    pub description: String,
    pub information_system_id: Uuid,
    pub information_system: String,
    pub parent_access_id: Option<Uuid>,
    /// `Root -> Child -> Leaf`
    pub path: String,
    /// 0 for roots
    pub depth: usize,
}

/// Request to create an access
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAccessRequest {
    pub information_system_id: Uuid,
    pub parent_access_id: Option<Uuid>,
    pub description: String,
}

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    fn require_reader(caller: &CallerContext) -> Result<()> {
        if visibility::can_see_accesses(caller) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "A reading level is required to browse the catalog".to_string(),
            ))
        }
    }

    fn require_editor(caller: &CallerContext) -> Result<()> {
        caller.require_level(Capability::Write, AuthorityLevel::Full)
    }

    async fn load_system(&self, id: Uuid) -> Result<InformationSystem> {
        self.store
            .get_information_system(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Information system not found".to_string()))
    }

    async fn load_access(&self, id: Uuid) -> Result<Access> {
        self.store
            .get_access(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Access not found".to_string()))
    }

    async fn load_directive(&self, id: Uuid) -> Result<Directive> {
        self.store
            .get_directive(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Directive not found".to_string()))
    }

    async fn tree(&self) -> Result<AccessTree> {
        Ok(AccessTree::from_accesses(self.store.list_accesses().await?))
    }

    async fn system_names(&self) -> Result<HashMap<Uuid, String>> {
        Ok(self
            .store
            .list_information_systems()
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect())
    }

    fn view(
        tree: &AccessTree,
        systems: &HashMap<Uuid, String>,
        access: &Access,
    ) -> Result<AccessView> {
        let lineage = tree.lineage(access.id)?;
        let path = lineage
            .iter()
            .map(|a| a.description.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR);
        Ok(AccessView {
            id: access.id,
            description: access.description.clone(),
            information_system_id: access.information_system_id,
            information_system: systems
                .get(&access.information_system_id)
                .cloned()
                .unwrap_or_default(),
            parent_access_id: access.parent_access_id,
            path,
            depth: lineage.len() - 1,
        })
    }

    // ---------------------------------------------------------------------
    // Information systems
    // ---------------------------------------------------------------------

    pub async fn list_information_systems(
        &self,
        caller: &CallerContext,
    ) -> Result<Vec<InformationSystem>> {
        Self::require_reader(caller)?;
        self.store.list_information_systems().await
    }

    pub async fn get_information_system(
        &self,
        caller: &CallerContext,
        id: Uuid,
    ) -> Result<InformationSystem> {
        Self::require_reader(caller)?;
        self.load_system(id).await
    }

    pub async fn create_information_system(
        &self,
        caller: &CallerContext,
        name: &str,
    ) -> Result<InformationSystem> {
        Self::require_editor(caller)?;
        let system = InformationSystem::new(validation::required_text("Name", name)?);
        self.store.insert_information_system(&system).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!("Added information system '{}'", system.name),
            )
            .await;
        Ok(system)
    }

    pub async fn rename_information_system(
        &self,
        caller: &CallerContext,
        id: Uuid,
        name: &str,
    ) -> Result<InformationSystem> {
        Self::require_editor(caller)?;
        let mut system = self.load_system(id).await?;
        let old = std::mem::replace(&mut system.name, validation::required_text("Name", name)?);
        self.store.update_information_system(&system).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!("Renamed information system '{}' to '{}'", old, system.name),
            )
            .await;
        Ok(system)
    }

    /// Blocked while the system still owns accesses
    pub async fn delete_information_system(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        Self::require_editor(caller)?;
        let system = self.load_system(id).await?;
        self.store.delete_information_system(id).await?;
        self.audit
            .record(
                caller,
                LogAction::HardDelete,
                format!("Deleted information system '{}'", system.name),
            )
            .await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Accesses
    // ---------------------------------------------------------------------

    /// Accesses with full paths, in depth-first order per system (systems by
    /// name). `system_id` narrows to one tree; the filter matches paths.
    pub async fn list_accesses(
        &self,
        caller: &CallerContext,
        system_id: Option<Uuid>,
        filter: &ListFilter,
    ) -> Result<Vec<AccessView>> {
        Self::require_reader(caller)?;
        let tree = self.tree().await?;
        let systems = self.store.list_information_systems().await?;
        let names: HashMap<Uuid, String> =
            systems.iter().map(|s| (s.id, s.name.clone())).collect();
        let needle = filter.needle();

        let mut out = Vec::new();
        for system in systems
            .iter()
            .filter(|s| system_id.map_or(true, |id| id == s.id))
        {
            for node in tree.depth_first(system.id) {
                let view = Self::view(&tree, &names, node.access)?;
                if needle
                    .as_ref()
                    .map_or(true, |n| view.path.to_lowercase().contains(n))
                {
                    out.push(view);
                }
            }
        }
        Ok(out)
    }

    pub async fn get_access(&self, caller: &CallerContext, id: Uuid) -> Result<AccessView> {
        Self::require_reader(caller)?;
        let tree = self.tree().await?;
        let access = tree
            .get(id)
            .ok_or_else(|| AppError::NotFound("Access not found".to_string()))?;
        Self::view(&tree, &self.system_names().await?, access)
    }

    pub async fn children_of_access(&self, caller: &CallerContext, id: Uuid) -> Result<Vec<AccessView>> {
        Self::require_reader(caller)?;
        let tree = self.tree().await?;
        if tree.get(id).is_none() {
            return Err(AppError::NotFound("Access not found".to_string()));
        }
        let names = self.system_names().await?;
        tree.children(id)
            .into_iter()
            .map(|child| Self::view(&tree, &names, child))
            .collect()
    }

    pub async fn create_access(
        &self,
        caller: &CallerContext,
        req: CreateAccessRequest,
    ) -> Result<AccessView> {
        Self::require_editor(caller)?;
        let system = self.load_system(req.information_system_id).await?;
        let description = validation::required_text("Description", &req.description)?;
        let access = match req.parent_access_id {
            None => Access::root(system.id, description),
            Some(parent_id) => {
                let parent = self.load_access(parent_id).await?;
                if parent.information_system_id != system.id {
                    return Err(AppError::Validation(
                        "Parent access belongs to a different information system".to_string(),
                    ));
                }
                Access::child_of(&parent, description)
            }
        };
        self.store.insert_access(&access).await?;

        let view = self.get_access(caller, access.id).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!("Added access '{}' to '{}'", view.path, system.name),
            )
            .await;
        Ok(view)
    }

    pub async fn rename_access(
        &self,
        caller: &CallerContext,
        id: Uuid,
        description: &str,
    ) -> Result<AccessView> {
        Self::require_editor(caller)?;
        let mut access = self.load_access(id).await?;
        let old = std::mem::replace(
            &mut access.description,
            validation::required_text("Description", description)?,
        );
        self.store.update_access(&access).await?;
        let view = self.get_access(caller, id).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!("Renamed access '{}' to '{}'", old, view.path),
            )
            .await;
        Ok(view)
    }

    /// Re-parent an access within its system; `None` makes it a root.
    pub async fn move_access(
        &self,
        caller: &CallerContext,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<AccessView> {
        Self::require_editor(caller)?;
        let tree = self.tree().await?;
        let mut access = tree
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Access not found".to_string()))?;
        let old_path = tree.path(id)?;

        if let Some(parent_id) = new_parent_id {
            let parent = tree
                .get(parent_id)
                .ok_or_else(|| AppError::NotFound("Parent access not found".to_string()))?;
            if parent.information_system_id != access.information_system_id {
                return Err(AppError::Validation(
                    "Parent access belongs to a different information system".to_string(),
                ));
            }
            if tree.is_descendant_or_self(id, parent_id) {
                return Err(AppError::CycleDetected(format!(
                    "'{}' cannot be placed under itself or one of its descendants",
                    access.description
                )));
            }
        }
        access.parent_access_id = new_parent_id;
        self.store.update_access(&access).await?;

        let view = self.get_access(caller, id).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!("Moved access '{}' to '{}'", old_path, view.path),
            )
            .await;
        Ok(view)
    }

    /// Blocked while the access has children or grant rows
    pub async fn delete_access(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        Self::require_editor(caller)?;
        let path = self.tree().await?.path(id)?;
        self.store.delete_access(id).await?;
        self.audit
            .record(
                caller,
                LogAction::HardDelete,
                format!("Deleted access '{}'", path),
            )
            .await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Directives
    // ---------------------------------------------------------------------

    pub async fn list_directives(
        &self,
        caller: &CallerContext,
        filter: &ListFilter,
    ) -> Result<Vec<Directive>> {
        Self::require_reader(caller)?;
        if filter.include_deleted {
            caller.require_level(Capability::Read, AuthorityLevel::Full)?;
        }
        let needle = filter.needle();
        Ok(self
            .store
            .list_directives()
            .await?
            .into_iter()
            .filter(|d| filter.include_deleted || !d.is_deleted())
            .filter(|d| {
                needle
                    .as_ref()
                    .map_or(true, |n| d.name.to_lowercase().contains(n))
            })
            .collect())
    }

    pub async fn get_directive(&self, caller: &CallerContext, id: Uuid) -> Result<Directive> {
        Self::require_reader(caller)?;
        self.load_directive(id).await
    }

    pub async fn create_directive(&self, caller: &CallerContext, name: &str) -> Result<Directive> {
        Self::require_editor(caller)?;
        let directive = Directive::new(validation::required_text("Name", name)?);
        self.store.insert_directive(&directive).await?;
        self.audit
            .record(
                caller,
                LogAction::Add,
                format!("Added directive '{}'", directive.name),
            )
            .await;
        Ok(directive)
    }

    pub async fn rename_directive(
        &self,
        caller: &CallerContext,
        id: Uuid,
        name: &str,
    ) -> Result<Directive> {
        Self::require_editor(caller)?;
        let mut directive = self.load_directive(id).await?;
        let old = std::mem::replace(&mut directive.name, validation::required_text("Name", name)?);
        self.store.update_directive(&directive).await?;
        self.audit
            .record(
                caller,
                LogAction::Edit,
                format!("Renamed directive '{}' to '{}'", old, directive.name),
            )
            .await;
        Ok(directive)
    }

    /// Soft delete; existing grants keep referring to the directive.
    pub async fn delete_directive(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        Self::require_editor(caller)?;
        let mut directive = self.load_directive(id).await?;
        if directive.is_deleted() {
            return Err(AppError::Validation("Directive is already deleted".to_string()));
        }
        directive.deleted_on = Some(Utc::now());
        self.store.update_directive(&directive).await?;
        self.audit
            .record(
                caller,
                LogAction::Delete,
                format!("Deleted directive '{}'", directive.name),
            )
            .await;
        Ok(())
    }

    pub async fn restore_directive(&self, caller: &CallerContext, id: Uuid) -> Result<Directive> {
        Self::require_editor(caller)?;
        let mut directive = self.load_directive(id).await?;
        if !directive.is_deleted() {
            return Err(AppError::Validation("Directive is not deleted".to_string()));
        }
        directive.deleted_on = None;
        self.store.update_directive(&directive).await?;
        self.audit
            .record(
                caller,
                LogAction::Restore,
                format!("Restored directive '{}'", directive.name),
            )
            .await;
        Ok(directive)
    }

    /// Physically remove a directive no grant refers to.
    pub async fn hard_delete_directive(&self, caller: &CallerContext, id: Uuid) -> Result<()> {
        caller.require_super_admin()?;
        let directive = self.load_directive(id).await?;
        let references = self.store.count_directive_references(id).await?;
        if references > 0 {
            return Err(AppError::Blocked(format!(
                "Directive '{}' is referenced by {} access grants",
                directive.name, references
            )));
        }
        self.store.delete_directive(id).await?;
        self.audit
            .record(
                caller,
                LogAction::HardDelete,
                format!("Permanently deleted directive '{}'", directive.name),
            )
            .await;
        Ok(())
    }
}
