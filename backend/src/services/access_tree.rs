//! Arena over the access hierarchy.
//!
//! Accesses reference their parent by id. The tree is rebuilt per request
//! from the flat list the store returns; walks never follow live pointers,
//! so corrupted parent chains are reported instead of looping.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::access::Access;

/// Separator between ancestor descriptions in an access path
pub const PATH_SEPARATOR: &str = " -> ";

/// One access in depth-first order, with its depth below the system root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode<'a> {
    pub access: &'a Access,
    pub depth: usize,
}

/// Access arena keyed by id
#[derive(Debug, Default, Clone)]
pub struct AccessTree {
    nodes: HashMap<Uuid, Access>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl AccessTree {
    pub fn from_accesses(accesses: impl IntoIterator<Item = Access>) -> Self {
        let nodes: HashMap<Uuid, Access> = accesses.into_iter().map(|a| (a.id, a)).collect();
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for access in nodes.values() {
            if let Some(parent_id) = access.parent_access_id {
                children.entry(parent_id).or_default().push(access.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort_by(|a, b| nodes[a].description.cmp(&nodes[b].description));
        }
        Self { nodes, children }
    }

    pub fn get(&self, id: Uuid) -> Option<&Access> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ancestors of `id` from the root down, the access itself last.
    pub fn lineage(&self, id: Uuid) -> Result<Vec<&Access>> {
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            if !visited.insert(current_id) {
                let start = self
                    .nodes
                    .get(&id)
                    .map(|a| a.description.as_str())
                    .unwrap_or("?");
                return Err(AppError::CycleDetected(format!(
                    "Parent chain of access '{}' revisits access {}",
                    start, current_id
                )));
            }
            let access = self.nodes.get(&current_id).ok_or_else(|| {
                if current_id == id {
                    AppError::NotFound("Access not found".to_string())
                } else {
                    AppError::NotFound(format!("Parent access {} not found", current_id))
                }
            })?;
            chain.push(access);
            current = access.parent_access_id;
        }

        chain.reverse();
        Ok(chain)
    }

    /// Full path description: ancestor descriptions joined root-first with `" -> "`.
    pub fn path(&self, id: Uuid) -> Result<String> {
        Ok(self
            .lineage(id)?
            .iter()
            .map(|a| a.description.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR))
    }

    /// Direct children sorted by description
    pub fn children(&self, id: Uuid) -> Vec<&Access> {
        self.children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// Root accesses of an information system sorted by description
    pub fn roots_of(&self, information_system_id: Uuid) -> Vec<&Access> {
        let mut roots: Vec<&Access> = self
            .nodes
            .values()
            .filter(|a| a.information_system_id == information_system_id && a.is_root())
            .collect();
        roots.sort_by(|a, b| a.description.cmp(&b.description));
        roots
    }

    /// All accesses of a system in depth-first order, children after their parent.
    pub fn depth_first(&self, information_system_id: Uuid) -> Vec<TreeNode<'_>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for root in self.roots_of(information_system_id) {
            self.walk(root, 0, &mut visited, &mut out);
        }
        out
    }

    fn walk<'a>(
        &'a self,
        access: &'a Access,
        depth: usize,
        visited: &mut HashSet<Uuid>,
        out: &mut Vec<TreeNode<'a>>,
    ) {
        if !visited.insert(access.id) {
            tracing::warn!(access_id = %access.id, "Access visited twice during tree walk");
            return;
        }
        out.push(TreeNode { access, depth });
        for child in self.children(access.id) {
            self.walk(child, depth + 1, visited, out);
        }
    }

    /// True when `candidate` is `id` or one of its descendants.
    pub fn is_descendant_or_self(&self, id: Uuid, candidate: Uuid) -> bool {
        let mut stack = vec![id];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == candidate {
                return true;
            }
            if visited.insert(current) {
                if let Some(ids) = self.children.get(&current) {
                    stack.extend(ids.iter().copied());
                }
            }
        }
        false
    }
}
