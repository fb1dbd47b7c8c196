//! Material category hierarchy.
//!
//! Categories reference their parent by id only. [`CategoryIndex`] keeps the
//! nodes in a flat map keyed by id plus a derived child adjacency list, and
//! answers tree questions by walking parent ids. Re-parenting is checked with
//! an explicit ancestor walk before anything changes.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::MaterialCategory;
use crate::validation::{Violation, Violations};

pub const CATEGORY_CYCLE: &str = "CategoryCycle";
pub const MAX_DEPTH_EXCEEDED: &str = "MaxDepthExceeded";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Category {0} is not in the tree")]
    UnknownCategory(Uuid),

    #[error("Parent category {0} is not in the tree")]
    UnknownParent(Uuid),

    #[error("Category {0} is already in the tree")]
    DuplicateCategory(Uuid),

    #[error("Moving category {category_id} under {parent_id} would create a cycle")]
    CategoryCycle { category_id: Uuid, parent_id: Uuid },

    #[error("Category depth {depth} exceeds the maximum of {max}")]
    MaxDepthExceeded { depth: usize, max: usize },

    #[error("Category {0} still has child categories")]
    HasChildren(Uuid),
}

impl From<TreeError> for ServiceError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::UnknownCategory(id) | TreeError::UnknownParent(id) => {
                ServiceError::not_found("MaterialCategory", id)
            }
            TreeError::CategoryCycle { .. } => ServiceError::Validation(Violations::from(vec![
                Violation::new("parent_id", CATEGORY_CYCLE, err.to_string()),
            ])),
            TreeError::MaxDepthExceeded { .. } => ServiceError::Validation(Violations::from(vec![
                Violation::new("parent_id", MAX_DEPTH_EXCEEDED, err.to_string()),
            ])),
            TreeError::DuplicateCategory(_) | TreeError::HasChildren(_) => {
                ServiceError::Conflict(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: Uuid,
    pub code: String,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
}

impl From<&MaterialCategory> for CategoryNode {
    fn from(category: &MaterialCategory) -> Self {
        Self {
            id: category.id,
            code: category.code.clone(),
            parent_id: category.parent_id,
            is_active: category.is_active,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    nodes: HashMap<Uuid, CategoryNode>,
    children: HashMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from stored categories, skipping soft-deleted ones.
    /// Fails on dangling parents and on parent chains that loop.
    pub fn from_categories<'a, I>(categories: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = &'a MaterialCategory>,
    {
        let mut index = Self::new();
        for category in categories.into_iter().filter(|c| !c.audit.is_deleted) {
            if index.nodes.contains_key(&category.id) {
                return Err(TreeError::DuplicateCategory(category.id));
            }
            index.nodes.insert(category.id, CategoryNode::from(category));
        }

        let ids: Vec<Uuid> = index.nodes.keys().copied().collect();
        for id in &ids {
            if let Some(parent_id) = index.nodes[id].parent_id {
                if !index.nodes.contains_key(&parent_id) {
                    return Err(TreeError::UnknownParent(parent_id));
                }
            }
        }
        for id in &ids {
            index.ancestors(*id)?;
        }

        index.rebuild_adjacency();
        Ok(index)
    }

    fn rebuild_adjacency(&mut self) {
        self.children.clear();
        self.roots.clear();
        for node in self.nodes.values() {
            match node.parent_id {
                Some(parent_id) => self.children.entry(parent_id).or_default().push(node.id),
                None => self.roots.push(node.id),
            }
        }
        let nodes = &self.nodes;
        let by_code = |a: &Uuid, b: &Uuid| nodes[a].code.cmp(&nodes[b].code);
        self.roots.sort_by(by_code);
        for siblings in self.children.values_mut() {
            siblings.sort_by(by_code);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&CategoryNode> {
        self.nodes.get(&id)
    }

    /// Root categories ordered by code.
    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    /// Direct children ordered by code.
    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn node(&self, id: Uuid) -> Result<&CategoryNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::UnknownCategory(id))
    }

    /// Parent chain from the direct parent up to the root.
    pub fn ancestors(&self, id: Uuid) -> Result<Vec<Uuid>, TreeError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.node(id)?.parent_id;

        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                return Err(TreeError::CategoryCycle {
                    category_id: id,
                    parent_id,
                });
            }
            chain.push(parent_id);
            current = self
                .nodes
                .get(&parent_id)
                .ok_or(TreeError::UnknownParent(parent_id))?
                .parent_id;
        }
        Ok(chain)
    }

    /// Every category below `id`, breadth first.
    pub fn descendants(&self, id: Uuid) -> Result<Vec<Uuid>, TreeError> {
        self.node(id)?;
        let mut found = Vec::new();
        let mut queue: VecDeque<Uuid> = self.children(id).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            found.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        Ok(found)
    }

    /// Roots are at depth 0.
    pub fn depth(&self, id: Uuid) -> Result<usize, TreeError> {
        Ok(self.ancestors(id)?.len())
    }

    /// Levels below `id` in its subtree; a leaf has height 0.
    pub fn height(&self, id: Uuid) -> Result<usize, TreeError> {
        self.node(id)?;
        Ok(self
            .children(id)
            .iter()
            .map(|child| self.height(*child).map(|h| h + 1).unwrap_or(0))
            .max()
            .unwrap_or(0))
    }

    /// Codes from the root down to `id`.
    pub fn path(&self, id: Uuid) -> Result<Vec<String>, TreeError> {
        let mut path = Vec::new();
        for ancestor in self.ancestors(id)?.into_iter().rev() {
            path.push(self.node(ancestor)?.code.clone());
        }
        path.push(self.node(id)?.code.clone());
        Ok(path)
    }

    pub fn would_create_cycle(&self, id: Uuid, new_parent_id: Uuid) -> Result<bool, TreeError> {
        if id == new_parent_id {
            return Ok(true);
        }
        Ok(self.ancestors(new_parent_id)?.contains(&id))
    }

    /// Adds a new category as a leaf.
    pub fn insert(&mut self, node: CategoryNode, max_depth: usize) -> Result<(), TreeError> {
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::DuplicateCategory(node.id));
        }
        let depth = match node.parent_id {
            Some(parent_id) if parent_id == node.id => {
                return Err(TreeError::CategoryCycle {
                    category_id: node.id,
                    parent_id,
                })
            }
            Some(parent_id) => {
                if !self.nodes.contains_key(&parent_id) {
                    return Err(TreeError::UnknownParent(parent_id));
                }
                self.depth(parent_id)? + 1
            }
            None => 0,
        };
        if depth > max_depth {
            return Err(TreeError::MaxDepthExceeded {
                depth,
                max: max_depth,
            });
        }

        self.nodes.insert(node.id, node);
        self.rebuild_adjacency();
        Ok(())
    }

    /// Moves `id` (with its subtree) under `new_parent_id`, or to the root
    /// level when `None`. Nothing changes on error.
    pub fn reparent(
        &mut self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        max_depth: usize,
    ) -> Result<(), TreeError> {
        self.node(id)?;
        let new_depth = match new_parent_id {
            Some(parent_id) => {
                if !self.nodes.contains_key(&parent_id) {
                    return Err(TreeError::UnknownParent(parent_id));
                }
                if self.would_create_cycle(id, parent_id)? {
                    return Err(TreeError::CategoryCycle {
                        category_id: id,
                        parent_id,
                    });
                }
                self.depth(parent_id)? + 1
            }
            None => 0,
        };

        let deepest = new_depth + self.height(id)?;
        if deepest > max_depth {
            return Err(TreeError::MaxDepthExceeded {
                depth: deepest,
                max: max_depth,
            });
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent_id = new_parent_id;
        }
        self.rebuild_adjacency();
        Ok(())
    }

    /// Removes a leaf category.
    pub fn remove(&mut self, id: Uuid) -> Result<CategoryNode, TreeError> {
        if !self.children(id).is_empty() {
            return Err(TreeError::HasChildren(id));
        }
        let node = self.nodes.remove(&id).ok_or(TreeError::UnknownCategory(id))?;
        self.rebuild_adjacency();
        Ok(node)
    }
}
