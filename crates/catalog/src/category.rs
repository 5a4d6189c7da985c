use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, CategoryId, DomainError, DomainResult, Entity, UserId};

use crate::path::{CategoryPath, validate_name};

/// A node of the product taxonomy.
///
/// Path, level and leaf flag are maintained by [`crate::CategoryHierarchy`];
/// a category is never re-parented or renamed on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    parent_category_id: Option<CategoryId>,
    category_path: CategoryPath,
    category_level: u32,
    display_order: i32,
    is_leaf: bool,
    audit: AuditStamp,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

pub(crate) fn validate_display_order(order: i32) -> DomainResult<i32> {
    if order < 0 {
        return Err(DomainError::validation("display order cannot be negative"));
    }
    Ok(order)
}

impl Category {
    pub(crate) fn new(
        id: CategoryId,
        name: &str,
        parent: Option<&Category>,
        display_order: i32,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = validate_name(name)?;
        let category_path = match parent {
            Some(parent) => parent.category_path.append(&name)?,
            None => CategoryPath::root(&name)?,
        };
        Ok(Self {
            id,
            name,
            parent_category_id: parent.map(|p| p.id),
            category_level: category_path.level(),
            category_path,
            display_order: validate_display_order(display_order)?,
            is_leaf: true,
            audit: AuditStamp::new(actor, now),
        })
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<CategoryId> {
        self.parent_category_id
    }

    pub fn path(&self) -> &CategoryPath {
        &self.category_path
    }

    pub fn level(&self) -> u32 {
        self.category_level
    }

    pub fn display_order(&self) -> i32 {
        self.display_order
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn is_root(&self) -> bool {
        self.parent_category_id.is_none()
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// Breadcrumb-style path for display, e.g. `Camping > Tents`.
    pub fn display_path(&self) -> String {
        self.category_path.segments().collect::<Vec<_>>().join(" > ")
    }

    /// Invariants linking name, path, level and parent.
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.category_level != self.category_path.level() {
            return Err(DomainError::invariant("category level does not match its path"));
        }
        if self.category_path.last_segment() != self.name {
            return Err(DomainError::invariant("category path does not end with its name"));
        }
        if self.category_path.is_root() != self.parent_category_id.is_none() {
            return Err(DomainError::invariant("root categories have no parent and vice versa"));
        }
        Ok(())
    }

    pub(crate) fn set_name(&mut self, name: String, path: CategoryPath) {
        self.name = name;
        self.category_path = path;
    }

    pub(crate) fn relocate(&mut self, parent: Option<CategoryId>, path: CategoryPath) {
        self.parent_category_id = parent;
        self.category_level = path.level();
        self.category_path = path;
    }

    pub(crate) fn set_path(&mut self, path: CategoryPath) {
        self.category_level = path.level();
        self.category_path = path;
    }

    pub(crate) fn set_display_order(&mut self, order: i32) {
        self.display_order = order;
    }

    pub(crate) fn set_leaf(&mut self, is_leaf: bool) {
        self.is_leaf = is_leaf;
    }

    pub(crate) fn audit_mut(&mut self) -> &mut AuditStamp {
        &mut self.audit
    }
}
