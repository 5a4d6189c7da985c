//! Category tree operations over an in-memory snapshot.
//!
//! The hierarchy owns every category while an operation runs. Mutations
//! validate first, then apply, and return the categories whose stored form
//! changed so the caller can persist them in one write.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{CategoryId, DomainError, DomainResult, Entity, UserId};

use crate::category::{Category, validate_display_order};
use crate::path::{CategoryPath, validate_name};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    Activate,
    Deactivate,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkError {
    pub id: CategoryId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BulkError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryExportRow {
    pub name: String,
    pub path: String,
    pub level: u32,
    pub parent_path: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryImportRow {
    pub name: String,
    #[serde(default)]
    pub parent_path: Option<String>,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based position in the submitted rows.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckedOperation {
    Delete,
    Move,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationCheck {
    pub valid: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistics {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub roots: usize,
    pub leaves: usize,
    pub max_depth: u32,
    /// Mean number of active children over active non-leaf categories.
    pub average_children: f64,
    /// Active categories referenced by at least one item.
    pub categories_with_items: usize,
    /// `total` minus `categories_with_items`.
    pub categories_without_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTreeNode {
    pub id: CategoryId,
    pub name: String,
    pub path: String,
    pub level: u32,
    pub display_order: i32,
    pub is_active: bool,
    pub is_leaf: bool,
    pub children: Vec<CategoryTreeNode>,
}

/// Result of a multi-category operation that may partially succeed.
#[derive(Debug, Clone)]
pub struct Outcome<R> {
    pub report: R,
    pub changed: Vec<Category>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryHierarchy {
    nodes: HashMap<CategoryId, Category>,
}

fn sibling_order(a: &&Category, b: &&Category) -> core::cmp::Ordering {
    a.display_order()
        .cmp(&b.display_order())
        .then_with(|| a.name().cmp(b.name()))
}

impl CategoryHierarchy {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            nodes: categories.into_iter().map(|c| (c.id_typed(), c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.nodes.values()
    }

    // ── reads ───────────────────────────────────────────────────────────────

    /// Any category, including soft-deleted ones.
    pub fn get(&self, id: CategoryId) -> DomainResult<&Category> {
        self.nodes
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("category {id}")))
    }

    fn active(&self, id: CategoryId) -> DomainResult<&Category> {
        self.get(id)
            .ok()
            .filter(|c| c.is_active())
            .ok_or_else(|| DomainError::not_found(format!("category {id}")))
    }

    /// Lookup by materialized path; an active match wins over a deleted one.
    pub fn by_path(&self, path: &CategoryPath) -> Option<&Category> {
        let mut matches = self.nodes.values().filter(|c| c.path() == path);
        let first = matches.next()?;
        if first.is_active() {
            return Some(first);
        }
        matches.find(|c| c.is_active()).or(Some(first))
    }

    /// Active children of `parent` (`None` = roots), ordered for display.
    pub fn children(&self, parent: Option<CategoryId>) -> Vec<&Category> {
        let mut children: Vec<&Category> = self
            .nodes
            .values()
            .filter(|c| c.is_active() && c.parent_id() == parent)
            .collect();
        children.sort_by(sibling_order);
        children
    }

    pub fn roots(&self) -> Vec<&Category> {
        self.children(None)
    }

    pub fn leaves(&self) -> Vec<&Category> {
        let mut leaves: Vec<&Category> = self
            .nodes
            .values()
            .filter(|c| c.is_active() && c.is_leaf())
            .collect();
        leaves.sort_by(|a, b| a.path().cmp(b.path()));
        leaves
    }

    /// Case-insensitive match on name or path over active categories.
    pub fn search(&self, term: &str) -> DomainResult<Vec<&Category>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(DomainError::validation("search term cannot be empty"));
        }
        let mut found: Vec<&Category> = self
            .nodes
            .values()
            .filter(|c| {
                c.is_active()
                    && (c.name().to_lowercase().contains(&term)
                        || c.path().as_str().to_lowercase().contains(&term))
            })
            .collect();
        found.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(found)
    }

    /// Breadcrumb from the root down to `id` (inclusive).
    pub fn ancestors(&self, id: CategoryId) -> DomainResult<Vec<&Category>> {
        let mut chain = vec![self.get(id)?];
        let mut cursor = chain[0].parent_id();
        while let Some(parent_id) = cursor {
            if chain.len() > self.nodes.len() {
                return Err(DomainError::invariant("category hierarchy contains a cycle"));
            }
            let parent = self.get(parent_id)?;
            chain.push(parent);
            cursor = parent.parent_id();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every node beneath `id` regardless of status, nearest first.
    pub fn descendants(&self, id: CategoryId) -> Vec<&Category> {
        self.subtree_ids(id)
            .into_iter()
            .skip(1)
            .filter_map(|d| self.nodes.get(&d))
            .collect()
    }

    pub fn tree(&self, include_inactive: bool) -> Vec<CategoryTreeNode> {
        self.tree_level(None, include_inactive)
    }

    fn tree_level(&self, parent: Option<CategoryId>, include_inactive: bool) -> Vec<CategoryTreeNode> {
        let mut level: Vec<&Category> = self
            .nodes
            .values()
            .filter(|c| c.parent_id() == parent && (include_inactive || c.is_active()))
            .collect();
        level.sort_by(sibling_order);
        level
            .into_iter()
            .map(|c| CategoryTreeNode {
                id: c.id_typed(),
                name: c.name().to_string(),
                path: c.path().to_string(),
                level: c.level(),
                display_order: c.display_order(),
                is_active: c.is_active(),
                is_leaf: c.is_leaf(),
                children: self.tree_level(Some(c.id_typed()), include_inactive),
            })
            .collect()
    }

    /// `item_counts` maps a category to the number of items referencing it.
    pub fn statistics(&self, item_counts: &HashMap<CategoryId, usize>) -> CategoryStatistics {
        let active: Vec<&Category> = self.nodes.values().filter(|c| c.is_active()).collect();
        let parents: Vec<&Category> = active.iter().copied().filter(|c| !c.is_leaf()).collect();
        let child_total: usize = parents
            .iter()
            .map(|p| active.iter().filter(|c| c.parent_id() == Some(p.id_typed())).count())
            .sum();
        let average_children = if parents.is_empty() {
            0.0
        } else {
            let avg = child_total as f64 / parents.len() as f64;
            (avg * 100.0).round() / 100.0
        };
        let categories_with_items = active
            .iter()
            .filter(|c| item_counts.get(&c.id_typed()).is_some_and(|n| *n > 0))
            .count();

        CategoryStatistics {
            total: self.nodes.len(),
            active: active.len(),
            inactive: self.nodes.len() - active.len(),
            roots: active.iter().filter(|c| c.is_root()).count(),
            leaves: active.iter().filter(|c| c.is_leaf()).count(),
            max_depth: active.iter().map(|c| c.level()).max().unwrap_or(0),
            average_children,
            categories_with_items,
            categories_without_items: self.nodes.len() - categories_with_items,
        }
    }

    pub fn export(&self) -> Vec<CategoryExportRow> {
        let mut all: Vec<&Category> = self.nodes.values().collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all.into_iter()
            .map(|c| CategoryExportRow {
                name: c.name().to_string(),
                path: c.path().to_string(),
                level: c.level(),
                parent_path: c.path().parent_path().map(|p| p.to_string()),
                display_order: c.display_order(),
                is_active: c.is_active(),
            })
            .collect()
    }

    /// Dry-run check of an operation. `item_count` is the number of items
    /// referencing the category.
    pub fn validate_operation(&self, id: CategoryId, op: CheckedOperation, item_count: usize) -> OperationCheck {
        let mut reasons = Vec::new();
        match self.get(id) {
            Err(_) => reasons.push("category not found".to_string()),
            Ok(category) if !category.is_active() => reasons.push("category is inactive".to_string()),
            Ok(_) => {
                if op == CheckedOperation::Delete {
                    let children = self.children(Some(id)).len();
                    if children > 0 {
                        reasons.push(format!("category has {children} active child categories"));
                    }
                    if item_count > 0 {
                        reasons.push(format!("category is referenced by {item_count} items"));
                    }
                }
            }
        }
        OperationCheck {
            valid: reasons.is_empty(),
            reasons,
        }
    }

    // ── mutations ───────────────────────────────────────────────────────────

    pub fn create(
        &mut self,
        id: CategoryId,
        input: NewCategory,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Category>> {
        if self.nodes.contains_key(&id) {
            return Err(DomainError::conflict(format!("category {id} already exists")));
        }
        let parent = input
            .parent_id
            .map(|pid| self.active(pid).cloned())
            .transpose()?;
        let category = Category::new(id, &input.name, parent.as_ref(), input.display_order, actor, now)?;
        if self.sibling_name_taken(input.parent_id, category.name(), None) {
            return Err(DomainError::conflict(format!(
                "category '{}' already exists under this parent",
                category.name()
            )));
        }

        let mut changed = BTreeSet::new();
        self.nodes.insert(id, category);
        if let Some(pid) = input.parent_id {
            self.refresh_leaf(pid, &mut changed);
        }
        Ok(self.collect(id, changed))
    }

    /// Rename, reorder or (de)activate. A rename rewrites every descendant path.
    pub fn update(
        &mut self,
        id: CategoryId,
        update: CategoryUpdate,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Category>> {
        let current = self.get(id)?.clone();
        if !current.is_active() && update.is_active != Some(true) {
            return Err(DomainError::not_found(format!("category {id}")));
        }
        let display_order = update.display_order.map(validate_display_order).transpose()?;

        let mut rename = None;
        if let Some(name) = update.name.as_deref() {
            let name = validate_name(name)?;
            if name != current.name() {
                if self.sibling_name_taken(current.parent_id(), &name, Some(id)) {
                    return Err(DomainError::conflict(format!(
                        "category '{name}' already exists under this parent"
                    )));
                }
                let new_path = match current.parent_id() {
                    Some(pid) => self.get(pid)?.path().append(&name)?,
                    None => CategoryPath::root(&name)?,
                };
                let plan = self.plan_rebase(id, current.path(), &new_path)?;
                rename = Some((name, new_path, plan));
            }
        }

        match update.is_active {
            Some(true) if !current.is_active() => self.check_can_activate(&current)?,
            Some(false) if current.is_active() => self.check_can_deactivate(&current, None)?,
            _ => {}
        }

        let mut changed = BTreeSet::new();
        if let Some((name, new_path, plan)) = rename {
            self.apply_plan(plan, &mut changed);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.set_name(name, new_path);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            if let Some(order) = display_order {
                node.set_display_order(order);
            }
            match update.is_active {
                Some(true) => node.audit_mut().activate(actor, now),
                Some(false) => node.audit_mut().deactivate(actor, now),
                None => node.audit_mut().touch(actor, now),
            }
        }
        if update.is_active.is_some() {
            if let Some(pid) = current.parent_id() {
                self.refresh_leaf(pid, &mut changed);
            }
            self.refresh_leaf(id, &mut changed);
        }
        Ok(self.collect(id, changed))
    }

    /// Re-parent `id` (`None` = make it a root) and rewrite its subtree.
    pub fn move_to(
        &mut self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Category>> {
        let node = self.active(id)?.clone();

        let new_path = match new_parent {
            None => {
                if node.is_root() {
                    return Err(DomainError::conflict("already a root category"));
                }
                CategoryPath::root(node.name())?
            }
            Some(pid) => {
                let parent = self.active(pid)?;
                if pid == id
                    || parent.path().is_descendant_of(node.path())
                    || self.subtree_ids(id).contains(&pid)
                {
                    return Err(DomainError::invariant(
                        "cannot move category to its own descendant",
                    ));
                }
                if node.parent_id() == Some(pid) {
                    return Err(DomainError::conflict("category is already under this parent"));
                }
                parent.path().append(node.name())?
            }
        };
        if self.sibling_name_taken(new_parent, node.name(), Some(id)) {
            return Err(DomainError::conflict(format!(
                "category '{}' already exists under the new parent",
                node.name()
            )));
        }
        let plan = self.plan_rebase(id, node.path(), &new_path)?;

        let mut changed = BTreeSet::new();
        self.apply_plan(plan, &mut changed);
        if let Some(moved) = self.nodes.get_mut(&id) {
            moved.relocate(new_parent, new_path);
            moved.set_display_order(0);
            moved.audit_mut().touch(actor, now);
        }
        if let Some(old_parent) = node.parent_id() {
            self.refresh_leaf(old_parent, &mut changed);
        }
        if let Some(pid) = new_parent {
            self.refresh_leaf(pid, &mut changed);
        }
        tracing::debug!(category_id = %id, descendants = changed.len(), "category moved");
        Ok(self.collect(id, changed))
    }

    /// Soft delete. Refused while active children or items reference it.
    pub fn delete(
        &mut self,
        id: CategoryId,
        item_count: usize,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Category>> {
        let node = self.active(id)?.clone();
        self.check_can_deactivate(&node, Some(item_count))?;
        self.set_active(id, node.parent_id(), false, actor, now)
    }

    /// Apply one operation to many categories, collecting per-id failures.
    ///
    /// Deactivations run deepest first and activations shallowest first so a
    /// parent and its children can be handled in one request.
    pub fn bulk<F>(
        &mut self,
        op: BulkOperation,
        ids: &[CategoryId],
        item_count: F,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Outcome<BulkReport>
    where
        F: Fn(CategoryId) -> usize,
    {
        let mut seen = BTreeSet::new();
        let mut ordered: Vec<CategoryId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        ordered.sort_by_key(|id| {
            let level = self.nodes.get(id).map(|c| c.level()).unwrap_or(0) as i64;
            if op == BulkOperation::Activate { level } else { -level }
        });

        let mut report = BulkReport::default();
        let mut changed: BTreeSet<CategoryId> = BTreeSet::new();
        for id in ordered {
            let result = match op {
                BulkOperation::Delete => self.delete(id, item_count(id), actor, now),
                BulkOperation::Deactivate => self.active(id).cloned().and_then(|node| {
                    self.check_can_deactivate(&node, None)?;
                    self.set_active(id, node.parent_id(), false, actor, now)
                }),
                BulkOperation::Activate => self.get(id).cloned().and_then(|node| {
                    if node.is_active() {
                        return Err(DomainError::conflict("category is already active"));
                    }
                    self.check_can_activate(&node)?;
                    self.set_active(id, node.parent_id(), true, actor, now)
                }),
            };
            match result {
                Ok(touched) => {
                    report.success_count += 1;
                    changed.extend(touched.iter().map(Category::id_typed));
                }
                Err(err) => {
                    report.failure_count += 1;
                    report.errors.push(BulkError {
                        id,
                        message: err.to_string(),
                    });
                }
            }
        }
        Outcome {
            report,
            changed: changed.iter().filter_map(|id| self.nodes.get(id).cloned()).collect(),
        }
    }

    /// Create categories from exported rows. Parents are resolved by path,
    /// shallow rows first; existing paths are skipped.
    ///
    /// Rows flagged inactive are skipped: import only creates live categories.
    pub fn import(
        &mut self,
        rows: Vec<CategoryImportRow>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Outcome<ImportReport> {
        let mut report = ImportReport::default();
        let mut changed: BTreeSet<CategoryId> = BTreeSet::new();

        let mut parsed: Vec<(usize, u32, CategoryImportRow, Option<CategoryPath>)> = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            let row_no = index + 1;
            let parent_path = match row.parent_path.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => match CategoryPath::parse(raw) {
                    Ok(p) => Some(p),
                    Err(err) => {
                        report.errors.push(RowError { row: row_no, message: err.to_string() });
                        continue;
                    }
                },
            };
            let level = parent_path.as_ref().map(|p| p.level()).unwrap_or(0) + 1;
            parsed.push((row_no, level, row, parent_path));
        }
        parsed.sort_by_key(|(row_no, level, _, _)| (*level, *row_no));

        for (row_no, _, row, parent_path) in parsed {
            if row.is_active == Some(false) {
                report.skipped += 1;
                continue;
            }
            let name = match validate_name(&row.name) {
                Ok(name) => name,
                Err(err) => {
                    report.errors.push(RowError { row: row_no, message: err.to_string() });
                    continue;
                }
            };
            let parent_id = match &parent_path {
                None => None,
                Some(pp) => match self.by_path(pp).filter(|c| c.is_active()) {
                    Some(parent) => Some(parent.id_typed()),
                    None => {
                        report.errors.push(RowError {
                            row: row_no,
                            message: format!("parent category '{pp}' not found"),
                        });
                        continue;
                    }
                },
            };
            let path = match &parent_path {
                Some(pp) => pp.append(&name),
                None => CategoryPath::root(&name),
            };
            if path.as_ref().ok().and_then(|p| self.by_path(p)).is_some_and(|c| c.is_active()) {
                report.skipped += 1;
                continue;
            }

            let input = NewCategory {
                name,
                parent_id,
                display_order: row.display_order.unwrap_or(0),
            };
            match self.create(CategoryId::new(), input, actor, now) {
                Ok(touched) => {
                    report.imported += 1;
                    changed.extend(touched.iter().map(Category::id_typed));
                }
                Err(err) => report.errors.push(RowError { row: row_no, message: err.to_string() }),
            }
        }
        report.errors.sort_by_key(|e| e.row);

        Outcome {
            report,
            changed: changed.iter().filter_map(|id| self.nodes.get(id).cloned()).collect(),
        }
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    fn sibling_name_taken(&self, parent: Option<CategoryId>, name: &str, exclude: Option<CategoryId>) -> bool {
        self.nodes.values().any(|c| {
            c.is_active() && c.parent_id() == parent && c.name() == name && Some(c.id_typed()) != exclude
        })
    }

    fn has_active_children(&self, id: CategoryId) -> bool {
        self.nodes
            .values()
            .any(|c| c.is_active() && c.parent_id() == Some(id))
    }

    fn check_can_deactivate(&self, node: &Category, item_count: Option<usize>) -> DomainResult<()> {
        let has_children = self.has_active_children(node.id_typed());
        match item_count {
            Some(items) if has_children || items > 0 => Err(DomainError::invariant(
                "cannot delete category with children or items",
            )),
            None if has_children => Err(DomainError::invariant(
                "cannot deactivate category with active children",
            )),
            _ => Ok(()),
        }
    }

    fn check_can_activate(&self, node: &Category) -> DomainResult<()> {
        if let Some(pid) = node.parent_id() {
            if !self.get(pid).is_ok_and(|p| p.is_active()) {
                return Err(DomainError::invariant("parent category is inactive"));
            }
        }
        if self.sibling_name_taken(node.parent_id(), node.name(), Some(node.id_typed())) {
            return Err(DomainError::conflict(format!(
                "an active category '{}' already exists under this parent",
                node.name()
            )));
        }
        Ok(())
    }

    fn set_active(
        &mut self,
        id: CategoryId,
        parent: Option<CategoryId>,
        active: bool,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Category>> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("category {id}")))?;
        if active {
            node.audit_mut().activate(actor, now);
        } else {
            node.audit_mut().deactivate(actor, now);
        }
        let mut changed = BTreeSet::new();
        if let Some(pid) = parent {
            self.refresh_leaf(pid, &mut changed);
        }
        self.refresh_leaf(id, &mut changed);
        Ok(self.collect(id, changed))
    }

    /// `root` followed by every node beneath it (breadth first, all statuses).
    fn subtree_ids(&self, root: CategoryId) -> Vec<CategoryId> {
        let mut children_of: HashMap<CategoryId, Vec<CategoryId>> = HashMap::new();
        for c in self.nodes.values() {
            if let Some(pid) = c.parent_id() {
                children_of.entry(pid).or_default().push(c.id_typed());
            }
        }
        let mut seen = BTreeSet::from([root]);
        let mut order = vec![root];
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for child in children_of.get(&current).into_iter().flatten() {
                if seen.insert(*child) {
                    order.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        order
    }

    /// New paths for every descendant of `root` (not `root` itself).
    fn plan_rebase(
        &self,
        root: CategoryId,
        old: &CategoryPath,
        new: &CategoryPath,
    ) -> DomainResult<Vec<(CategoryId, CategoryPath)>> {
        self.subtree_ids(root)
            .into_iter()
            .skip(1)
            .filter_map(|id| self.nodes.get(&id))
            .map(|c| Ok((c.id_typed(), c.path().rebase(old, new)?)))
            .collect()
    }

    fn apply_plan(&mut self, plan: Vec<(CategoryId, CategoryPath)>, changed: &mut BTreeSet<CategoryId>) {
        for (id, path) in plan {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.set_path(path);
                changed.insert(id);
            }
        }
    }

    fn refresh_leaf(&mut self, id: CategoryId, changed: &mut BTreeSet<CategoryId>) {
        let leaf = !self.has_active_children(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            if node.is_leaf() != leaf {
                node.set_leaf(leaf);
                changed.insert(id);
            }
        }
    }

    /// `primary` first, then the other changed nodes.
    fn collect(&self, primary: CategoryId, mut changed: BTreeSet<CategoryId>) -> Vec<Category> {
        changed.remove(&primary);
        core::iter::once(primary)
            .chain(changed)
            .filter_map(|id| self.nodes.get(&id).cloned())
            .collect()
    }
}
