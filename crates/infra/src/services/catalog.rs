//! Categories, brands and locations.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use rentdesk_catalog::{
    Brand, BrandInput, BulkOperation, BulkReport, Category, CategoryExportRow, CategoryHierarchy, CategoryImportRow,
    CategoryPath, CategoryStatistics, CategoryTreeNode, CategoryUpdate, CheckedOperation, ImportReport, Location,
    LocationInput, NewCategory, OperationCheck,
};
use rentdesk_core::{BrandId, CategoryId, DomainError, Entity, LocationId, Page, PageRequest, UserId};

use super::{ServiceResult, Stores, list_active, load, load_active};

/// List filters. `is_active` defaults to active-only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryFilter {
    pub parent_id: Option<CategoryId>,
    pub level: Option<u32>,
    pub is_leaf: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// A category with its breadcrumb and subtree.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryLineage {
    pub category: Category,
    pub ancestors: Vec<Category>,
    pub descendants: Vec<Category>,
}

#[derive(Clone)]
pub struct CatalogService {
    stores: Stores,
    // Category writes rewrite paths across many documents.
    tree_lock: Arc<Mutex<()>>,
    write_lock: Arc<Mutex<()>>,
}

impl CatalogService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            tree_lock: Arc::new(Mutex::new(())),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn hierarchy(&self) -> ServiceResult<CategoryHierarchy> {
        Ok(CategoryHierarchy::new(self.stores.categories.list().await?))
    }

    /// Active items per category.
    async fn item_counts(&self) -> ServiceResult<HashMap<CategoryId, usize>> {
        let mut counts = HashMap::new();
        for item in list_active(&*self.stores.items).await? {
            if let Some(category_id) = item.category_id() {
                *counts.entry(category_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn persist(&self, changed: &[Category]) -> ServiceResult<()> {
        self.stores.categories.upsert_many(changed).await?;
        Ok(())
    }

    // ── categories ──────────────────────────────────────────────────────────

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create_category(&self, input: NewCategory, actor: Option<UserId>) -> ServiceResult<Category> {
        let _guard = self.tree_lock.lock().await;
        let mut hierarchy = self.hierarchy().await?;
        let id = CategoryId::new();
        let changed = hierarchy.create(id, input, actor, Utc::now())?;
        self.persist(&changed).await?;
        let category = hierarchy.get(id)?.clone();
        info!(category_id = %id, path = %category.path(), "category created");
        Ok(category)
    }

    #[instrument(skip(self, update), fields(category_id = %id), err)]
    pub async fn update_category(
        &self,
        id: CategoryId,
        update: CategoryUpdate,
        actor: Option<UserId>,
    ) -> ServiceResult<Category> {
        let _guard = self.tree_lock.lock().await;
        let mut hierarchy = self.hierarchy().await?;
        let changed = hierarchy.update(id, update, actor, Utc::now())?;
        self.persist(&changed).await?;
        info!(category_id = %id, changed = changed.len(), "category updated");
        Ok(hierarchy.get(id)?.clone())
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    pub async fn move_category(
        &self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
        actor: Option<UserId>,
    ) -> ServiceResult<Category> {
        let _guard = self.tree_lock.lock().await;
        let mut hierarchy = self.hierarchy().await?;
        let changed = hierarchy.move_to(id, new_parent, actor, Utc::now())?;
        self.persist(&changed).await?;
        info!(category_id = %id, changed = changed.len(), "category moved");
        Ok(hierarchy.get(id)?.clone())
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    pub async fn delete_category(&self, id: CategoryId, actor: Option<UserId>) -> ServiceResult<()> {
        let _guard = self.tree_lock.lock().await;
        let mut hierarchy = self.hierarchy().await?;
        let items = self.item_counts().await?.get(&id).copied().unwrap_or(0);
        let changed = hierarchy.delete(id, items, actor, Utc::now())?;
        self.persist(&changed).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn bulk_categories(
        &self,
        op: BulkOperation,
        ids: &[CategoryId],
        actor: Option<UserId>,
    ) -> ServiceResult<BulkReport> {
        let _guard = self.tree_lock.lock().await;
        let mut hierarchy = self.hierarchy().await?;
        let counts = self.item_counts().await?;
        let outcome = hierarchy.bulk(
            op,
            ids,
            |id| counts.get(&id).copied().unwrap_or(0),
            actor,
            Utc::now(),
        );
        self.persist(&outcome.changed).await?;
        info!(
            ?op,
            success = outcome.report.success_count,
            failure = outcome.report.failure_count,
            "bulk category operation"
        );
        Ok(outcome.report)
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()), err)]
    pub async fn import_categories(
        &self,
        rows: Vec<CategoryImportRow>,
        actor: Option<UserId>,
    ) -> ServiceResult<ImportReport> {
        let _guard = self.tree_lock.lock().await;
        let mut hierarchy = self.hierarchy().await?;
        let outcome = hierarchy.import(rows, actor, Utc::now());
        self.persist(&outcome.changed).await?;
        info!(
            imported = outcome.report.imported,
            skipped = outcome.report.skipped,
            errors = outcome.report.errors.len(),
            "categories imported"
        );
        Ok(outcome.report)
    }

    pub async fn export_categories(&self) -> ServiceResult<Vec<CategoryExportRow>> {
        Ok(self.hierarchy().await?.export())
    }

    pub async fn get_category(&self, id: CategoryId) -> ServiceResult<Category> {
        Ok(self.hierarchy().await?.get(id)?.clone())
    }

    pub async fn category_by_path(&self, raw: &str) -> ServiceResult<Category> {
        let path = CategoryPath::parse(raw)?;
        self.hierarchy()
            .await?
            .by_path(&path)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("category path '{path}'")).into())
    }

    pub async fn list_categories(&self, filter: &CategoryFilter, page: PageRequest) -> ServiceResult<Page<Category>> {
        let hierarchy = self.hierarchy().await?;
        let mut found: Vec<&Category> = match filter.search.as_deref() {
            Some(term) => hierarchy.search(term)?,
            None => hierarchy.iter().collect(),
        };
        let active = filter.is_active.unwrap_or(true);
        found.retain(|c| {
            c.is_active() == active
                && filter.parent_id.is_none_or(|p| c.parent_id() == Some(p))
                && filter.level.is_none_or(|l| c.level() == l)
                && filter.is_leaf.is_none_or(|leaf| c.is_leaf() == leaf)
        });
        found.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(Page::from_vec(found.into_iter().cloned().collect(), page))
    }

    pub async fn category_tree(&self, include_inactive: bool) -> ServiceResult<Vec<CategoryTreeNode>> {
        Ok(self.hierarchy().await?.tree(include_inactive))
    }

    pub async fn root_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.hierarchy().await?.roots().into_iter().cloned().collect())
    }

    pub async fn leaf_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.hierarchy().await?.leaves().into_iter().cloned().collect())
    }

    pub async fn child_categories(&self, id: CategoryId) -> ServiceResult<Vec<Category>> {
        let hierarchy = self.hierarchy().await?;
        hierarchy.get(id)?;
        Ok(hierarchy.children(Some(id)).into_iter().cloned().collect())
    }

    pub async fn category_lineage(&self, id: CategoryId) -> ServiceResult<CategoryLineage> {
        let hierarchy = self.hierarchy().await?;
        let category = hierarchy.get(id)?.clone();
        let mut ancestors: Vec<Category> = hierarchy.ancestors(id)?.into_iter().cloned().collect();
        ancestors.pop();
        let descendants = hierarchy.descendants(id).into_iter().cloned().collect();
        Ok(CategoryLineage {
            category,
            ancestors,
            descendants,
        })
    }

    pub async fn category_statistics(&self) -> ServiceResult<CategoryStatistics> {
        let counts = self.item_counts().await?;
        Ok(self.hierarchy().await?.statistics(&counts))
    }

    pub async fn validate_category_operation(
        &self,
        id: CategoryId,
        op: CheckedOperation,
    ) -> ServiceResult<OperationCheck> {
        let hierarchy = self.hierarchy().await?;
        let items = self.item_counts().await?.get(&id).copied().unwrap_or(0);
        Ok(hierarchy.validate_operation(id, op, items))
    }

    // ── brands ──────────────────────────────────────────────────────────────

    async fn ensure_unique_brand(&self, candidate: &Brand) -> ServiceResult<()> {
        let brands = list_active(&*self.stores.brands).await?;
        let others = brands.iter().filter(|b| b.id_typed() != candidate.id_typed());
        for other in others {
            if other.name().eq_ignore_ascii_case(candidate.name()) {
                return Err(DomainError::conflict(format!("brand name '{}' already exists", candidate.name())).into());
            }
            if let (Some(a), Some(b)) = (other.code(), candidate.code()) {
                if a.eq_ignore_ascii_case(b) {
                    return Err(DomainError::conflict(format!("brand code '{b}' already exists")).into());
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create_brand(&self, input: &BrandInput, actor: Option<UserId>) -> ServiceResult<Brand> {
        let _guard = self.write_lock.lock().await;
        let brand = Brand::create(BrandId::new(), input, actor, Utc::now())?;
        self.ensure_unique_brand(&brand).await?;
        self.stores.brands.upsert(&brand).await?;
        info!(brand_id = %brand.id_typed(), "brand created");
        Ok(brand)
    }

    pub async fn get_brand(&self, id: BrandId) -> ServiceResult<Brand> {
        load_active(&*self.stores.brands, id, "brand").await
    }

    pub async fn list_brands(&self, search: Option<&str>, page: PageRequest) -> ServiceResult<Page<Brand>> {
        let term = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        let mut brands: Vec<Brand> = list_active(&*self.stores.brands)
            .await?
            .into_iter()
            .filter(|b| {
                term.is_empty()
                    || b.name().to_lowercase().contains(&term)
                    || b.code().is_some_and(|c| c.to_lowercase().contains(&term))
            })
            .collect();
        brands.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        Ok(Page::from_vec(brands, page))
    }

    #[instrument(skip(self, input), fields(brand_id = %id), err)]
    pub async fn update_brand(&self, id: BrandId, input: &BrandInput, actor: Option<UserId>) -> ServiceResult<Brand> {
        let _guard = self.write_lock.lock().await;
        let mut brand = load_active(&*self.stores.brands, id, "brand").await?;
        brand.update_info(input, actor, Utc::now())?;
        self.ensure_unique_brand(&brand).await?;
        self.stores.brands.upsert(&brand).await?;
        Ok(brand)
    }

    #[instrument(skip(self), fields(brand_id = %id), err)]
    pub async fn delete_brand(&self, id: BrandId, actor: Option<UserId>) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut brand = load(&*self.stores.brands, id, "brand").await?;
        let in_use = list_active(&*self.stores.items)
            .await?
            .iter()
            .filter(|i| i.brand_id() == Some(id))
            .count();
        if in_use > 0 {
            return Err(DomainError::invariant(format!("brand is referenced by {in_use} items")).into());
        }
        brand.delete(actor, Utc::now())?;
        self.stores.brands.upsert(&brand).await?;
        info!(brand_id = %id, "brand deleted");
        Ok(())
    }

    // ── locations ───────────────────────────────────────────────────────────

    async fn ensure_unique_location_code(&self, candidate: &Location) -> ServiceResult<()> {
        let clash = list_active(&*self.stores.locations)
            .await?
            .into_iter()
            .any(|l| l.id_typed() != candidate.id_typed() && l.code().eq_ignore_ascii_case(candidate.code()));
        if clash {
            return Err(DomainError::conflict(format!("location code '{}' already exists", candidate.code())).into());
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(code = %input.code), err)]
    pub async fn create_location(&self, input: &LocationInput, actor: Option<UserId>) -> ServiceResult<Location> {
        let _guard = self.write_lock.lock().await;
        let location = Location::create(LocationId::new(), input, actor, Utc::now())?;
        self.ensure_unique_location_code(&location).await?;
        self.stores.locations.upsert(&location).await?;
        info!(location_id = %location.id_typed(), "location created");
        Ok(location)
    }

    pub async fn get_location(&self, id: LocationId) -> ServiceResult<Location> {
        load_active(&*self.stores.locations, id, "location").await
    }

    pub async fn list_locations(&self, page: PageRequest) -> ServiceResult<Page<Location>> {
        let mut locations = list_active(&*self.stores.locations).await?;
        locations.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(Page::from_vec(locations, page))
    }

    #[instrument(skip(self, input), fields(location_id = %id), err)]
    pub async fn update_location(
        &self,
        id: LocationId,
        input: &LocationInput,
        actor: Option<UserId>,
    ) -> ServiceResult<Location> {
        let _guard = self.write_lock.lock().await;
        let mut location = load_active(&*self.stores.locations, id, "location").await?;
        location.update(input, actor, Utc::now())?;
        self.ensure_unique_location_code(&location).await?;
        self.stores.locations.upsert(&location).await?;
        Ok(location)
    }

    /// `None` removes the current manager.
    #[instrument(skip(self), fields(location_id = %id), err)]
    pub async fn set_location_manager(
        &self,
        id: LocationId,
        manager: Option<UserId>,
        actor: Option<UserId>,
    ) -> ServiceResult<Location> {
        let _guard = self.write_lock.lock().await;
        let mut location = load_active(&*self.stores.locations, id, "location").await?;
        match manager {
            Some(user_id) => {
                load_active(&*self.stores.users, user_id, "user").await?;
                location.assign_manager(user_id, actor, Utc::now())?;
            }
            None => location.remove_manager(actor, Utc::now())?,
        }
        self.stores.locations.upsert(&location).await?;
        Ok(location)
    }

    #[instrument(skip(self), fields(location_id = %id), err)]
    pub async fn delete_location(&self, id: LocationId, actor: Option<UserId>) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut location = load(&*self.stores.locations, id, "location").await?;
        let units = list_active(&*self.stores.units)
            .await?
            .iter()
            .filter(|u| u.location_id() == id)
            .count();
        if units > 0 {
            return Err(DomainError::invariant(format!("location still holds {units} inventory units")).into());
        }
        location.delete(actor, Utc::now())?;
        self.stores.locations.upsert(&location).await?;
        info!(location_id = %id, "location deleted");
        Ok(())
    }
}
