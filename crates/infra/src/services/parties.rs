//! Customers and suppliers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use rentdesk_core::{CustomerId, DomainError, Entity, Money, Page, PageRequest, SupplierId, UserId};
use rentdesk_parties::{
    ContactInfo, Customer, CustomerFilter, CustomerStatistics, CustomerStatus, CustomerTier, CustomerUpdate,
    NewCustomer, Rating, Supplier, SupplierFilter, SupplierInput, SupplierStatistics, SupplierStatus,
};

use super::{BulkOutcome, ServiceResult, Stores, load, load_active};

#[derive(Clone)]
pub struct PartyService {
    stores: Stores,
    write_lock: Arc<Mutex<()>>,
}

impl PartyService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    // ── customers ───────────────────────────────────────────────────────────

    async fn save_customer(&self, customer: &Customer) -> ServiceResult<()> {
        self.stores.customers.upsert(customer).await?;
        Ok(())
    }

    /// Load, mutate and persist one active customer.
    async fn with_customer<F>(&self, id: CustomerId, apply: F) -> ServiceResult<Customer>
    where
        F: FnOnce(&mut Customer) -> rentdesk_core::DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut customer = load_active(&*self.stores.customers, id, "customer").await?;
        apply(&mut customer)?;
        self.save_customer(&customer).await?;
        Ok(customer)
    }

    #[instrument(skip(self, input), fields(code = %input.customer_code), err)]
    pub async fn create_customer(&self, input: NewCustomer, actor: Option<UserId>) -> ServiceResult<Customer> {
        let _guard = self.write_lock.lock().await;
        let customer = Customer::create(CustomerId::new(), input, actor, Utc::now())?;
        let clash = self
            .stores
            .customers
            .list()
            .await?
            .iter()
            .any(|c| c.customer_code().eq_ignore_ascii_case(customer.customer_code()));
        if clash {
            return Err(DomainError::conflict(format!(
                "customer code '{}' already exists",
                customer.customer_code()
            ))
            .into());
        }
        self.save_customer(&customer).await?;
        info!(customer_id = %customer.id_typed(), "customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> ServiceResult<Customer> {
        load_active(&*self.stores.customers, id, "customer").await
    }

    pub async fn customer_by_code(&self, code: &str) -> ServiceResult<Customer> {
        self.stores
            .customers
            .list()
            .await?
            .into_iter()
            .find(|c| c.is_active() && c.customer_code().eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| DomainError::not_found(format!("customer code '{code}'")).into())
    }

    /// `is_active: None` lists active customers only.
    pub async fn list_customers(&self, filter: &CustomerFilter, page: PageRequest) -> ServiceResult<Page<Customer>> {
        let mut filter = filter.clone();
        filter.is_active.get_or_insert(true);
        let mut customers: Vec<Customer> = self
            .stores
            .customers
            .list()
            .await?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        customers.sort_by(|a, b| a.customer_code().cmp(b.customer_code()));
        Ok(Page::from_vec(customers, page))
    }

    pub async fn search_customers(&self, term: &str, page: PageRequest) -> ServiceResult<Page<Customer>> {
        let filter = CustomerFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };
        self.list_customers(&filter, page).await
    }

    pub async fn customer_statistics(&self) -> ServiceResult<CustomerStatistics> {
        let customers = self.stores.customers.list().await?;
        Ok(CustomerStatistics::collect(&customers))
    }

    #[instrument(skip(self, update, contact), fields(customer_id = %id), err)]
    pub async fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
        contact: Option<ContactInfo>,
        actor: Option<UserId>,
    ) -> ServiceResult<Customer> {
        let now = Utc::now();
        self.with_customer(id, |c| {
            c.update(update, actor, now)?;
            match contact {
                Some(contact) => c.update_contact_info(&contact, actor, now),
                None => Ok(()),
            }
        })
        .await
    }

    #[instrument(skip(self, reason), fields(customer_id = %id), err)]
    pub async fn blacklist_customer(&self, id: CustomerId, reason: &str, actor: Option<UserId>) -> ServiceResult<Customer> {
        let customer = self.with_customer(id, |c| c.blacklist(reason, actor, Utc::now())).await?;
        info!(customer_id = %id, "customer blacklisted");
        Ok(customer)
    }

    #[instrument(skip(self, reason), fields(customer_id = %id), err)]
    pub async fn warn_customer(&self, id: CustomerId, reason: &str, actor: Option<UserId>) -> ServiceResult<Customer> {
        self.with_customer(id, |c| c.set_warning(reason, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    pub async fn clear_customer_blacklist(&self, id: CustomerId, actor: Option<UserId>) -> ServiceResult<Customer> {
        self.with_customer(id, |c| c.clear_blacklist(actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    pub async fn set_customer_status(
        &self,
        id: CustomerId,
        status: CustomerStatus,
        actor: Option<UserId>,
    ) -> ServiceResult<Customer> {
        self.with_customer(id, |c| c.update_status(status, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    pub async fn set_customer_tier(
        &self,
        id: CustomerId,
        tier: CustomerTier,
        actor: Option<UserId>,
    ) -> ServiceResult<Customer> {
        self.with_customer(id, |c| c.update_tier(tier, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    pub async fn set_customer_credit_limit(
        &self,
        id: CustomerId,
        limit: Money,
        actor: Option<UserId>,
    ) -> ServiceResult<Customer> {
        self.with_customer(id, |c| c.update_credit_limit(limit, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    pub async fn delete_customer(&self, id: CustomerId, actor: Option<UserId>) -> ServiceResult<()> {
        self.with_customer(id, |c| c.delete(actor, Utc::now())).await?;
        info!(customer_id = %id, "customer deleted");
        Ok(())
    }

    /// Activate (undo soft delete) or deactivate many customers.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn bulk_set_customers_active(
        &self,
        ids: &[CustomerId],
        active: bool,
        actor: Option<UserId>,
    ) -> ServiceResult<BulkOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut outcome = BulkOutcome::default();
        for &id in ids {
            let result: ServiceResult<()> = async {
                let mut customer = load(&*self.stores.customers, id, "customer").await?;
                if active {
                    customer.reactivate(actor, Utc::now())?;
                } else {
                    customer.delete(actor, Utc::now())?;
                }
                self.save_customer(&customer).await
            }
            .await;
            outcome.record(*id.as_uuid(), result);
        }
        info!(
            active,
            success = outcome.success_count,
            failure = outcome.failure_count,
            "bulk customer status change"
        );
        Ok(outcome)
    }

    // ── suppliers ───────────────────────────────────────────────────────────

    async fn with_supplier<F>(&self, id: SupplierId, apply: F) -> ServiceResult<Supplier>
    where
        F: FnOnce(&mut Supplier) -> rentdesk_core::DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut supplier = load_active(&*self.stores.suppliers, id, "supplier").await?;
        apply(&mut supplier)?;
        self.stores.suppliers.upsert(&supplier).await?;
        Ok(supplier)
    }

    #[instrument(skip(self, input), fields(code = %input.supplier_code), err)]
    pub async fn create_supplier(&self, input: &SupplierInput, actor: Option<UserId>) -> ServiceResult<Supplier> {
        let _guard = self.write_lock.lock().await;
        let supplier = Supplier::create(SupplierId::new(), input, actor, Utc::now())?;
        let clash = self
            .stores
            .suppliers
            .list()
            .await?
            .iter()
            .any(|s| s.supplier_code().eq_ignore_ascii_case(supplier.supplier_code()));
        if clash {
            return Err(DomainError::conflict(format!(
                "supplier code '{}' already exists",
                supplier.supplier_code()
            ))
            .into());
        }
        self.stores.suppliers.upsert(&supplier).await?;
        info!(supplier_id = %supplier.id_typed(), "supplier created");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: SupplierId) -> ServiceResult<Supplier> {
        load_active(&*self.stores.suppliers, id, "supplier").await
    }

    pub async fn supplier_by_code(&self, code: &str) -> ServiceResult<Supplier> {
        self.stores
            .suppliers
            .list()
            .await?
            .into_iter()
            .find(|s| s.is_active() && s.supplier_code().eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| DomainError::not_found(format!("supplier code '{code}'")).into())
    }

    /// `is_active: None` lists active suppliers only.
    pub async fn list_suppliers(&self, filter: &SupplierFilter, page: PageRequest) -> ServiceResult<Page<Supplier>> {
        let mut filter = filter.clone();
        filter.is_active.get_or_insert(true);
        let mut suppliers: Vec<Supplier> = self
            .stores
            .suppliers
            .list()
            .await?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        suppliers.sort_by(|a, b| a.company_name().cmp(b.company_name()));
        Ok(Page::from_vec(suppliers, page))
    }

    pub async fn search_suppliers(&self, term: &str, page: PageRequest) -> ServiceResult<Page<Supplier>> {
        let filter = SupplierFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };
        self.list_suppliers(&filter, page).await
    }

    pub async fn supplier_statistics(&self) -> ServiceResult<SupplierStatistics> {
        let suppliers = self.stores.suppliers.list().await?;
        Ok(SupplierStatistics::collect(&suppliers))
    }

    #[instrument(skip(self, input), fields(supplier_id = %id), err)]
    pub async fn update_supplier(
        &self,
        id: SupplierId,
        input: &SupplierInput,
        actor: Option<UserId>,
    ) -> ServiceResult<Supplier> {
        let existing = self.stores.suppliers.list().await?;
        let clash = existing
            .iter()
            .any(|s| s.id_typed() != id && s.supplier_code().eq_ignore_ascii_case(input.supplier_code.trim()));
        if clash {
            return Err(DomainError::conflict(format!(
                "supplier code '{}' already exists",
                input.supplier_code.trim()
            ))
            .into());
        }
        self.with_supplier(id, |s| s.update(input, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    pub async fn set_supplier_status(
        &self,
        id: SupplierId,
        status: SupplierStatus,
        actor: Option<UserId>,
    ) -> ServiceResult<Supplier> {
        self.with_supplier(id, |s| s.update_status(status, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    pub async fn set_supplier_performance(
        &self,
        id: SupplierId,
        quality: Rating,
        delivery: Rating,
        actor: Option<UserId>,
    ) -> ServiceResult<Supplier> {
        self.with_supplier(id, |s| s.update_performance(quality, delivery, actor, Utc::now()))
            .await
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    pub async fn delete_supplier(&self, id: SupplierId, actor: Option<UserId>) -> ServiceResult<()> {
        self.with_supplier(id, |s| s.delete(actor, Utc::now())).await?;
        info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentdesk_parties::{BlacklistStatus, CustomerType, PaymentTerms, SupplierTier, SupplierType};

    use crate::services::ServiceError;

    fn service() -> PartyService {
        PartyService::new(Stores::in_memory())
    }

    fn individual(code: &str) -> NewCustomer {
        NewCustomer {
            customer_code: code.to_string(),
            customer_type: CustomerType::Individual,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            business_name: None,
            contact: ContactInfo::default(),
            tax_id: None,
            customer_tier: CustomerTier::default(),
            credit_limit: Money::zero(),
        }
    }

    fn supplier_input(code: &str) -> SupplierInput {
        SupplierInput {
            supplier_code: code.to_string(),
            company_name: format!("{code} Trading"),
            supplier_type: SupplierType::Distributor,
            contact_person: None,
            contact: ContactInfo::default(),
            tax_id: None,
            payment_terms: PaymentTerms::default(),
            credit_limit: Money::zero(),
            supplier_tier: SupplierTier::default(),
        }
    }

    #[tokio::test]
    async fn customer_codes_are_unique_case_insensitively() {
        let svc = service();
        svc.create_customer(individual("C-001"), None).await.unwrap();
        let err = svc.create_customer(individual("c-001"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn blacklisted_customer_shows_up_in_filtered_list_and_stats() {
        let svc = service();
        let a = svc.create_customer(individual("C-1"), None).await.unwrap();
        svc.create_customer(individual("C-2"), None).await.unwrap();
        svc.blacklist_customer(a.id_typed(), "unpaid damages", None).await.unwrap();

        let filter = CustomerFilter {
            blacklist_status: Some(BlacklistStatus::Blacklisted),
            ..Default::default()
        };
        let page = svc.list_customers(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].customer_code(), "C-1");

        let stats = svc.customer_statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.blacklisted, 1);
    }

    #[tokio::test]
    async fn bulk_deactivate_reports_per_id_failures() {
        let svc = service();
        let a = svc.create_customer(individual("C-1"), None).await.unwrap();
        let missing = CustomerId::new();

        let outcome = svc
            .bulk_set_customers_active(&[a.id_typed(), missing], false, None)
            .await
            .unwrap();
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.errors[0].id, *missing.as_uuid());

        assert!(svc.get_customer(a.id_typed()).await.is_err());
        let outcome = svc
            .bulk_set_customers_active(&[a.id_typed()], true, None)
            .await
            .unwrap();
        assert_eq!(outcome.success_count, 1);
        assert!(svc.get_customer(a.id_typed()).await.is_ok());
    }

    #[tokio::test]
    async fn supplier_lookup_by_code_and_performance_update() {
        let svc = service();
        let s = svc.create_supplier(&supplier_input("SUP-9"), None).await.unwrap();
        let found = svc.supplier_by_code("sup-9").await.unwrap();
        assert_eq!(found.id_typed(), s.id_typed());

        let updated = svc
            .set_supplier_performance(
                s.id_typed(),
                Rating::from_tenths(45).unwrap(),
                Rating::from_tenths(30).unwrap(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.quality_rating().tenths(), 45);
    }
}
