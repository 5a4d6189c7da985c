//! Transaction lifecycle, lines, payments and reports.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use rentdesk_core::{
    BasisPoints, CustomerId, DomainError, DomainResult, LineId, Money, Page, PageRequest, SupplierId, TransactionId,
    UserId,
};
use rentdesk_transactions::{
    LineInput, PaymentMethod, PaymentStatus, Transaction, TransactionInput, TransactionStatus, TransactionSummary,
    TransactionType, TransactionUpdate, numbering, reports,
};

use super::{ServiceResult, Stores, list_active, load, load_active};
use crate::store::DocumentBatch;

/// List filters; dates bound the transaction date, inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<CustomerId>,
    pub supplier_id: Option<SupplierId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TransactionFilter {
    fn matches(&self, tx: &Transaction) -> bool {
        self.transaction_type.is_none_or(|t| tx.transaction_type() == t)
            && self.status.is_none_or(|s| tx.status() == s)
            && self.payment_status.is_none_or(|p| tx.payment_status() == p)
            && self.customer_id.is_none_or(|c| tx.customer_id() == Some(c))
            && self.supplier_id.is_none_or(|s| tx.supplier_id() == Some(s))
            && self.from.is_none_or(|from| tx.transaction_date() >= from)
            && self.to.is_none_or(|to| tx.transaction_date() <= to)
    }
}

/// A completed transaction adds to its counterparty's history: lifetime
/// value for customers, order count and spend for suppliers.
pub(super) async fn stage_party_activity(
    stores: &Stores,
    tx: &Transaction,
    batch: &mut DocumentBatch,
) -> ServiceResult<()> {
    if let Some(customer_id) = tx.customer_id() {
        let mut customer = load(&*stores.customers, customer_id, "customer").await?;
        customer.record_transaction(tx.total_amount(), tx.transaction_date(), Utc::now())?;
        batch.put(&customer)?;
    }
    if tx.transaction_type() == TransactionType::Purchase {
        if let Some(supplier_id) = tx.supplier_id() {
            let mut supplier = load(&*stores.suppliers, supplier_id, "supplier").await?;
            supplier.record_order(tx.total_amount(), tx.transaction_date(), Utc::now())?;
            batch.put(&supplier)?;
            info!(%supplier_id, total_orders = supplier.total_orders(), "supplier order recorded");
        }
    }
    Ok(())
}

async fn record_party_activity(stores: &Stores, tx: &Transaction) -> ServiceResult<()> {
    let mut batch = DocumentBatch::new();
    stage_party_activity(stores, tx, &mut batch).await?;
    stores.batch.commit(batch).await?;
    Ok(())
}

#[derive(Clone)]
pub struct TransactionService {
    stores: Stores,
    // Numbering reads every number issued so far; creation must not interleave.
    write_lock: Arc<Mutex<()>>,
}

impl TransactionService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Shared with the rental return service, which writes rentals too.
    pub(crate) fn write_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.write_lock)
    }

    async fn check_parties(&self, input: &TransactionInput) -> ServiceResult<()> {
        if let Some(customer_id) = input.customer_id {
            let customer = load_active(&*self.stores.customers, customer_id, "customer").await?;
            customer.can_transact()?;
        }
        if let Some(supplier_id) = input.supplier_id {
            let supplier = load_active(&*self.stores.suppliers, supplier_id, "supplier").await?;
            if input.transaction_type == TransactionType::Purchase {
                supplier.ensure_can_supply()?;
            }
        }
        if let Some(location_id) = input.location_id {
            load_active(&*self.stores.locations, location_id, "location").await?;
        }
        if let Some(reference) = input.reference_transaction_id {
            load_active(&*self.stores.transactions, reference, "transaction").await?;
        }
        Ok(())
    }

    /// Item and unit referenced by a line must exist and belong together.
    async fn check_line_references(&self, input: &LineInput) -> ServiceResult<()> {
        if let Some(item_id) = input.item_id {
            load_active(&*self.stores.items, item_id, "item").await?;
        }
        if let Some(unit_id) = input.inventory_unit_id {
            let unit = load_active(&*self.stores.units, unit_id, "inventory unit").await?;
            if input.item_id.is_some_and(|item_id| unit.item_id() != item_id) {
                return Err(DomainError::validation("inventory unit does not belong to the line item").into());
            }
        }
        Ok(())
    }

    async fn with_transaction<F>(&self, id: TransactionId, apply: F) -> ServiceResult<Transaction>
    where
        F: FnOnce(&mut Transaction) -> DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut tx = load_active(&*self.stores.transactions, id, "transaction").await?;
        apply(&mut tx)?;
        self.stores.transactions.upsert(&tx).await?;
        Ok(tx)
    }

    #[instrument(skip(self, input), fields(kind = ?input.transaction_type), err)]
    pub async fn create_transaction(
        &self,
        input: &TransactionInput,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        let _guard = self.write_lock.lock().await;
        self.check_parties(input).await?;
        let existing = self.stores.transactions.list().await?;
        let number = numbering::next_number(
            input.transaction_type,
            input.transaction_date,
            existing.iter().map(Transaction::transaction_number),
        );
        let tx = Transaction::create(TransactionId::new(), &number, input, actor, Utc::now())?;
        self.stores.transactions.upsert(&tx).await?;
        info!(transaction_id = %tx.id_typed(), number = %number, "transaction created");
        Ok(tx)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> ServiceResult<Transaction> {
        load_active(&*self.stores.transactions, id, "transaction").await
    }

    pub async fn transaction_by_number(&self, number: &str) -> ServiceResult<Transaction> {
        list_active(&*self.stores.transactions)
            .await?
            .into_iter()
            .find(|tx| tx.transaction_number() == number.trim())
            .ok_or_else(|| DomainError::not_found(format!("transaction '{number}'")).into())
    }

    /// Newest first.
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Transaction>> {
        let mut txs: Vec<Transaction> = list_active(&*self.stores.transactions)
            .await?
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect();
        txs.sort_by(|a, b| {
            b.transaction_date()
                .cmp(&a.transaction_date())
                .then_with(|| b.transaction_number().cmp(a.transaction_number()))
        });
        Ok(Page::from_vec(txs, page))
    }

    #[instrument(skip(self, update), fields(transaction_id = %id), err)]
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        update: &TransactionUpdate,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        if let Some(location_id) = update.location_id {
            load_active(&*self.stores.locations, location_id, "location").await?;
        }
        self.with_transaction(id, |tx| tx.update(update, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(transaction_id = %id), err)]
    pub async fn change_status(
        &self,
        id: TransactionId,
        next: TransactionStatus,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        let tx = self.with_transaction(id, |tx| tx.change_status(next, actor, Utc::now())).await?;
        info!(transaction_id = %id, status = %tx.status(), "transaction status changed");
        if tx.status() == TransactionStatus::Completed {
            record_party_activity(&self.stores, &tx).await?;
        }
        Ok(tx)
    }

    #[instrument(skip(self, reference), fields(transaction_id = %id, amount = %amount), err)]
    pub async fn apply_payment(
        &self,
        id: TransactionId,
        amount: Money,
        method: PaymentMethod,
        reference: Option<&str>,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        let tx = self
            .with_transaction(id, |tx| tx.apply_payment(amount, method, reference, actor, Utc::now()))
            .await?;
        info!(transaction_id = %id, paid = %tx.paid_amount(), payment_status = ?tx.payment_status(), "payment applied");
        Ok(tx)
    }

    #[instrument(skip(self, reason), fields(transaction_id = %id, amount = %amount), err)]
    pub async fn refund(
        &self,
        id: TransactionId,
        amount: Money,
        reason: &str,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        let tx = self
            .with_transaction(id, |tx| tx.refund(amount, reason, actor, Utc::now()))
            .await?;
        info!(transaction_id = %id, "transaction refunded");
        Ok(tx)
    }

    #[instrument(skip(self, reason), fields(transaction_id = %id), err)]
    pub async fn cancel(&self, id: TransactionId, reason: Option<&str>, actor: Option<UserId>) -> ServiceResult<Transaction> {
        let tx = self.with_transaction(id, |tx| tx.cancel(reason, actor, Utc::now())).await?;
        info!(transaction_id = %id, "transaction cancelled");
        Ok(tx)
    }

    #[instrument(skip(self), fields(transaction_id = %id), err)]
    pub async fn mark_overdue(&self, id: TransactionId, actor: Option<UserId>) -> ServiceResult<Transaction> {
        self.with_transaction(id, |tx| tx.mark_overdue(actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(transaction_id = %id), err)]
    pub async fn complete_rental_return(
        &self,
        id: TransactionId,
        return_date: NaiveDate,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        let tx = self
            .with_transaction(id, |tx| tx.complete_rental_return(return_date, actor, Utc::now()))
            .await?;
        info!(transaction_id = %id, %return_date, "rental returned");
        record_party_activity(&self.stores, &tx).await?;
        Ok(tx)
    }

    #[instrument(skip(self), fields(transaction_id = %id), err)]
    pub async fn delete_transaction(&self, id: TransactionId, actor: Option<UserId>) -> ServiceResult<()> {
        self.with_transaction(id, |tx| tx.delete(actor, Utc::now())).await?;
        info!(transaction_id = %id, "transaction deleted");
        Ok(())
    }

    // ── lines ───────────────────────────────────────────────────────────────

    #[instrument(skip(self, input), fields(transaction_id = %id, line_type = ?input.line_type), err)]
    pub async fn add_line(&self, id: TransactionId, input: &LineInput, actor: Option<UserId>) -> ServiceResult<Transaction> {
        self.check_line_references(input).await?;
        self.with_transaction(id, |tx| tx.add_line(LineId::new(), input, actor, Utc::now()).map(|_| ()))
            .await
    }

    #[instrument(skip(self, input), fields(transaction_id = %id, line_id = %line_id), err)]
    pub async fn update_line(
        &self,
        id: TransactionId,
        line_id: LineId,
        input: &LineInput,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        self.check_line_references(input).await?;
        self.with_transaction(id, |tx| tx.update_line(line_id, input, actor, Utc::now()))
            .await
    }

    #[instrument(skip(self), fields(transaction_id = %id, line_id = %line_id), err)]
    pub async fn remove_line(&self, id: TransactionId, line_id: LineId, actor: Option<UserId>) -> ServiceResult<Transaction> {
        self.with_transaction(id, |tx| tx.remove_line(line_id, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(transaction_id = %id, line_id = %line_id), err)]
    pub async fn apply_line_discount(
        &self,
        id: TransactionId,
        line_id: LineId,
        percentage: Option<BasisPoints>,
        amount: Option<Money>,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        self.with_transaction(id, |tx| {
            tx.apply_line_discount(line_id, percentage, amount, actor, Utc::now())
        })
        .await
    }

    #[instrument(skip(self, reason), fields(transaction_id = %id, line_id = %line_id), err)]
    pub async fn process_line_return(
        &self,
        id: TransactionId,
        line_id: LineId,
        quantity: i64,
        date: NaiveDate,
        reason: Option<&str>,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        self.with_transaction(id, |tx| {
            tx.process_line_return(line_id, quantity, date, reason, actor, Utc::now())
        })
        .await
    }

    #[instrument(skip(self), fields(transaction_id = %id, line_id = %line_id), err)]
    pub async fn update_line_rental_period(
        &self,
        id: TransactionId,
        line_id: LineId,
        end: NaiveDate,
        actor: Option<UserId>,
    ) -> ServiceResult<Transaction> {
        self.with_transaction(id, |tx| tx.update_line_rental_period(line_id, end, actor, Utc::now()))
            .await
    }

    // ── reports ─────────────────────────────────────────────────────────────

    pub async fn summary(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> ServiceResult<TransactionSummary> {
        let txs = list_active(&*self.stores.transactions).await?;
        Ok(reports::summary(&txs, from, to))
    }

    pub async fn overdue(&self, today: NaiveDate) -> ServiceResult<Vec<Transaction>> {
        let txs = list_active(&*self.stores.transactions).await?;
        Ok(reports::overdue(&txs, today).into_iter().cloned().collect())
    }

    pub async fn outstanding(&self) -> ServiceResult<Vec<Transaction>> {
        let txs = list_active(&*self.stores.transactions).await?;
        Ok(reports::outstanding(&txs).into_iter().cloned().collect())
    }

    pub async fn rentals_due_for_return(&self, today: NaiveDate, days_ahead: u32) -> ServiceResult<Vec<Transaction>> {
        let txs = list_active(&*self.stores.transactions).await?;
        Ok(reports::rentals_due_for_return(&txs, today, days_ahead)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rentdesk_parties::{ContactInfo, Customer, CustomerTier, CustomerType, NewCustomer};
    use rentdesk_transactions::LineType;

    use crate::services::ServiceError;

    pub(crate) fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    pub(crate) async fn seed_customer(stores: &Stores, code: &str) -> Customer {
        let input = NewCustomer {
            customer_code: code.to_string(),
            customer_type: CustomerType::Business,
            first_name: None,
            last_name: None,
            business_name: Some("Acme Events".to_string()),
            contact: ContactInfo::default(),
            tax_id: None,
            customer_tier: CustomerTier::default(),
            credit_limit: Money::zero(),
        };
        let customer = Customer::create(CustomerId::new(), input, None, Utc::now()).unwrap();
        stores.customers.upsert(&customer).await.unwrap();
        customer
    }

    pub(crate) fn sale(customer: &Customer, date: NaiveDate) -> TransactionInput {
        TransactionInput {
            transaction_type: TransactionType::Sale,
            customer_id: Some(customer.id_typed()),
            supplier_id: None,
            location_id: None,
            sales_person_id: None,
            reference_transaction_id: None,
            transaction_date: date,
            due_date: None,
            rental_start_date: None,
            rental_end_date: None,
            payment_method: None,
            payment_reference: None,
            notes: None,
        }
    }

    pub(crate) fn fee_line(price_minor: i64) -> LineInput {
        LineInput {
            line_type: LineType::Fee,
            item_id: None,
            inventory_unit_id: None,
            description: "delivery".to_string(),
            quantity: 1,
            unit_price: Money::from_minor(price_minor),
            discount_percentage: None,
            discount_amount: None,
            tax_rate: BasisPoints::default(),
            rental_period_value: None,
            rental_period_unit: None,
            rental_start_date: None,
            rental_end_date: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn numbers_are_sequenced_per_day() {
        let stores = Stores::in_memory();
        let svc = TransactionService::new(stores.clone());
        let customer = seed_customer(&stores, "C-1").await;

        let a = svc.create_transaction(&sale(&customer, day(1)), None).await.unwrap();
        let b = svc.create_transaction(&sale(&customer, day(1)), None).await.unwrap();
        let c = svc.create_transaction(&sale(&customer, day(2)), None).await.unwrap();

        assert_eq!(a.transaction_number(), "SAL-20260601-0001");
        assert_eq!(b.transaction_number(), "SAL-20260601-0002");
        assert_eq!(c.transaction_number(), "SAL-20260602-0001");
        let found = svc.transaction_by_number("SAL-20260601-0002").await.unwrap();
        assert_eq!(found.id_typed(), b.id_typed());
    }

    #[tokio::test]
    async fn blacklisted_customer_cannot_transact() {
        let stores = Stores::in_memory();
        let svc = TransactionService::new(stores.clone());
        let mut customer = seed_customer(&stores, "C-1").await;
        customer.blacklist("fraud", None, Utc::now()).unwrap();
        stores.customers.upsert(&customer).await.unwrap();

        let err = svc.create_transaction(&sale(&customer, day(1)), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn completed_sale_feeds_customer_lifetime_value() {
        let stores = Stores::in_memory();
        let svc = TransactionService::new(stores.clone());
        let customer = seed_customer(&stores, "C-1").await;
        let tx = svc.create_transaction(&sale(&customer, day(3)), None).await.unwrap();
        let id = tx.id_typed();

        svc.add_line(id, &fee_line(2_500), None).await.unwrap();
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Confirmed,
            TransactionStatus::InProgress,
        ] {
            svc.change_status(id, status, None).await.unwrap();
        }
        svc.apply_payment(id, Money::from_minor(2_500), PaymentMethod::Cash, None, None)
            .await
            .unwrap();
        svc.change_status(id, TransactionStatus::Completed, None).await.unwrap();

        let customer = stores.customers.get(customer.id_typed()).await.unwrap().unwrap();
        assert_eq!(customer.lifetime_value(), Money::from_minor(2_500));
        assert_eq!(customer.last_transaction_date(), Some(day(3)));
    }

    #[tokio::test]
    async fn line_for_unknown_item_is_rejected() {
        let stores = Stores::in_memory();
        let svc = TransactionService::new(stores.clone());
        let customer = seed_customer(&stores, "C-1").await;
        let tx = svc.create_transaction(&sale(&customer, day(1)), None).await.unwrap();

        let mut line = fee_line(100);
        line.line_type = LineType::Product;
        line.item_id = Some(rentdesk_core::ItemId::new());
        let err = svc.add_line(tx.id_typed(), &line, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn outstanding_report_lists_unpaid_balances() {
        let stores = Stores::in_memory();
        let svc = TransactionService::new(stores.clone());
        let customer = seed_customer(&stores, "C-1").await;
        let tx = svc.create_transaction(&sale(&customer, day(1)), None).await.unwrap();
        svc.add_line(tx.id_typed(), &fee_line(1_000), None).await.unwrap();
        svc.create_transaction(&sale(&customer, day(1)), None).await.unwrap();

        let outstanding = svc.outstanding().await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].balance_due(), Money::from_minor(1_000));
    }
}
