//! Rental returns: inspection, fees, deposit release and finalization.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use rentdesk_core::{DomainError, DomainResult, Money, Page, PageRequest, ReturnId, ReturnLineId, TransactionId, UserId};
use rentdesk_inventory::UnitStatus;
use rentdesk_transactions::{
    DamageLevel, RentalReturn, ReturnInput, ReturnLineInput, ReturnLineStatus, ReturnLineUpdate, ReturnStatus,
    ReturnUpdate, TransactionStatus, ensure_no_open_return, rental_return,
};

use super::transactions::stage_party_activity;
use super::{ServiceResult, Stores, list_active, load_active};
use crate::store::DocumentBatch;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnFilter {
    pub status: Option<ReturnStatus>,
    pub rental_transaction_id: Option<TransactionId>,
}

impl ReturnFilter {
    fn matches(&self, ret: &RentalReturn) -> bool {
        self.status.is_none_or(|s| ret.status() == s)
            && self
                .rental_transaction_id
                .is_none_or(|id| ret.rental_transaction_id() == id)
    }
}

#[derive(Clone)]
pub struct RentalService {
    stores: Stores,
    // Same lock as the transaction service; finalizing writes the rental.
    write_lock: Arc<Mutex<()>>,
    // Inventory's lock, taken after `write_lock` while units are restocked.
    units_lock: Arc<Mutex<()>>,
}

impl RentalService {
    pub fn new(stores: Stores, write_lock: Arc<Mutex<()>>, units_lock: Arc<Mutex<()>>) -> Self {
        Self {
            stores,
            write_lock,
            units_lock,
        }
    }

    async fn with_return<F, R>(&self, id: ReturnId, apply: F) -> ServiceResult<(RentalReturn, R)>
    where
        F: FnOnce(&mut RentalReturn) -> DomainResult<R>,
    {
        let _guard = self.write_lock.lock().await;
        let mut ret = load_active(&*self.stores.returns, id, "rental return").await?;
        let out = apply(&mut ret)?;
        self.stores.returns.upsert(&ret).await?;
        Ok((ret, out))
    }

    async fn edit(&self, id: ReturnId, apply: impl FnOnce(&mut RentalReturn) -> DomainResult<()>) -> ServiceResult<RentalReturn> {
        self.with_return(id, apply).await.map(|(ret, ())| ret)
    }

    #[instrument(skip(self, input), fields(rental_id = %input.rental_transaction_id), err)]
    pub async fn create_return(&self, input: &ReturnInput, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        let _guard = self.write_lock.lock().await;
        let rental = load_active(&*self.stores.transactions, input.rental_transaction_id, "transaction").await?;
        let existing = self.stores.returns.list().await?;
        ensure_no_open_return(rental.id_typed(), &existing)?;
        let ret = RentalReturn::create(ReturnId::new(), input, &rental, actor, Utc::now())?;
        self.stores.returns.upsert(&ret).await?;
        info!(return_id = %ret.id_typed(), "rental return created");
        Ok(ret)
    }

    pub async fn get_return(&self, id: ReturnId) -> ServiceResult<RentalReturn> {
        load_active(&*self.stores.returns, id, "rental return").await
    }

    /// Newest return date first.
    pub async fn list_returns(&self, filter: &ReturnFilter, page: PageRequest) -> ServiceResult<Page<RentalReturn>> {
        let mut returns: Vec<RentalReturn> = list_active(&*self.stores.returns)
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        returns.sort_by(|a, b| b.return_date().cmp(&a.return_date()));
        Ok(Page::from_vec(returns, page))
    }

    #[instrument(skip(self, update), fields(return_id = %id), err)]
    pub async fn update_return(&self, id: ReturnId, update: &ReturnUpdate, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        self.edit(id, |ret| ret.update(update, actor, Utc::now())).await
    }

    /// `Completed` goes through [`RentalService::finalize`].
    #[instrument(skip(self), fields(return_id = %id), err)]
    pub async fn change_status(&self, id: ReturnId, next: ReturnStatus, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        if next == ReturnStatus::Completed {
            return self.finalize(id, actor).await;
        }
        let ret = self.edit(id, |ret| ret.change_status(next, actor, Utc::now())).await?;
        info!(return_id = %id, status = %ret.status(), "return status changed");
        Ok(ret)
    }

    #[instrument(skip(self, reason), fields(return_id = %id), err)]
    pub async fn cancel_return(&self, id: ReturnId, reason: Option<&str>, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        let ret = self.edit(id, |ret| ret.cancel(reason, actor, Utc::now())).await?;
        info!(return_id = %id, "rental return cancelled");
        Ok(ret)
    }

    #[instrument(skip(self), fields(return_id = %id), err)]
    pub async fn delete_return(&self, id: ReturnId, actor: Option<UserId>) -> ServiceResult<()> {
        self.edit(id, |ret| ret.delete(actor, Utc::now())).await?;
        info!(return_id = %id, "rental return deleted");
        Ok(())
    }

    // ── lines ───────────────────────────────────────────────────────────────

    #[instrument(skip(self, input), fields(return_id = %id, unit_id = %input.inventory_unit_id), err)]
    pub async fn add_line(&self, id: ReturnId, input: &ReturnLineInput, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        load_active(&*self.stores.units, input.inventory_unit_id, "inventory unit").await?;
        if let Some(original) = input.original_line_id {
            let ret = self.get_return(id).await?;
            let rental = load_active(&*self.stores.transactions, ret.rental_transaction_id(), "transaction").await?;
            if rental.line(original).is_none() {
                return Err(DomainError::not_found(format!("transaction line {original}")).into());
            }
        }
        self.edit(id, |ret| ret.add_line(ReturnLineId::new(), input, actor, Utc::now()).map(|_| ()))
            .await
    }

    pub async fn update_line(
        &self,
        id: ReturnId,
        line_id: ReturnLineId,
        update: &ReturnLineUpdate,
        actor: Option<UserId>,
    ) -> ServiceResult<RentalReturn> {
        self.edit(id, |ret| ret.update_line(line_id, update, actor, Utc::now())).await
    }

    pub async fn remove_line(&self, id: ReturnId, line_id: ReturnLineId, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        self.edit(id, |ret| ret.remove_line(line_id, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(return_id = %id, line_id = %line_id), err)]
    pub async fn set_line_status(
        &self,
        id: ReturnId,
        line_id: ReturnLineId,
        next: ReturnLineStatus,
        actor: Option<UserId>,
    ) -> ServiceResult<RentalReturn> {
        self.edit(id, |ret| ret.set_line_status(line_id, next, actor, Utc::now())).await
    }

    #[instrument(skip(self, description), fields(return_id = %id, line_id = %line_id, ?level), err)]
    pub async fn assess_damage(
        &self,
        id: ReturnId,
        line_id: ReturnLineId,
        level: DamageLevel,
        estimate: Option<Money>,
        description: Option<&str>,
        actor: Option<UserId>,
    ) -> ServiceResult<RentalReturn> {
        self.edit(id, |ret| {
            ret.assess_damage(line_id, level, estimate, description, actor, Utc::now())
        })
        .await
    }

    pub async fn set_line_fees(
        &self,
        id: ReturnId,
        line_id: ReturnLineId,
        late_fee: Option<Money>,
        damage_fee: Option<Money>,
        actor: Option<UserId>,
    ) -> ServiceResult<RentalReturn> {
        self.edit(id, |ret| ret.set_line_fees(line_id, late_fee, damage_fee, actor, Utc::now()))
            .await
    }

    /// Returns the new late-fee total.
    #[instrument(skip(self), fields(return_id = %id), err)]
    pub async fn calculate_late_fees(
        &self,
        id: ReturnId,
        daily_rate: Option<Money>,
        actor: Option<UserId>,
    ) -> ServiceResult<(RentalReturn, Money)> {
        self.with_return(id, |ret| ret.calculate_late_fees(daily_rate, actor, Utc::now()))
            .await
    }

    /// Without an explicit amount the rental's collected deposit is used.
    #[instrument(skip(self), fields(return_id = %id), err)]
    pub async fn release_deposit(
        &self,
        id: ReturnId,
        deposit: Option<Money>,
        actor: Option<UserId>,
    ) -> ServiceResult<(RentalReturn, Money)> {
        let deposit = match deposit {
            Some(amount) => amount,
            None => {
                let ret = self.get_return(id).await?;
                load_active(&*self.stores.transactions, ret.rental_transaction_id(), "transaction")
                    .await?
                    .deposit_amount()
            }
        };
        self.with_return(id, |ret| ret.release_deposit(deposit, actor, Utc::now()))
            .await
    }

    /// Completes the return, applies returned quantities to the rental and
    /// brings rented units back into stock.
    ///
    /// Every change is computed first and written in one batch: units,
    /// rental, return and customer history land together or not at all.
    #[instrument(skip(self), fields(return_id = %id), err)]
    pub async fn finalize(&self, id: ReturnId, actor: Option<UserId>) -> ServiceResult<RentalReturn> {
        let _guard = self.write_lock.lock().await;
        let _units_guard = self.units_lock.lock().await;
        let mut ret = load_active(&*self.stores.returns, id, "rental return").await?;
        let mut rental = load_active(&*self.stores.transactions, ret.rental_transaction_id(), "transaction").await?;
        let was_completed = rental.status() == TransactionStatus::Completed;
        let now = Utc::now();
        ret.finalize(&mut rental, actor, now)?;

        let mut units = Vec::new();
        for line in ret.lines() {
            let Some(mut unit) = self.stores.units.get(line.inventory_unit_id()).await? else {
                warn!(unit_id = %line.inventory_unit_id(), "returned unit no longer exists");
                continue;
            };
            if unit.status() == UnitStatus::Rented {
                unit.return_from_rent(line.condition_on_return(), actor, now)?;
                units.push(unit);
            }
        }

        let mut batch = DocumentBatch::new();
        batch.put_all(&units)?.put(&rental)?.put(&ret)?;
        if !was_completed && rental.status() == TransactionStatus::Completed {
            stage_party_activity(&self.stores, &rental, &mut batch).await?;
        }
        self.stores.batch.commit(batch).await?;
        info!(
            return_id = %id,
            rental_id = %rental.id_typed(),
            refund = %ret.total_refund_amount(),
            "rental return finalized"
        );
        Ok(ret)
    }

    // ── reports ─────────────────────────────────────────────────────────────

    pub async fn overdue_returns(&self, today: NaiveDate) -> ServiceResult<Vec<RentalReturn>> {
        let returns = list_active(&*self.stores.returns).await?;
        Ok(rental_return::overdue_returns(&returns, today).into_iter().cloned().collect())
    }

    pub async fn returns_due_today(&self, today: NaiveDate) -> ServiceResult<Vec<RentalReturn>> {
        let returns = list_active(&*self.stores.returns).await?;
        Ok(rental_return::returns_due_today(&returns, today).into_iter().cloned().collect())
    }

    pub async fn pending_inspections(&self) -> ServiceResult<Vec<RentalReturn>> {
        let returns = list_active(&*self.stores.returns).await?;
        Ok(rental_return::pending_inspections(&returns).into_iter().cloned().collect())
    }
}
