//! Rental returns: inspection workflow, fees and deposit release.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{
    AuditStamp, DomainError, DomainResult, Entity, LineId, Money, ReturnId, ReturnLineId, TransactionId, UnitId,
    UserId, validate,
};
use rentdesk_inventory::UnitCondition;

use crate::transaction::{Transaction, TransactionStatus, TransactionType};

/// Default late fee per unit per day (10.00).
pub const DEFAULT_DAILY_LATE_FEE: Money = Money::from_minor(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnType {
    Full,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    #[default]
    Initiated,
    InInspection,
    PartiallyCompleted,
    Completed,
    Cancelled,
}

impl ReturnStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnStatus::Initiated => "INITIATED",
            ReturnStatus::InInspection => "IN_INSPECTION",
            ReturnStatus::PartiallyCompleted => "PARTIALLY_COMPLETED",
            ReturnStatus::Completed => "COMPLETED",
            ReturnStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(self, next: ReturnStatus) -> bool {
        use ReturnStatus::*;
        matches!(
            (self, next),
            (Initiated, InInspection | Cancelled)
                | (InInspection, PartiallyCompleted | Completed | Cancelled)
                | (PartiallyCompleted, InInspection | Completed | Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReturnStatus::Completed | ReturnStatus::Cancelled)
    }
}

impl core::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageLevel {
    #[default]
    None,
    Minor,
    Moderate,
    Major,
    TotalLoss,
}

impl DamageLevel {
    pub fn default_fee(self) -> Money {
        match self {
            DamageLevel::None => Money::zero(),
            DamageLevel::Minor => Money::from_major(50),
            DamageLevel::Moderate => Money::from_major(150),
            DamageLevel::Major => Money::from_major(300),
            DamageLevel::TotalLoss => Money::from_major(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnLineStatus {
    #[default]
    Pending,
    Inspected,
    Processed,
    Disputed,
    Resolved,
}

impl ReturnLineStatus {
    pub fn can_transition_to(self, next: ReturnLineStatus) -> bool {
        use ReturnLineStatus::*;
        matches!(
            (self, next),
            (Pending, Inspected | Disputed) | (Inspected, Processed | Disputed) | (Disputed, Resolved)
        )
    }

    pub fn is_settled(self) -> bool {
        matches!(self, ReturnLineStatus::Processed | ReturnLineStatus::Resolved)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnInput {
    pub rental_transaction_id: TransactionId,
    pub return_date: NaiveDate,
    /// Falls back to the rental's end date.
    #[serde(default)]
    pub expected_return_date: Option<NaiveDate>,
    pub return_type: ReturnType,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReturnUpdate {
    pub return_date: Option<NaiveDate>,
    pub expected_return_date: Option<NaiveDate>,
    pub return_type: Option<ReturnType>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnLineInput {
    pub inventory_unit_id: UnitId,
    #[serde(default)]
    pub original_line_id: Option<LineId>,
    #[serde(default = "one")]
    pub original_quantity: i64,
    #[serde(default = "one")]
    pub returned_quantity: i64,
    #[serde(default)]
    pub condition_on_return: Option<UnitCondition>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReturnLineUpdate {
    pub returned_quantity: Option<i64>,
    pub condition_on_return: Option<UnitCondition>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    id: ReturnLineId,
    inventory_unit_id: UnitId,
    original_line_id: Option<LineId>,
    original_quantity: i64,
    returned_quantity: i64,
    condition_on_return: Option<UnitCondition>,
    damage_level: DamageLevel,
    damage_description: Option<String>,
    late_fee: Money,
    damage_fee: Money,
    status: ReturnLineStatus,
    notes: Option<String>,
}

fn check_fee(field: &str, amount: Money) -> DomainResult<Money> {
    validate::non_negative(field, amount).and_then(|amount| validate::amount(field, amount))
}

fn check_quantities(original: i64, returned: i64) -> DomainResult<()> {
    if original < 1 {
        return Err(DomainError::validation("original quantity must be at least 1"));
    }
    validate::quantity("original quantity", original)?;
    if returned < 0 {
        return Err(DomainError::validation("returned quantity cannot be negative"));
    }
    if returned > original {
        return Err(DomainError::validation(
            "returned quantity cannot exceed original quantity",
        ));
    }
    Ok(())
}

fn sum_quantities(mut quantities: impl Iterator<Item = i64>) -> DomainResult<i64> {
    quantities.try_fold(0i64, |acc, q| {
        acc.checked_add(q)
            .ok_or_else(|| DomainError::validation("returned quantities out of range"))
    })
}

impl ReturnLine {
    fn new(id: ReturnLineId, input: &ReturnLineInput) -> DomainResult<Self> {
        check_quantities(input.original_quantity, input.returned_quantity)?;
        Ok(Self {
            id,
            inventory_unit_id: input.inventory_unit_id,
            original_line_id: input.original_line_id,
            original_quantity: input.original_quantity,
            returned_quantity: input.returned_quantity,
            condition_on_return: input.condition_on_return,
            damage_level: DamageLevel::None,
            damage_description: None,
            late_fee: Money::zero(),
            damage_fee: Money::zero(),
            status: ReturnLineStatus::Pending,
            notes: validate::optional_text("notes", input.notes.as_deref(), 1000)?,
        })
    }

    pub fn id_typed(&self) -> ReturnLineId {
        self.id
    }

    pub fn inventory_unit_id(&self) -> UnitId {
        self.inventory_unit_id
    }

    pub fn original_line_id(&self) -> Option<LineId> {
        self.original_line_id
    }

    pub fn original_quantity(&self) -> i64 {
        self.original_quantity
    }

    pub fn returned_quantity(&self) -> i64 {
        self.returned_quantity
    }

    pub fn condition_on_return(&self) -> Option<UnitCondition> {
        self.condition_on_return
    }

    pub fn damage_level(&self) -> DamageLevel {
        self.damage_level
    }

    pub fn late_fee(&self) -> Money {
        self.late_fee
    }

    pub fn damage_fee(&self) -> Money {
        self.damage_fee
    }

    pub fn status(&self) -> ReturnLineStatus {
        self.status
    }

    pub fn total_fees(&self) -> Money {
        self.late_fee + self.damage_fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalReturn {
    id: ReturnId,
    rental_transaction_id: TransactionId,
    return_date: NaiveDate,
    expected_return_date: NaiveDate,
    return_type: ReturnType,
    status: ReturnStatus,
    processed_by: Option<UserId>,
    notes: Option<String>,
    lines: Vec<ReturnLine>,
    total_late_fee: Money,
    total_damage_fee: Money,
    deposit_release_amount: Money,
    total_refund_amount: Money,
    audit: AuditStamp,
}

impl Entity for RentalReturn {
    type Id = ReturnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

/// A rental may have at most one return that is still open.
pub fn ensure_no_open_return<'a>(
    rental_id: TransactionId,
    existing: impl IntoIterator<Item = &'a RentalReturn>,
) -> DomainResult<()> {
    let open = existing.into_iter().any(|r| {
        r.is_active() && r.rental_transaction_id == rental_id && !r.status.is_terminal()
    });
    if open {
        return Err(DomainError::conflict(format!(
            "rental {rental_id} already has an open return"
        )));
    }
    Ok(())
}

impl RentalReturn {
    pub fn create(
        id: ReturnId,
        input: &ReturnInput,
        rental: &Transaction,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if rental.id_typed() != input.rental_transaction_id {
            return Err(DomainError::invariant("rental transaction mismatch"));
        }
        if !rental.is_active() {
            return Err(DomainError::not_found(format!("transaction {}", rental.id_typed())));
        }
        if rental.transaction_type() != TransactionType::Rental {
            return Err(DomainError::validation("transaction is not a rental"));
        }
        let expected_return_date = input
            .expected_return_date
            .or(rental.rental_end_date())
            .ok_or_else(|| DomainError::validation("expected return date is required"))?;
        Ok(Self {
            id,
            rental_transaction_id: input.rental_transaction_id,
            return_date: input.return_date,
            expected_return_date,
            return_type: input.return_type,
            status: ReturnStatus::Initiated,
            processed_by: None,
            notes: validate::optional_text("notes", input.notes.as_deref(), 1000)?,
            lines: Vec::new(),
            total_late_fee: Money::zero(),
            total_damage_fee: Money::zero(),
            deposit_release_amount: Money::zero(),
            total_refund_amount: Money::zero(),
            audit: AuditStamp::new(actor, now),
        })
    }

    pub fn id_typed(&self) -> ReturnId {
        self.id
    }

    pub fn rental_transaction_id(&self) -> TransactionId {
        self.rental_transaction_id
    }

    pub fn return_date(&self) -> NaiveDate {
        self.return_date
    }

    pub fn expected_return_date(&self) -> NaiveDate {
        self.expected_return_date
    }

    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }

    pub fn status(&self) -> ReturnStatus {
        self.status
    }

    pub fn processed_by(&self) -> Option<UserId> {
        self.processed_by
    }

    pub fn lines(&self) -> &[ReturnLine] {
        &self.lines
    }

    pub fn total_late_fee(&self) -> Money {
        self.total_late_fee
    }

    pub fn total_damage_fee(&self) -> Money {
        self.total_damage_fee
    }

    pub fn deposit_release_amount(&self) -> Money {
        self.deposit_release_amount
    }

    pub fn total_refund_amount(&self) -> Money {
        self.total_refund_amount
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    pub fn days_late(&self) -> i64 {
        (self.return_date - self.expected_return_date).num_days().max(0)
    }

    pub fn is_late(&self) -> bool {
        self.days_late() > 0
    }

    pub fn update(&mut self, update: &ReturnUpdate, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        let notes = match update.notes.as_deref() {
            Some(notes) => validate::optional_text("notes", Some(notes), 1000)?,
            None => self.notes.clone(),
        };
        if let Some(date) = update.return_date {
            self.return_date = date;
        }
        if let Some(date) = update.expected_return_date {
            self.expected_return_date = date;
        }
        if let Some(kind) = update.return_type {
            self.return_type = kind;
        }
        self.notes = notes;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn change_status(&mut self, next: ReturnStatus, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        match next {
            ReturnStatus::Cancelled => return self.cancel(None, actor, now),
            ReturnStatus::Completed => {
                return Err(DomainError::invariant("use finalize to complete a return"));
            }
            _ => {}
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "cannot transition from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn add_line(
        &mut self,
        line_id: ReturnLineId,
        input: &ReturnLineInput,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<&ReturnLine> {
        self.ensure_editable()?;
        if self
            .lines
            .iter()
            .any(|l| l.inventory_unit_id == input.inventory_unit_id)
        {
            return Err(DomainError::conflict(format!(
                "unit {} is already part of this return",
                input.inventory_unit_id
            )));
        }
        let line = ReturnLine::new(line_id, input)?;
        self.lines.push(line);
        if let Err(err) = self.recalculate_totals() {
            self.lines.pop();
            return Err(err);
        }
        self.audit.touch(actor, now);
        let index = self.lines.len() - 1;
        Ok(&self.lines[index])
    }

    pub fn update_line(
        &mut self,
        line_id: ReturnLineId,
        update: &ReturnLineUpdate,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line(line_id, actor, now, |line| {
            let returned = update.returned_quantity.unwrap_or(line.returned_quantity);
            check_quantities(line.original_quantity, returned)?;
            let notes = match update.notes.as_deref() {
                Some(notes) => validate::optional_text("notes", Some(notes), 1000)?,
                None => line.notes.clone(),
            };
            line.returned_quantity = returned;
            if update.condition_on_return.is_some() {
                line.condition_on_return = update.condition_on_return;
            }
            line.notes = notes;
            Ok(())
        })
    }

    pub fn remove_line(&mut self, line_id: ReturnLineId, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        let index = self.line_index(line_id)?;
        let removed = self.lines.remove(index);
        if let Err(err) = self.recalculate_totals() {
            self.lines.insert(index, removed);
            return Err(err);
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn set_line_status(
        &mut self,
        line_id: ReturnLineId,
        next: ReturnLineStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line(line_id, actor, now, |line| {
            if !line.status.can_transition_to(next) {
                return Err(DomainError::invariant(format!(
                    "cannot move return line from {:?} to {:?}",
                    line.status, next
                )));
            }
            line.status = next;
            Ok(())
        })
    }

    /// Record damage; without an estimate the level's default fee applies.
    pub fn assess_damage(
        &mut self,
        line_id: ReturnLineId,
        level: DamageLevel,
        estimate: Option<Money>,
        description: Option<&str>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let fee = match estimate {
            Some(amount) => check_fee("damage estimate", amount)?,
            None => level.default_fee(),
        };
        let description = validate::optional_text("damage description", description, 1000)?;
        self.with_line(line_id, actor, now, |line| {
            line.damage_level = level;
            line.damage_fee = fee;
            line.damage_description = description;
            if level != DamageLevel::None {
                line.condition_on_return = Some(UnitCondition::Damaged);
            }
            Ok(())
        })
    }

    pub fn set_line_fees(
        &mut self,
        line_id: ReturnLineId,
        late_fee: Option<Money>,
        damage_fee: Option<Money>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let late_fee = late_fee.map(|f| check_fee("late fee", f)).transpose()?;
        let damage_fee = damage_fee.map(|f| check_fee("damage fee", f)).transpose()?;
        self.with_line(line_id, actor, now, |line| {
            if let Some(fee) = late_fee {
                line.late_fee = fee;
            }
            if let Some(fee) = damage_fee {
                line.damage_fee = fee;
            }
            Ok(())
        })
    }

    /// Late fee per line = returned quantity × daily rate × days late.
    pub fn calculate_late_fees(
        &mut self,
        daily_rate: Option<Money>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Money> {
        self.ensure_editable()?;
        let rate = check_fee("daily rate", daily_rate.unwrap_or(DEFAULT_DAILY_LATE_FEE))?;
        let days = self.days_late();
        let mut next = self.clone();
        for line in &mut next.lines {
            line.late_fee = rate.checked_times(line.returned_quantity)?.checked_times(days)?;
        }
        next.recalculate_totals()?;
        *self = next;
        self.audit.touch(actor, now);
        Ok(self.total_late_fee)
    }

    /// Free the returned share of the deposit and derive the refund from it.
    pub fn release_deposit(
        &mut self,
        original_deposit: Money,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Money> {
        self.ensure_editable()?;
        let deposit = check_fee("deposit", original_deposit)?;
        let original = sum_quantities(self.lines.iter().map(|l| l.original_quantity))?;
        let returned = sum_quantities(self.lines.iter().map(|l| l.returned_quantity))?;
        let mut next = self.clone();
        next.deposit_release_amount = deposit.prorate(returned, original);
        next.recalculate_totals()?;
        *self = next;
        self.audit.touch(actor, now);
        Ok(self.total_refund_amount)
    }

    /// Fee and refund totals from the lines. Overflow leaves them unchanged.
    pub fn recalculate_totals(&mut self) -> DomainResult<()> {
        let late = Money::checked_sum(self.lines.iter().map(|l| l.late_fee))?;
        let damage = Money::checked_sum(self.lines.iter().map(|l| l.damage_fee))?;
        let refund = self
            .deposit_release_amount
            .checked_sub(late)?
            .checked_sub(damage)?
            .non_negative();
        self.total_late_fee = late;
        self.total_damage_fee = damage;
        self.total_refund_amount = refund;
        Ok(())
    }

    /// Complete the return and record returned quantities on the rental.
    ///
    /// A FULL return also completes the rental when it is in progress. A
    /// rental that already carries this return is left as is, so finalizing
    /// again after a partial write does not book quantities twice. On error
    /// `rental` may be partially updated; callers work on a copy.
    pub fn finalize(&mut self, rental: &mut Transaction, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        if rental.id_typed() != self.rental_transaction_id {
            return Err(DomainError::invariant("rental transaction mismatch"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::invariant("cannot finalize a return without lines"));
        }
        if let Some(open) = self.lines.iter().find(|l| !l.status.is_settled()) {
            return Err(DomainError::invariant(format!(
                "return line {} is still {:?}",
                open.id, open.status
            )));
        }
        self.recalculate_totals()?;
        if !rental.has_applied_return(self.id) {
            for line in &self.lines {
                if let Some(original_line) = line.original_line_id {
                    if line.returned_quantity > 0 {
                        rental.process_line_return(
                            original_line,
                            line.returned_quantity,
                            self.return_date,
                            None,
                            actor,
                            now,
                        )?;
                    }
                }
            }
            if self.return_type == ReturnType::Full && rental.status() == TransactionStatus::InProgress {
                rental.complete_rental_return(self.return_date, actor, now)?;
            }
            rental.mark_return_applied(self.id);
        }
        self.status = ReturnStatus::Completed;
        self.processed_by = actor;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<&str>, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot cancel a {} return",
                self.status
            )));
        }
        let reason = validate::optional_text("reason", reason, 500)?;
        self.status = ReturnStatus::Cancelled;
        if let Some(reason) = reason {
            let entry = format!("[CANCELLED] {}: {reason}", now.to_rfc3339());
            self.notes = Some(match self.notes.take() {
                Some(existing) => format!("{existing}\n{entry}"),
                None => entry,
            });
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.status != ReturnStatus::Initiated {
            return Err(DomainError::invariant(format!(
                "cannot delete a {} return",
                self.status
            )));
        }
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn with_line(
        &mut self,
        line_id: ReturnLineId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
        change: impl FnOnce(&mut ReturnLine) -> DomainResult<()>,
    ) -> DomainResult<()> {
        self.ensure_editable()?;
        let index = self.line_index(line_id)?;
        let before = self.lines[index].clone();
        change(&mut self.lines[index])?;
        if let Err(err) = self.recalculate_totals() {
            self.lines[index] = before;
            return Err(err);
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    fn line_index(&self, line_id: ReturnLineId) -> DomainResult<usize> {
        self.lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(format!("return line {line_id}")))
    }

    fn ensure_editable(&self) -> DomainResult<()> {
        self.ensure_active()?;
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot modify a {} return",
                self.status
            )));
        }
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("return {}", self.id)));
        }
        Ok(())
    }
}

/// Open returns whose expected date has passed.
pub fn overdue_returns<'a>(
    returns: impl IntoIterator<Item = &'a RentalReturn>,
    today: NaiveDate,
) -> Vec<&'a RentalReturn> {
    returns
        .into_iter()
        .filter(|r| r.is_active() && !r.status.is_terminal() && r.expected_return_date < today)
        .collect()
}

pub fn returns_due_today<'a>(
    returns: impl IntoIterator<Item = &'a RentalReturn>,
    today: NaiveDate,
) -> Vec<&'a RentalReturn> {
    returns
        .into_iter()
        .filter(|r| r.is_active() && !r.status.is_terminal() && r.expected_return_date == today)
        .collect()
}

pub fn pending_inspections<'a>(returns: impl IntoIterator<Item = &'a RentalReturn>) -> Vec<&'a RentalReturn> {
    returns
        .into_iter()
        .filter(|r| r.is_active() && r.status == ReturnStatus::InInspection)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::{day, in_progress_rental, sale_input, test_time};

    fn open_return(rental: &Transaction, returned_on: NaiveDate, kind: ReturnType) -> RentalReturn {
        let input = ReturnInput {
            rental_transaction_id: rental.id_typed(),
            return_date: returned_on,
            expected_return_date: None,
            return_type: kind,
            notes: None,
        };
        RentalReturn::create(ReturnId::new(), &input, rental, None, test_time()).unwrap()
    }

    fn line_for(rental: &Transaction, returned: i64) -> ReturnLineInput {
        ReturnLineInput {
            inventory_unit_id: UnitId::new(),
            original_line_id: Some(rental.lines()[0].id_typed()),
            original_quantity: rental.lines()[0].quantity(),
            returned_quantity: returned,
            condition_on_return: Some(UnitCondition::Good),
            notes: None,
        }
    }

    fn settle(ret: &mut RentalReturn) {
        let ids: Vec<ReturnLineId> = ret.lines().iter().map(|l| l.id_typed()).collect();
        for id in ids {
            ret.set_line_status(id, ReturnLineStatus::Inspected, None, test_time()).unwrap();
            ret.set_line_status(id, ReturnLineStatus::Processed, None, test_time()).unwrap();
        }
    }

    #[test]
    fn only_rentals_can_be_returned() {
        let sale = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        let input = ReturnInput {
            rental_transaction_id: sale.id_typed(),
            return_date: day(2),
            expected_return_date: Some(day(2)),
            return_type: ReturnType::Full,
            notes: None,
        };
        assert!(matches!(
            RentalReturn::create(ReturnId::new(), &input, &sale, None, test_time()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn one_open_return_per_rental() {
        let rental = in_progress_rental();
        let mut first = open_return(&rental, day(5), ReturnType::Full);
        assert!(matches!(
            ensure_no_open_return(rental.id_typed(), [&first]),
            Err(DomainError::Conflict(_))
        ));
        first.cancel(Some("wrong unit"), None, test_time()).unwrap();
        assert!(ensure_no_open_return(rental.id_typed(), [&first]).is_ok());
    }

    #[test]
    fn status_table_is_enforced() {
        let rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Full);
        assert!(ret.change_status(ReturnStatus::PartiallyCompleted, None, test_time()).is_err());
        ret.change_status(ReturnStatus::InInspection, None, test_time()).unwrap();
        ret.change_status(ReturnStatus::PartiallyCompleted, None, test_time()).unwrap();
        ret.change_status(ReturnStatus::InInspection, None, test_time()).unwrap();
        assert!(ret.change_status(ReturnStatus::Completed, None, test_time()).is_err());
        assert!(ret.delete(None, test_time()).is_err());
    }

    #[test]
    fn duplicate_unit_conflicts() {
        let rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Full);
        let input = line_for(&rental, 1);
        ret.add_line(ReturnLineId::new(), &input, None, test_time()).unwrap();
        assert!(matches!(
            ret.add_line(ReturnLineId::new(), &input, None, test_time()),
            Err(DomainError::Conflict(_))
        ));
        let mut too_many = line_for(&rental, 3);
        too_many.inventory_unit_id = UnitId::new();
        assert!(ret.add_line(ReturnLineId::new(), &too_many, None, test_time()).is_err());
    }

    #[test]
    fn damage_defaults_and_estimates() {
        let rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Full);
        let line = ret.add_line(ReturnLineId::new(), &line_for(&rental, 2), None, test_time()).unwrap().id_typed();

        ret.assess_damage(line, DamageLevel::Moderate, None, Some("cracked lid"), None, test_time()).unwrap();
        assert_eq!(ret.total_damage_fee(), Money::from_major(150));
        assert_eq!(ret.lines()[0].condition_on_return(), Some(UnitCondition::Damaged));

        ret.assess_damage(line, DamageLevel::Major, Some(Money::from_major(220)), None, None, test_time()).unwrap();
        assert_eq!(ret.total_damage_fee(), Money::from_major(220));
    }

    #[test]
    fn late_fees_scale_with_days_and_quantity() {
        let rental = in_progress_rental();
        // rental ends on the 5th
        let mut ret = open_return(&rental, day(8), ReturnType::Full);
        ret.add_line(ReturnLineId::new(), &line_for(&rental, 2), None, test_time()).unwrap();
        assert_eq!(ret.days_late(), 3);

        let total = ret.calculate_late_fees(None, None, test_time()).unwrap();
        assert_eq!(total, Money::from_major(60));
        let total = ret.calculate_late_fees(Some(Money::from_major(5)), None, test_time()).unwrap();
        assert_eq!(total, Money::from_major(30));
    }

    #[test]
    fn late_fee_overflow_is_rejected_and_fees_kept() {
        let rental = in_progress_rental();
        let far_future = NaiveDate::from_ymd_opt(200_000, 1, 1).unwrap();
        let mut ret = open_return(&rental, far_future, ReturnType::Full);
        let line = ret.add_line(ReturnLineId::new(), &line_for(&rental, 2), None, test_time()).unwrap().id_typed();
        ret.set_line_fees(line, Some(Money::from_major(7)), None, None, test_time()).unwrap();

        let err = ret.calculate_late_fees(Some(Money::MAX), None, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(ret.total_late_fee(), Money::from_major(7));
        assert_eq!(ret.lines()[0].late_fee(), Money::from_major(7));

        assert!(ret.set_line_fees(line, None, Some(Money::from_minor(Money::MAX.minor() + 1)), None, test_time()).is_err());
        assert!(ret.release_deposit(Money::from_minor(i64::MAX), None, test_time()).is_err());
    }

    #[test]
    fn deposit_release_nets_fees_once() {
        let rental = in_progress_rental();
        let mut ret = open_return(&rental, day(6), ReturnType::Partial);
        let line = ret.add_line(ReturnLineId::new(), &line_for(&rental, 1), None, test_time()).unwrap().id_typed();
        ret.calculate_late_fees(None, None, test_time()).unwrap();
        ret.assess_damage(line, DamageLevel::Minor, None, None, None, test_time()).unwrap();

        // half of 200.00 released, minus 10.00 late and 50.00 damage
        let refund = ret.release_deposit(Money::from_major(200), None, test_time()).unwrap();
        assert_eq!(ret.deposit_release_amount(), Money::from_major(100));
        assert_eq!(refund, Money::from_major(40));

        ret.set_line_fees(line, None, Some(Money::from_major(500)), None, test_time()).unwrap();
        assert_eq!(ret.total_refund_amount(), Money::zero());
    }

    #[test]
    fn finalize_full_return_completes_rental() {
        let mut rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Full);
        ret.add_line(ReturnLineId::new(), &line_for(&rental, 2), None, test_time()).unwrap();
        assert!(ret.finalize(&mut rental.clone(), None, test_time()).is_err());

        settle(&mut ret);
        let actor = Some(UserId::new());
        ret.finalize(&mut rental, actor, test_time()).unwrap();
        assert_eq!(ret.status(), ReturnStatus::Completed);
        assert_eq!(ret.processed_by(), actor);
        assert_eq!(rental.status(), TransactionStatus::Completed);
        assert!(rental.lines()[0].is_fully_returned());
        assert!(ret.cancel(None, None, test_time()).is_err());
    }

    #[test]
    fn finalize_partial_return_keeps_rental_open() {
        let mut rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Partial);
        ret.add_line(ReturnLineId::new(), &line_for(&rental, 1), None, test_time()).unwrap();
        settle(&mut ret);
        ret.finalize(&mut rental, None, test_time()).unwrap();
        assert_eq!(rental.status(), TransactionStatus::InProgress);
        assert!(rental.lines()[0].is_partially_returned());
    }

    #[test]
    fn refinalizing_against_an_updated_rental_books_once() {
        let mut rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Partial);
        ret.add_line(ReturnLineId::new(), &line_for(&rental, 1), None, test_time()).unwrap();
        settle(&mut ret);
        let pending = ret.clone();

        ret.finalize(&mut rental, None, test_time()).unwrap();
        assert!(rental.has_applied_return(ret.id_typed()));
        assert_eq!(rental.lines()[0].returned_quantity(), 1);

        // The rental was saved but the return was not: finalize the stored copy again.
        let mut retry = pending;
        retry.finalize(&mut rental, None, test_time()).unwrap();
        assert_eq!(retry.status(), ReturnStatus::Completed);
        assert_eq!(rental.lines()[0].returned_quantity(), 1);
    }

    #[test]
    fn line_status_table() {
        let rental = in_progress_rental();
        let mut ret = open_return(&rental, day(5), ReturnType::Full);
        let line = ret.add_line(ReturnLineId::new(), &line_for(&rental, 1), None, test_time()).unwrap().id_typed();
        assert!(ret.set_line_status(line, ReturnLineStatus::Processed, None, test_time()).is_err());
        ret.set_line_status(line, ReturnLineStatus::Disputed, None, test_time()).unwrap();
        ret.set_line_status(line, ReturnLineStatus::Resolved, None, test_time()).unwrap();
        assert!(ret.lines()[0].status().is_settled());
    }

    #[test]
    fn return_reports() {
        let rental = in_progress_rental();
        let late = open_return(&rental, day(9), ReturnType::Full);
        let mut inspecting = open_return(&rental, day(5), ReturnType::Full);
        inspecting.change_status(ReturnStatus::InInspection, None, test_time()).unwrap();
        let all = [late, inspecting];

        assert_eq!(overdue_returns(&all, day(6)).len(), 2);
        assert_eq!(returns_due_today(&all, day(5)).len(), 2);
        assert_eq!(pending_inspections(&all).len(), 1);
    }
}
