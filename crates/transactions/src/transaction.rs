//! Transaction header: status machine, totals and payment bookkeeping.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{
    AuditStamp, BasisPoints, CustomerId, DomainError, DomainResult, Entity, LineId, LocationId,
    Money, ReturnId, SupplierId, TransactionId, UserId, validate,
};

use crate::line::{LineInput, LineType, TransactionLine};

pub const MAX_NUMBER_LENGTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Sale,
    Rental,
    Return,
    Exchange,
    Refund,
    Adjustment,
    Purchase,
}

impl TransactionType {
    /// Prefix used in generated transaction numbers.
    pub fn prefix(self) -> &'static str {
        match self {
            TransactionType::Sale => "SAL",
            TransactionType::Rental => "RNT",
            TransactionType::Return => "RTN",
            TransactionType::Exchange => "EXC",
            TransactionType::Refund => "REF",
            TransactionType::Adjustment => "ADJ",
            TransactionType::Purchase => "PUR",
        }
    }

    pub fn requires_customer(self) -> bool {
        !matches!(self, TransactionType::Purchase | TransactionType::Adjustment)
    }

    pub fn requires_reference(self) -> bool {
        matches!(
            self,
            TransactionType::Return | TransactionType::Refund | TransactionType::Exchange
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Draft,
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Draft => "DRAFT",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Confirmed => "CONFIRMED",
            TransactionStatus::InProgress => "IN_PROGRESS",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Cancelled => "CANCELLED",
            TransactionStatus::Refunded => "REFUNDED",
        }
    }

    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Draft, Pending | Cancelled)
                | (Pending, Confirmed | Cancelled)
                | (Confirmed, InProgress | Cancelled)
                | (InProgress, Completed | Cancelled)
                | (Completed, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Cancelled | TransactionStatus::Refunded)
    }

    /// Header and lines may only change before completion.
    pub fn is_editable(self) -> bool {
        !matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled | TransactionStatus::Refunded
        )
    }
}

impl core::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Refunded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    Check,
    StoreCredit,
    Deposit,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub sales_person_id: Option<UserId>,
    #[serde(default)]
    pub reference_transaction_id: Option<TransactionId>,
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub rental_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub rental_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Header edits; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionUpdate {
    pub location_id: Option<LocationId>,
    pub sales_person_id: Option<UserId>,
    pub due_date: Option<NaiveDate>,
    pub rental_start_date: Option<NaiveDate>,
    pub rental_end_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    transaction_number: String,
    transaction_type: TransactionType,
    status: TransactionStatus,
    payment_status: PaymentStatus,
    payment_method: Option<PaymentMethod>,
    payment_reference: Option<String>,
    customer_id: Option<CustomerId>,
    supplier_id: Option<SupplierId>,
    location_id: Option<LocationId>,
    sales_person_id: Option<UserId>,
    reference_transaction_id: Option<TransactionId>,
    transaction_date: NaiveDate,
    due_date: Option<NaiveDate>,
    rental_start_date: Option<NaiveDate>,
    rental_end_date: Option<NaiveDate>,
    actual_return_date: Option<NaiveDate>,
    subtotal: Money,
    discount_amount: Money,
    tax_amount: Money,
    total_amount: Money,
    paid_amount: Money,
    deposit_amount: Money,
    lines: Vec<TransactionLine>,
    payments: Vec<PaymentRecord>,
    notes: Vec<String>,
    /// Rental returns whose quantities are already booked on the lines.
    #[serde(default)]
    applied_returns: Vec<ReturnId>,
    audit: AuditStamp,
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

fn validate_rental_window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DomainResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(DomainError::validation(
            "rental end date cannot be before start date",
        )),
        _ => Ok(()),
    }
}

impl Transaction {
    pub fn create(
        id: TransactionId,
        transaction_number: &str,
        input: &TransactionInput,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let transaction_number =
            validate::required_text("transaction number", transaction_number, MAX_NUMBER_LENGTH)?;
        let kind = input.transaction_type;
        if kind.requires_customer() && input.customer_id.is_none() {
            return Err(DomainError::validation(format!(
                "{kind:?} transactions require a customer"
            )));
        }
        if kind == TransactionType::Purchase && input.supplier_id.is_none() {
            return Err(DomainError::validation("purchase transactions require a supplier"));
        }
        if kind.requires_reference() && input.reference_transaction_id.is_none() {
            return Err(DomainError::validation(format!(
                "{kind:?} transactions require a reference transaction"
            )));
        }
        if kind == TransactionType::Rental
            && (input.rental_start_date.is_none() || input.rental_end_date.is_none())
        {
            return Err(DomainError::validation(
                "rental transactions require rental start and end dates",
            ));
        }
        validate_rental_window(input.rental_start_date, input.rental_end_date)?;

        let mut transaction = Self {
            id,
            transaction_number,
            transaction_type: kind,
            status: TransactionStatus::Draft,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            payment_reference: validate::optional_text(
                "payment reference",
                input.payment_reference.as_deref(),
                100,
            )?,
            customer_id: input.customer_id,
            supplier_id: input.supplier_id,
            location_id: input.location_id,
            sales_person_id: input.sales_person_id,
            reference_transaction_id: input.reference_transaction_id,
            transaction_date: input.transaction_date,
            due_date: input.due_date,
            rental_start_date: input.rental_start_date,
            rental_end_date: input.rental_end_date,
            actual_return_date: None,
            subtotal: Money::zero(),
            discount_amount: Money::zero(),
            tax_amount: Money::zero(),
            total_amount: Money::zero(),
            paid_amount: Money::zero(),
            deposit_amount: Money::zero(),
            lines: Vec::new(),
            payments: Vec::new(),
            notes: Vec::new(),
            applied_returns: Vec::new(),
            audit: AuditStamp::new(actor, now),
        };
        if let Some(note) = validate::optional_text("notes", input.notes.as_deref(), 1000)? {
            transaction.notes.push(note);
        }
        Ok(transaction)
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn transaction_number(&self) -> &str {
        &self.transaction_number
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn reference_transaction_id(&self) -> Option<TransactionId> {
        self.reference_transaction_id
    }

    pub fn transaction_date(&self) -> NaiveDate {
        self.transaction_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn rental_start_date(&self) -> Option<NaiveDate> {
        self.rental_start_date
    }

    pub fn rental_end_date(&self) -> Option<NaiveDate> {
        self.rental_end_date
    }

    pub fn actual_return_date(&self) -> Option<NaiveDate> {
        self.actual_return_date
    }

    pub fn has_applied_return(&self, return_id: ReturnId) -> bool {
        self.applied_returns.contains(&return_id)
    }

    pub(crate) fn mark_return_applied(&mut self, return_id: ReturnId) {
        if !self.has_applied_return(return_id) {
            self.applied_returns.push(return_id);
        }
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    pub fn deposit_amount(&self) -> Money {
        self.deposit_amount
    }

    pub fn lines(&self) -> &[TransactionLine] {
        &self.lines
    }

    pub fn line(&self, line_id: LineId) -> Option<&TransactionLine> {
        self.lines.iter().find(|l| l.id_typed() == line_id)
    }

    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    pub fn balance_due(&self) -> Money {
        (self.total_amount - self.paid_amount).non_negative()
    }

    /// Inclusive day count of the rental window.
    pub fn rental_days(&self) -> Option<i64> {
        match (self.rental_start_date, self.rental_end_date) {
            (Some(start), Some(end)) => Some((end - start + Duration::days(1)).num_days()),
            _ => None,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_terminal()
            && self.due_date.is_some_and(|due| due < today)
            && self.balance_due().is_positive()
    }

    pub fn is_rental_overdue(&self, today: NaiveDate) -> bool {
        self.transaction_type == TransactionType::Rental
            && matches!(
                self.status,
                TransactionStatus::Confirmed | TransactionStatus::InProgress
            )
            && self.actual_return_date.is_none()
            && self.rental_end_date.is_some_and(|end| end < today)
    }

    pub fn update(
        &mut self,
        update: &TransactionUpdate,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable()?;
        let start = update.rental_start_date.or(self.rental_start_date);
        let end = update.rental_end_date.or(self.rental_end_date);
        validate_rental_window(start, end)?;
        let payment_reference = match update.payment_reference.as_deref() {
            Some(reference) => validate::optional_text("payment reference", Some(reference), 100)?,
            None => self.payment_reference.clone(),
        };
        let note = validate::optional_text("notes", update.note.as_deref(), 1000)?;

        if update.location_id.is_some() {
            self.location_id = update.location_id;
        }
        if update.sales_person_id.is_some() {
            self.sales_person_id = update.sales_person_id;
        }
        if update.due_date.is_some() {
            self.due_date = update.due_date;
        }
        if update.payment_method.is_some() {
            self.payment_method = update.payment_method;
        }
        self.rental_start_date = start;
        self.rental_end_date = end;
        self.payment_reference = payment_reference;
        if let Some(note) = note {
            self.notes.push(note);
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn change_status(
        &mut self,
        next: TransactionStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        match next {
            TransactionStatus::Cancelled => return self.cancel(None, actor, now),
            TransactionStatus::Refunded => {
                return Err(DomainError::invariant("use refund to refund a transaction"));
            }
            _ => {}
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "cannot transition from {} to {}",
                self.status, next
            )));
        }
        if next == TransactionStatus::Confirmed && self.lines.is_empty() {
            return Err(DomainError::invariant("cannot confirm a transaction without lines"));
        }
        if next == TransactionStatus::Completed && self.transaction_type == TransactionType::Rental {
            return Err(DomainError::invariant(
                "rental transactions are completed by processing their return",
            ));
        }
        self.status = next;
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Recompute the header amounts from the lines. Overflow leaves the header unchanged.
    pub fn calculate_totals(&mut self) -> DomainResult<()> {
        let mut subtotal = Money::zero();
        let mut discount = Money::zero();
        let mut tax = Money::zero();
        let mut deposit = Money::zero();
        for line in &self.lines {
            match line.line_type() {
                t if t.is_chargeable() => {
                    subtotal = subtotal.checked_add(line.pre_tax_amount())?;
                    tax = tax.checked_add(line.tax_amount())?;
                }
                LineType::Discount => discount = discount.checked_add(line.line_total())?,
                LineType::Tax => tax = tax.checked_add(line.line_total())?,
                LineType::Deposit => deposit = deposit.checked_add(line.line_total())?,
                _ => {}
            }
        }
        let discount = discount.abs();
        let total = subtotal.checked_sub(discount)?.checked_add(tax)?.non_negative();
        self.subtotal = subtotal;
        self.discount_amount = discount;
        self.tax_amount = tax;
        self.deposit_amount = deposit;
        self.total_amount = total;
        Ok(())
    }

    pub fn apply_payment(
        &mut self,
        amount: Money,
        method: PaymentMethod,
        reference: Option<&str>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        if !amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Confirmed | TransactionStatus::InProgress
        ) {
            return Err(DomainError::invariant(format!(
                "cannot apply payment to a {} transaction",
                self.status
            )));
        }
        if amount > self.balance_due() {
            return Err(DomainError::validation(format!(
                "payment {amount} exceeds balance due {}",
                self.balance_due()
            )));
        }
        let reference = validate::optional_text("payment reference", reference, 100)?;

        self.paid_amount += amount;
        self.payment_status = if self.paid_amount >= self.total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::PartiallyPaid
        };
        self.payment_method = Some(method);
        if reference.is_some() {
            self.payment_reference = reference.clone();
        }
        self.payments.push(PaymentRecord {
            amount,
            method,
            reference,
            recorded_at: now,
            recorded_by: actor,
        });
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<&str>, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        match self.status {
            TransactionStatus::Completed => {
                return Err(DomainError::invariant(
                    "cannot cancel a completed transaction, use refund instead",
                ));
            }
            TransactionStatus::Cancelled | TransactionStatus::Refunded => {
                return Err(DomainError::invariant(format!(
                    "transaction is already {}",
                    self.status
                )));
            }
            _ => {}
        }
        self.status = TransactionStatus::Cancelled;
        self.payment_status = PaymentStatus::Cancelled;
        self.notes.push(format!(
            "[CANCELLED] {}: {}",
            now.to_rfc3339(),
            reason.unwrap_or("no reason given")
        ));
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn refund(&mut self, amount: Money, reason: &str, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.status != TransactionStatus::Completed {
            return Err(DomainError::invariant("only completed transactions can be refunded"));
        }
        if !amount.is_positive() {
            return Err(DomainError::validation("refund amount must be positive"));
        }
        if amount > self.paid_amount {
            return Err(DomainError::validation(format!(
                "refund {amount} exceeds paid amount {}",
                self.paid_amount
            )));
        }
        let reason = validate::required_text("reason", reason, 500)?;
        self.paid_amount -= amount;
        self.status = TransactionStatus::Refunded;
        self.payment_status = PaymentStatus::Refunded;
        self.notes
            .push(format!("[REFUNDED] {}: {amount} - {reason}", now.to_rfc3339()));
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn mark_overdue(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if matches!(self.payment_status, PaymentStatus::Paid | PaymentStatus::Cancelled) {
            return Err(DomainError::invariant(format!(
                "cannot mark a {:?} transaction as overdue",
                self.payment_status
            )));
        }
        self.payment_status = PaymentStatus::Overdue;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn complete_rental_return(
        &mut self,
        return_date: NaiveDate,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        if self.transaction_type != TransactionType::Rental {
            return Err(DomainError::invariant("transaction is not a rental"));
        }
        if self.status != TransactionStatus::InProgress {
            return Err(DomainError::invariant(format!(
                "cannot complete the return of a {} rental",
                self.status
            )));
        }
        self.actual_return_date = Some(return_date);
        self.status = TransactionStatus::Completed;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn add_line(
        &mut self,
        line_id: LineId,
        input: &LineInput,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<&TransactionLine> {
        self.ensure_editable()?;
        let next_number = self.lines.iter().map(|l| l.line_number()).max().unwrap_or(0) + 1;
        let line = TransactionLine::new(line_id, next_number, input)?;
        self.lines.push(line);
        if let Err(err) = self.calculate_totals() {
            self.lines.pop();
            return Err(err);
        }
        self.audit.touch(actor, now);
        let index = self.lines.len() - 1;
        Ok(&self.lines[index])
    }

    pub fn update_line(
        &mut self,
        line_id: LineId,
        input: &LineInput,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line(line_id, actor, now, |line| line.apply(input))
    }

    pub fn remove_line(&mut self, line_id: LineId, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        let index = self
            .lines
            .iter()
            .position(|l| l.id_typed() == line_id)
            .ok_or_else(|| DomainError::not_found(format!("transaction line {line_id}")))?;
        if self.lines[index].returned_quantity() > 0 {
            return Err(DomainError::invariant("cannot remove a line with returned quantity"));
        }
        let removed = self.lines.remove(index);
        if let Err(err) = self.calculate_totals() {
            self.lines.insert(index, removed);
            return Err(err);
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn apply_line_discount(
        &mut self,
        line_id: LineId,
        percentage: Option<BasisPoints>,
        amount: Option<Money>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line(line_id, actor, now, |line| line.apply_discount(percentage, amount))
    }

    pub fn process_line_return(
        &mut self,
        line_id: LineId,
        quantity: i64,
        date: NaiveDate,
        reason: Option<&str>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line(line_id, actor, now, |line| line.process_return(quantity, date, reason))
    }

    pub fn update_line_rental_period(
        &mut self,
        line_id: LineId,
        end: NaiveDate,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line(line_id, actor, now, |line| line.update_rental_period(end))
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if !matches!(self.status, TransactionStatus::Draft | TransactionStatus::Pending) {
            return Err(DomainError::invariant(format!(
                "cannot delete a {} transaction",
                self.status
            )));
        }
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn with_line(
        &mut self,
        line_id: LineId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
        change: impl FnOnce(&mut TransactionLine) -> DomainResult<()>,
    ) -> DomainResult<()> {
        self.ensure_editable()?;
        let index = self
            .lines
            .iter()
            .position(|l| l.id_typed() == line_id)
            .ok_or_else(|| DomainError::not_found(format!("transaction line {line_id}")))?;
        let before = self.lines[index].clone();
        change(&mut self.lines[index])?;
        if let Err(err) = self.calculate_totals() {
            self.lines[index] = before;
            return Err(err);
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    fn ensure_editable(&self) -> DomainResult<()> {
        self.ensure_active()?;
        if !self.status.is_editable() {
            return Err(DomainError::invariant(format!(
                "cannot modify a {} transaction",
                self.status
            )));
        }
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("transaction {}", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::line::tests::{product, simple};
    use chrono::TimeZone;
    use proptest::prelude::*;

    pub(crate) fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    pub(crate) fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    pub(crate) fn sale_input() -> TransactionInput {
        TransactionInput {
            transaction_type: TransactionType::Sale,
            customer_id: Some(CustomerId::new()),
            supplier_id: None,
            location_id: None,
            sales_person_id: None,
            reference_transaction_id: None,
            transaction_date: day(1),
            due_date: Some(day(15)),
            rental_start_date: None,
            rental_end_date: None,
            payment_method: None,
            payment_reference: None,
            notes: None,
        }
    }

    pub(crate) fn rental_input() -> TransactionInput {
        TransactionInput {
            transaction_type: TransactionType::Rental,
            rental_start_date: Some(day(1)),
            rental_end_date: Some(day(5)),
            ..sale_input()
        }
    }

    pub(crate) fn in_progress_rental() -> Transaction {
        let mut rental =
            Transaction::create(TransactionId::new(), "RNT-20260601-0001", &rental_input(), None, test_time()).unwrap();
        rental.add_line(LineId::new(), &product(2, 2_000), None, test_time()).unwrap();
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Confirmed,
            TransactionStatus::InProgress,
        ] {
            rental.change_status(status, None, test_time()).unwrap();
        }
        rental
    }

    fn confirmed_sale(price_minor: i64) -> Transaction {
        let mut sale =
            Transaction::create(TransactionId::new(), "SAL-20260601-0001", &sale_input(), None, test_time()).unwrap();
        sale.add_line(LineId::new(), &product(1, price_minor), None, test_time()).unwrap();
        sale.change_status(TransactionStatus::Pending, None, test_time()).unwrap();
        sale.change_status(TransactionStatus::Confirmed, None, test_time()).unwrap();
        sale
    }

    #[test]
    fn header_requirements_by_type() {
        let mut input = sale_input();
        input.customer_id = None;
        assert!(Transaction::create(TransactionId::new(), "SAL-1", &input, None, test_time()).is_err());

        let mut input = rental_input();
        input.rental_end_date = None;
        assert!(Transaction::create(TransactionId::new(), "RNT-1", &input, None, test_time()).is_err());

        let mut input = sale_input();
        input.transaction_type = TransactionType::Return;
        assert!(Transaction::create(TransactionId::new(), "RTN-1", &input, None, test_time()).is_err());

        let mut input = sale_input();
        input.transaction_type = TransactionType::Purchase;
        input.customer_id = None;
        input.supplier_id = Some(SupplierId::new());
        assert!(Transaction::create(TransactionId::new(), "PUR-1", &input, None, test_time()).is_ok());
    }

    #[test]
    fn totals_combine_line_kinds() {
        let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        let mut taxed = product(2, 5_000);
        taxed.tax_rate = BasisPoints::from_percent(10);
        tx.add_line(LineId::new(), &taxed, None, test_time()).unwrap();
        tx.add_line(LineId::new(), &simple(LineType::Fee, 500), None, test_time()).unwrap();
        tx.add_line(LineId::new(), &simple(LineType::Discount, 1_500), None, test_time()).unwrap();
        tx.add_line(LineId::new(), &simple(LineType::Deposit, 10_000), None, test_time()).unwrap();

        assert_eq!(tx.subtotal(), Money::from_minor(10_500));
        assert_eq!(tx.discount_amount(), Money::from_minor(1_500));
        assert_eq!(tx.tax_amount(), Money::from_minor(1_000));
        assert_eq!(tx.deposit_amount(), Money::from_minor(10_000));
        assert_eq!(tx.total_amount(), Money::from_minor(10_000));
        let numbers: Vec<u32> = tx.lines().iter().map(|l| l.line_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn oversized_lines_are_rejected_without_changing_totals() {
        let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        let err = tx
            .add_line(LineId::new(), &product(10_000_000_000, 10_000_000_000), None, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(tx.lines().is_empty());

        // Each line is in range; the header sum overflows on the fifth.
        let mut big = product(rentdesk_core::validate::MAX_QUANTITY, Money::MAX.minor());
        big.tax_rate = BasisPoints::from_percent(100);
        for _ in 0..4 {
            tx.add_line(LineId::new(), &big, None, test_time()).unwrap();
        }
        let total = tx.total_amount();
        let err = tx.add_line(LineId::new(), &big, None, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(tx.lines().len(), 4);
        assert_eq!(tx.total_amount(), total);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        let err = tx
            .change_status(TransactionStatus::Completed, None, test_time())
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => {
                assert_eq!(msg, "cannot transition from DRAFT to COMPLETED");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn confirm_needs_lines() {
        let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        tx.change_status(TransactionStatus::Pending, None, test_time()).unwrap();
        assert!(tx.change_status(TransactionStatus::Confirmed, None, test_time()).is_err());
    }

    #[test]
    fn payments_move_payment_status() {
        let mut sale = confirmed_sale(10_000);
        sale.apply_payment(Money::from_minor(4_000), PaymentMethod::Cash, None, None, test_time())
            .unwrap();
        assert_eq!(sale.payment_status(), PaymentStatus::PartiallyPaid);
        assert_eq!(sale.balance_due(), Money::from_minor(6_000));
        assert!(
            sale.apply_payment(Money::from_minor(6_001), PaymentMethod::Cash, None, None, test_time())
                .is_err()
        );
        sale.apply_payment(Money::from_minor(6_000), PaymentMethod::CreditCard, Some("AUTH-1"), None, test_time())
            .unwrap();
        assert_eq!(sale.payment_status(), PaymentStatus::Paid);
        assert_eq!(sale.payments().len(), 2);
        assert!(sale.mark_overdue(None, test_time()).is_err());
    }

    #[test]
    fn draft_cannot_take_payment() {
        let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        assert!(
            tx.apply_payment(Money::from_minor(1), PaymentMethod::Cash, None, None, test_time())
                .is_err()
        );
    }

    #[test]
    fn cancel_and_refund_rules() {
        let mut sale = confirmed_sale(10_000);
        sale.apply_payment(Money::from_minor(10_000), PaymentMethod::Cash, None, None, test_time())
            .unwrap();
        assert!(sale.refund(Money::from_minor(100), "damaged", None, test_time()).is_err());

        sale.change_status(TransactionStatus::InProgress, None, test_time()).unwrap();
        sale.change_status(TransactionStatus::Completed, None, test_time()).unwrap();
        assert!(sale.cancel(Some("late"), None, test_time()).is_err());
        // The status route never refunds; the refund operation does.
        assert_eq!(
            sale.change_status(TransactionStatus::Refunded, None, test_time()).unwrap_err(),
            DomainError::invariant("use refund to refund a transaction")
        );
        assert_eq!(sale.status(), TransactionStatus::Completed);
        assert!(sale.refund(Money::from_minor(10_001), "too much", None, test_time()).is_err());

        sale.refund(Money::from_minor(2_500), "damaged box", None, test_time()).unwrap();
        assert_eq!(sale.status(), TransactionStatus::Refunded);
        assert_eq!(sale.payment_status(), PaymentStatus::Refunded);
        assert_eq!(sale.paid_amount(), Money::from_minor(7_500));
        assert!(sale.notes().last().unwrap().starts_with("[REFUNDED]"));
    }

    #[test]
    fn cancel_writes_note_and_blocks_edits() {
        let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
        tx.change_status(TransactionStatus::Cancelled, None, test_time()).unwrap();
        assert_eq!(tx.payment_status(), PaymentStatus::Cancelled);
        assert!(tx.notes()[0].starts_with("[CANCELLED]"));
        assert!(tx.add_line(LineId::new(), &product(1, 100), None, test_time()).is_err());
        assert!(tx.cancel(None, None, test_time()).is_err());
    }

    #[test]
    fn rentals_complete_only_through_return() {
        let mut rental = in_progress_rental();
        assert!(rental.change_status(TransactionStatus::Completed, None, test_time()).is_err());
        assert_eq!(rental.rental_days(), Some(5));
        assert!(rental.is_rental_overdue(day(6)));
        rental.complete_rental_return(day(6), None, test_time()).unwrap();
        assert_eq!(rental.status(), TransactionStatus::Completed);
        assert_eq!(rental.actual_return_date(), Some(day(6)));
        assert!(!rental.is_rental_overdue(day(7)));
    }

    #[test]
    fn delete_only_early() {
        let mut sale = confirmed_sale(100);
        assert!(sale.delete(None, test_time()).is_err());
        let mut draft = Transaction::create(TransactionId::new(), "SAL-2", &sale_input(), None, test_time()).unwrap();
        draft.delete(None, test_time()).unwrap();
        assert!(!draft.is_active());
        assert!(matches!(
            draft.change_status(TransactionStatus::Pending, None, test_time()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn overdue_needs_balance_and_past_due_date() {
        let sale = confirmed_sale(5_000);
        assert!(!sale.is_overdue(day(15)));
        assert!(sale.is_overdue(day(16)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 200,
            ..ProptestConfig::default()
        })]

        #[test]
        fn total_never_negative_and_balance_bounded(
            prices in proptest::collection::vec(0i64..100_000, 1..6),
            discount in 0i64..1_000_000,
        ) {
            let mut tx = Transaction::create(TransactionId::new(), "SAL-1", &sale_input(), None, test_time()).unwrap();
            for price in &prices {
                tx.add_line(LineId::new(), &product(1, *price), None, test_time()).unwrap();
            }
            tx.add_line(LineId::new(), &simple(LineType::Discount, discount), None, test_time()).unwrap();

            let subtotal: i64 = prices.iter().sum();
            prop_assert_eq!(tx.subtotal(), Money::from_minor(subtotal));
            prop_assert_eq!(tx.total_amount(), Money::from_minor((subtotal - discount).max(0)));
            prop_assert!(tx.balance_due() <= tx.total_amount());
        }
    }
}
