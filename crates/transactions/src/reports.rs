//! Read-side reports over a set of transactions.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use rentdesk_core::{Entity, Money};

use crate::transaction::{Transaction, TransactionStatus, TransactionType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub count: u64,
    pub amount: Money,
}

impl Bucket {
    fn add(&mut self, amount: Money) {
        self.count += 1;
        self.amount += amount;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub total_transactions: u64,
    pub by_type: BTreeMap<TransactionType, Bucket>,
    pub by_status: BTreeMap<TransactionStatus, Bucket>,
    /// Completed sales and rentals.
    pub total_revenue: Money,
    pub outstanding_balance: Money,
}

/// Summarise active transactions dated within `[from, to]` (either bound optional).
pub fn summary<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> TransactionSummary {
    let mut report = TransactionSummary {
        from,
        to,
        ..TransactionSummary::default()
    };
    let in_range = |tx: &Transaction| {
        from.is_none_or(|from| tx.transaction_date() >= from)
            && to.is_none_or(|to| tx.transaction_date() <= to)
    };
    for tx in transactions.into_iter().filter(|tx| tx.is_active() && in_range(tx)) {
        report.total_transactions += 1;
        report
            .by_type
            .entry(tx.transaction_type())
            .or_default()
            .add(tx.total_amount());
        report
            .by_status
            .entry(tx.status())
            .or_default()
            .add(tx.total_amount());
        if tx.status() == TransactionStatus::Completed
            && matches!(
                tx.transaction_type(),
                TransactionType::Sale | TransactionType::Rental
            )
        {
            report.total_revenue += tx.total_amount();
        }
        if tx.status() != TransactionStatus::Cancelled {
            report.outstanding_balance += tx.balance_due();
        }
    }
    report
}

pub fn overdue<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    today: NaiveDate,
) -> Vec<&'a Transaction> {
    transactions
        .into_iter()
        .filter(|tx| tx.is_active() && tx.is_overdue(today))
        .collect()
}

pub fn outstanding<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Vec<&'a Transaction> {
    transactions
        .into_iter()
        .filter(|tx| {
            tx.is_active()
                && tx.status() != TransactionStatus::Cancelled
                && tx.balance_due().is_positive()
        })
        .collect()
}

/// Open rentals whose end date falls within `days_ahead` days of `today`,
/// soonest first. Rentals already past their end date are included.
pub fn rentals_due_for_return<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    today: NaiveDate,
    days_ahead: u32,
) -> Vec<&'a Transaction> {
    let horizon = today + Duration::days(i64::from(days_ahead));
    let mut due: Vec<&Transaction> = transactions
        .into_iter()
        .filter(|tx| {
            tx.is_active()
                && tx.transaction_type() == TransactionType::Rental
                && matches!(
                    tx.status(),
                    TransactionStatus::Confirmed | TransactionStatus::InProgress
                )
                && tx.actual_return_date().is_none()
                && tx.rental_end_date().is_some_and(|end| end <= horizon)
        })
        .collect();
    due.sort_by_key(|tx| tx.rental_end_date());
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::tests::product;
    use crate::transaction::tests::{day, in_progress_rental, sale_input, test_time};
    use crate::transaction::PaymentMethod;
    use rentdesk_core::{LineId, TransactionId};

    fn completed_sale(price_minor: i64, paid_minor: i64) -> Transaction {
        let mut sale =
            Transaction::create(TransactionId::new(), "SAL-20260601-0001", &sale_input(), None, test_time()).unwrap();
        sale.add_line(LineId::new(), &product(1, price_minor), None, test_time()).unwrap();
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Confirmed,
            TransactionStatus::InProgress,
        ] {
            sale.change_status(status, None, test_time()).unwrap();
        }
        if paid_minor > 0 {
            sale.apply_payment(Money::from_minor(paid_minor), PaymentMethod::Cash, None, None, test_time())
                .unwrap();
        }
        sale.change_status(TransactionStatus::Completed, None, test_time()).unwrap();
        sale
    }

    #[test]
    fn summary_groups_and_sums() {
        let paid = completed_sale(10_000, 10_000);
        let owing = completed_sale(5_000, 1_000);
        let rental = in_progress_rental();
        let mut cancelled =
            Transaction::create(TransactionId::new(), "SAL-20260601-0009", &sale_input(), None, test_time()).unwrap();
        cancelled.cancel(Some("duplicate"), None, test_time()).unwrap();
        let all = [paid, owing, rental, cancelled];

        let report = summary(&all, Some(day(1)), Some(day(30)));
        assert_eq!(report.total_transactions, 4);
        assert_eq!(report.by_type[&TransactionType::Sale].count, 3);
        assert_eq!(report.by_status[&TransactionStatus::Completed].amount, Money::from_minor(15_000));
        assert_eq!(report.total_revenue, Money::from_minor(15_000));
        // 4_000 on the open sale and 4_000 on the unpaid rental
        assert_eq!(report.outstanding_balance, Money::from_minor(8_000));

        let empty = summary(&all, Some(day(2)), None);
        assert_eq!(empty.total_transactions, 0);
    }

    #[test]
    fn outstanding_and_overdue() {
        let paid = completed_sale(10_000, 10_000);
        let owing = completed_sale(5_000, 1_000);
        let all = [paid, owing];
        assert_eq!(outstanding(&all).len(), 1);
        assert!(overdue(&all, day(15)).is_empty());
        assert_eq!(overdue(&all, day(16)).len(), 1);
    }

    #[test]
    fn due_for_return_window() {
        let rental = in_progress_rental();
        let all = [rental];
        assert!(rentals_due_for_return(&all, day(1), 2).is_empty());
        assert_eq!(rentals_due_for_return(&all, day(3), 2).len(), 1);
        assert_eq!(rentals_due_for_return(&all, day(9), 0).len(), 1);
    }
}
