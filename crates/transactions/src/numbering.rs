//! Transaction numbers: `{PREFIX}-{YYYYMMDD}-{NNNN}`, sequenced per prefix and day.

use chrono::NaiveDate;

use crate::transaction::TransactionType;

pub fn day_prefix(kind: TransactionType, date: NaiveDate) -> String {
    format!("{}-{}-", kind.prefix(), date.format("%Y%m%d"))
}

pub fn format_number(kind: TransactionType, date: NaiveDate, sequence: u32) -> String {
    format!("{}{sequence:04}", day_prefix(kind, date))
}

/// One past the highest sequence already issued for this type and day.
/// Numbers that do not follow the pattern are ignored.
pub fn next_sequence<'a>(
    kind: TransactionType,
    date: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> u32 {
    let prefix = day_prefix(kind, date);
    existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix.as_str()))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

pub fn next_number<'a>(
    kind: TransactionType,
    date: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    format_number(kind, date, next_sequence(kind, date, existing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    #[test]
    fn first_number_of_the_day() {
        assert_eq!(
            next_number(TransactionType::Rental, date(), []),
            "RNT-20260601-0001"
        );
    }

    #[test]
    fn sequence_is_per_prefix_and_day() {
        let existing = [
            "RNT-20260601-0001",
            "RNT-20260601-0007",
            "SAL-20260601-0042",
            "RNT-20260531-0099",
            "manual-import",
        ];
        assert_eq!(
            next_number(TransactionType::Rental, date(), existing),
            "RNT-20260601-0008"
        );
        assert_eq!(
            next_number(TransactionType::Sale, date(), existing),
            "SAL-20260601-0043"
        );
        assert_eq!(
            next_number(TransactionType::Purchase, date(), existing),
            "PUR-20260601-0001"
        );
    }

    #[test]
    fn sequence_widens_past_four_digits() {
        assert_eq!(
            format_number(TransactionType::Refund, date(), 12_345),
            "REF-20260601-12345"
        );
    }
}
