//! Field validation helpers shared by entity constructors.
//!
//! Every helper returns `DomainError::Validation` naming the offending field.

use crate::error::{DomainError, DomainResult};
use crate::money::Money;

/// Trimmed, non-empty text of at most `max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Optional text: blank collapses to `None`, otherwise bounded like `required_text`.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v, max).map(Some),
    }
}

/// Minimal e-mail shape check: `local@domain.tld`, at most 255 characters.
pub fn email(field: &str, value: &str) -> DomainResult<String> {
    let value = required_text(field, value, 255)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid {field} format")));
    }
    Ok(value.to_lowercase())
}

pub fn optional_email(field: &str, value: Option<&str>) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => email(field, v).map(Some),
    }
}

pub fn non_negative(field: &str, amount: Money) -> DomainResult<Money> {
    if amount.is_negative() {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(amount)
}

/// Upper bound on any single quantity (units, days, line counts).
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Amount whose magnitude does not exceed `Money::MAX`.
pub fn amount(field: &str, value: Money) -> DomainResult<Money> {
    if value.minor().unsigned_abs() > Money::MAX.minor().unsigned_abs() {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {}",
            Money::MAX
        )));
    }
    Ok(value)
}

/// Quantity in `0..=MAX_QUANTITY`.
pub fn quantity(field: &str, value: i64) -> DomainResult<i64> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    if value > MAX_QUANTITY {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {MAX_QUANTITY}"
        )));
    }
    Ok(value)
}

/// Codes: non-empty, bounded, letters/digits/`-`/`_` only. Stored upper-case.
pub fn code(field: &str, value: &str, max: usize) -> DomainResult<String> {
    let value = required_text(field, value, max)?;
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::validation(format!(
            "{field} must contain only letters, numbers, hyphens and underscores"
        )));
    }
    Ok(value.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("name", "  Tents ", 10).unwrap(), "Tents");
        assert!(matches!(required_text("name", "   ", 10), Err(DomainError::Validation(_))));
        assert!(required_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn optional_text_collapses_blank() {
        assert_eq!(optional_text("notes", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("notes", None, 10).unwrap(), None);
        assert_eq!(optional_text("notes", Some(" x "), 10).unwrap(), Some("x".to_string()));
    }

    #[test]
    fn email_shape() {
        assert_eq!(email("email", "Jane@Example.com").unwrap(), "jane@example.com");
        assert!(email("email", "jane.example.com").is_err());
        assert!(email("email", "jane@example").is_err());
        assert!(email("email", "@example.com").is_err());
        assert!(email("email", "a@b@c.com").is_err());
    }

    #[test]
    fn codes_are_uppercased_and_restricted() {
        assert_eq!(code("code", "cust-01", 20).unwrap(), "CUST-01");
        assert!(code("code", "cust 01", 20).is_err());
    }

    #[test]
    fn amounts_and_quantities_are_bounded() {
        assert!(amount("price", Money::MAX).is_ok());
        assert!(amount("price", Money::from_minor(-Money::MAX.minor())).is_ok());
        assert!(matches!(
            amount("price", Money::from_minor(Money::MAX.minor() + 1)),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(quantity("quantity", 0).unwrap(), 0);
        assert!(quantity("quantity", -1).is_err());
        assert!(quantity("quantity", MAX_QUANTITY + 1).is_err());
    }
}
