use serde::{Deserialize, Serialize};

use rentdesk_core::{DomainResult, ValueObject, validate};

/// Contact information shared by customers and suppliers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ValueObject for ContactInfo {}

impl ContactInfo {
    pub fn new(email: Option<&str>, phone: Option<&str>, address: Option<&str>) -> DomainResult<Self> {
        Ok(Self {
            email: validate::optional_email("email", email)?,
            phone: validate::optional_text("phone", phone, 20)?,
            address: validate::optional_text("address", address, 500)?,
        })
    }

    /// Re-validate a deserialized value.
    pub fn validated(&self) -> DomainResult<Self> {
        Self::new(self.email.as_deref(), self.phone.as_deref(), self.address.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none() && self.address.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_collapse_and_email_is_checked() {
        let c = ContactInfo::new(Some("A@B.io"), Some("  "), None).unwrap();
        assert_eq!(c.email.as_deref(), Some("a@b.io"));
        assert_eq!(c.phone, None);
        assert!(ContactInfo::new(Some("nope"), None, None).is_err());
        assert!(ContactInfo::new(None, Some(&"1".repeat(21)), None).is_err());
    }
}
