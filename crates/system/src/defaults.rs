//! Settings seeded by `initialize`.

use crate::setting::{NewSetting, SettingCategory, SettingType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSetting {
    pub key: &'static str,
    pub name: &'static str,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub value: &'static str,
    pub description: &'static str,
    pub is_system: bool,
    pub display_order: i32,
}

impl DefaultSetting {
    /// Value and default start out equal.
    pub fn to_input(&self) -> NewSetting {
        NewSetting {
            key: self.key.to_string(),
            name: self.name.to_string(),
            setting_type: self.setting_type,
            category: self.category,
            value: Some(self.value.to_string()),
            default_value: Some(self.value.to_string()),
            description: Some(self.description.to_string()),
            is_system: self.is_system,
            is_sensitive: false,
            display_order: self.display_order,
        }
    }
}

macro_rules! default_setting {
    ($key:literal, $name:literal, $ty:ident, $cat:ident, $value:expr, $desc:literal, $order:literal $(, $system:literal)?) => {
        DefaultSetting {
            key: $key,
            name: $name,
            setting_type: SettingType::$ty,
            category: SettingCategory::$cat,
            value: $value,
            description: $desc,
            is_system: false $(|| $system)?,
            display_order: $order,
        }
    };
}

pub const DEFAULT_SETTINGS: &[DefaultSetting] = &[
    default_setting!("app_name", "Application Name", Text, General, "Rentdesk", "Name of the application", 1, true),
    default_setting!("app_version", "Application Version", Text, General, env!("CARGO_PKG_VERSION"), "Version of the application", 2, true),
    default_setting!("company_name", "Company Name", Text, General, "Your Company", "Name of the company using the system", 3),
    default_setting!("timezone", "System Timezone", Text, General, "UTC", "System timezone", 4),
    default_setting!("default_currency", "Default Currency", Text, Business, "USD", "Default currency for transactions", 1),
    default_setting!("business_hours_start", "Business Hours Start", Text, Business, "09:00", "Business hours start time", 2),
    default_setting!("business_hours_end", "Business Hours End", Text, Business, "17:00", "Business hours end time", 3),
    default_setting!("tax_rate", "Default Tax Rate", Decimal, Financial, "0.08", "Default tax rate (8%)", 1),
    default_setting!("late_fee_rate", "Late Fee Rate", Decimal, Financial, "0.10", "Late fee rate (10%)", 2),
    default_setting!("daily_late_fee", "Daily Late Fee", Decimal, Financial, "10.00", "Daily late fee amount", 3),
    default_setting!("minimum_rental_days", "Minimum Rental Days", Integer, Rental, "1", "Minimum rental period in days", 1),
    default_setting!("maximum_rental_days", "Maximum Rental Days", Integer, Rental, "365", "Maximum rental period in days", 2),
    default_setting!("default_security_deposit", "Default Security Deposit", Decimal, Rental, "100.00", "Default security deposit amount", 3),
];
