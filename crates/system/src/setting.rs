//! Key/value settings with a declared value type.
//!
//! Values are stored as canonical text; `typed_value` and `set_value` convert
//! to and from JSON according to the setting's `SettingType`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, SettingId, UserId, validate};

/// Shown in place of a sensitive setting's value.
pub const MASKED_VALUE: &str = "***MASKED***";

const MAX_VALUE_LEN: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingType {
    #[serde(rename = "STRING")]
    Text,
    Integer,
    Decimal,
    Boolean,
    Json,
    Date,
    Datetime,
}

impl SettingType {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingType::Text => "STRING",
            SettingType::Integer => "INTEGER",
            SettingType::Decimal => "DECIMAL",
            SettingType::Boolean => "BOOLEAN",
            SettingType::Json => "JSON",
            SettingType::Date => "DATE",
            SettingType::Datetime => "DATETIME",
        }
    }

    fn mismatch(self, field: &str) -> DomainError {
        DomainError::validation(format!("{field} must be a valid {} value", self.as_str()))
    }

    /// Validate stored text and return its canonical form.
    pub fn canonical_text(self, field: &str, text: &str) -> DomainResult<String> {
        if text.chars().count() > MAX_VALUE_LEN {
            return Err(DomainError::validation(format!(
                "{field} cannot exceed {MAX_VALUE_LEN} characters"
            )));
        }
        let trimmed = text.trim();
        match self {
            SettingType::Text => Ok(text.to_string()),
            SettingType::Integer => trimmed
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|_| self.mismatch(field)),
            SettingType::Decimal => {
                if is_decimal(trimmed) {
                    Ok(trimmed.to_string())
                } else {
                    Err(self.mismatch(field))
                }
            }
            SettingType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok("true".to_string()),
                "false" | "0" | "no" | "off" => Ok("false".to_string()),
                _ => Err(self.mismatch(field)),
            },
            SettingType::Json => serde_json::from_str::<Value>(trimmed)
                .map(|v| v.to_string())
                .map_err(|_| self.mismatch(field)),
            SettingType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.format("%Y-%m-%d").to_string())
                .map_err(|_| self.mismatch(field)),
            SettingType::Datetime => DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
                .map_err(|_| self.mismatch(field)),
        }
    }

    /// JSON input to stored text. `null` clears the value.
    pub fn encode(self, field: &str, value: &Value) -> DomainResult<Option<String>> {
        if value.is_null() {
            return Ok(None);
        }
        if self == SettingType::Json {
            return Ok(Some(value.to_string()));
        }
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) if self != SettingType::Date && self != SettingType::Datetime => n.to_string(),
            Value::Bool(b) if matches!(self, SettingType::Text | SettingType::Boolean) => b.to_string(),
            _ => return Err(self.mismatch(field)),
        };
        self.canonical_text(field, &text).map(Some)
    }

    /// Stored text to JSON. Decimals stay strings so no precision is lost.
    pub fn decode(self, field: &str, text: &str) -> DomainResult<Value> {
        let canonical = self.canonical_text(field, text)?;
        Ok(match self {
            SettingType::Integer => canonical
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| self.mismatch(field))?,
            SettingType::Boolean => Value::Bool(canonical == "true"),
            SettingType::Json => serde_json::from_str(&canonical).map_err(|_| self.mismatch(field))?,
            SettingType::Text | SettingType::Decimal | SettingType::Date | SettingType::Datetime => {
                Value::String(canonical)
            }
        })
    }
}

/// `-?digits(.digits)?`
fn is_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    digits(whole) && fraction.is_none_or(digits)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingCategory {
    General,
    Business,
    Financial,
    Inventory,
    Rental,
    Notification,
    Security,
    Integration,
    Reporting,
    System,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSetting {
    pub key: String,
    pub name: String,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    id: SettingId,
    key: String,
    name: String,
    setting_type: SettingType,
    category: SettingCategory,
    value: Option<String>,
    default_value: Option<String>,
    description: Option<String>,
    is_system: bool,
    is_sensitive: bool,
    display_order: i32,
    audit: AuditStamp,
}

impl Entity for Setting {
    type Id = SettingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

/// Keys: letters, digits, `_`, `.` and `-`; stored lower-case.
pub fn normalize_key(key: &str) -> DomainResult<String> {
    let key = validate::required_text("setting key", key, 100)?;
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(DomainError::validation(
            "setting key must contain only letters, numbers, dots, hyphens and underscores",
        ));
    }
    Ok(key.to_ascii_lowercase())
}

fn optional_value(setting_type: SettingType, field: &str, text: Option<&str>) -> DomainResult<Option<String>> {
    text.map(|t| setting_type.canonical_text(field, t)).transpose()
}

impl Setting {
    pub fn create(id: SettingId, input: &NewSetting, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let key = normalize_key(&input.key)?;
        let setting_type = input.setting_type;
        Ok(Self {
            id,
            name: validate::required_text("setting name", &input.name, 200)?,
            setting_type,
            category: input.category,
            value: optional_value(setting_type, &key, input.value.as_deref())?,
            default_value: optional_value(setting_type, &format!("{key} default"), input.default_value.as_deref())?,
            description: validate::optional_text("description", input.description.as_deref(), 1000)?,
            is_system: input.is_system,
            is_sensitive: input.is_sensitive,
            display_order: input.display_order,
            audit: AuditStamp::new(actor, now),
            key,
        })
    }

    pub fn id_typed(&self) -> SettingId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn setting_type(&self) -> SettingType {
        self.setting_type
    }

    pub fn category(&self) -> SettingCategory {
        self.category
    }

    /// Raw stored text, unmasked.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    pub fn is_sensitive(&self) -> bool {
        self.is_sensitive
    }

    pub fn display_order(&self) -> i32 {
        self.display_order
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// Listing order: category, then display order, then name.
    pub fn sort_key(&self) -> (SettingCategory, i32, &str) {
        (self.category, self.display_order, &self.name)
    }

    /// `null` when unset.
    pub fn typed_value(&self) -> DomainResult<Value> {
        match &self.value {
            Some(text) => self.setting_type.decode(&self.key, text),
            None => Ok(Value::Null),
        }
    }

    pub fn is_default(&self) -> bool {
        self.value == self.default_value
    }

    /// System settings are read-only; so is anything soft-deleted.
    pub fn can_modify(&self) -> bool {
        !self.is_system && self.audit.is_active
    }

    pub fn masked_value(&self) -> Option<&str> {
        match &self.value {
            Some(_) if self.is_sensitive => Some(MASKED_VALUE),
            value => value.as_deref(),
        }
    }

    pub fn set_value(&mut self, value: &Value, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_modifiable()?;
        self.value = self.setting_type.encode(&self.key, value)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn reset_to_default(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_modifiable()?;
        self.value = self.default_value.clone();
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.is_system {
            return Err(DomainError::validation(format!(
                "system setting '{}' cannot be deleted",
                self.key
            )));
        }
        self.audit.deactivate(actor, now);
        Ok(())
    }

    pub fn view(&self) -> SettingView {
        let default_value = match &self.default_value {
            Some(_) if self.is_sensitive => Some(MASKED_VALUE.to_string()),
            value => value.clone(),
        };
        SettingView {
            id: self.id,
            key: self.key.clone(),
            name: self.name.clone(),
            setting_type: self.setting_type,
            category: self.category,
            value: self.masked_value().map(str::to_string),
            default_value,
            description: self.description.clone(),
            is_system: self.is_system,
            is_sensitive: self.is_sensitive,
            is_default: self.is_default(),
            display_order: self.display_order,
            audit: self.audit.clone(),
        }
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("setting '{}'", self.key)));
        }
        Ok(())
    }

    fn ensure_modifiable(&self) -> DomainResult<()> {
        self.ensure_active()?;
        if !self.can_modify() {
            return Err(DomainError::validation(format!(
                "setting '{}' cannot be modified",
                self.key
            )));
        }
        Ok(())
    }
}

/// API representation: sensitive values are masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingView {
    pub id: SettingId,
    pub key: String,
    pub name: String,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub value: Option<String>,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub is_system: bool,
    pub is_sensitive: bool,
    pub is_default: bool,
    pub display_order: i32,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingFilter {
    #[serde(default)]
    pub category: Option<SettingCategory>,
    /// `None` includes system settings.
    #[serde(default)]
    pub include_system: Option<bool>,
}

impl SettingFilter {
    pub fn matches(&self, setting: &Setting) -> bool {
        setting.is_active()
            && self.category.is_none_or(|c| setting.category == c)
            && (self.include_system.unwrap_or(true) || !setting.is_system)
    }
}
