//! System settings and the system summary.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use rentdesk_core::{DomainError, SettingId, UserId};
use rentdesk_system::setting::normalize_key;
use rentdesk_system::{DEFAULT_SETTINGS, NewSetting, Setting, SettingFilter};

use super::{ServiceResult, Stores, list_active};

/// `GET /system/info` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub system_name: String,
    pub system_version: String,
    pub company_name: String,
    pub timezone: String,
    pub settings_count: usize,
    pub modified_settings_count: usize,
    pub users_count: usize,
    pub customers_count: usize,
    pub items_count: usize,
    pub transactions_count: usize,
    pub status: &'static str,
}

#[derive(Clone)]
pub struct SystemService {
    stores: Stores,
    write_lock: Arc<Mutex<()>>,
}

impl SystemService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn find(&self, key: &str) -> ServiceResult<Option<Setting>> {
        let key = normalize_key(key)?;
        Ok(list_active(&*self.stores.settings)
            .await?
            .into_iter()
            .find(|s| s.key() == key))
    }

    pub async fn get_setting(&self, key: &str) -> ServiceResult<Setting> {
        self.find(key)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("setting '{key}'")).into())
    }

    /// Typed value; `null` when the setting is unset.
    pub async fn setting_value(&self, key: &str) -> ServiceResult<Value> {
        Ok(self.get_setting(key).await?.typed_value()?)
    }

    /// Active settings ordered by category, display order and name.
    pub async fn list_settings(&self, filter: &SettingFilter) -> ServiceResult<Vec<Setting>> {
        let mut settings: Vec<Setting> = self
            .stores
            .settings
            .list()
            .await?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        settings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(settings)
    }

    async fn insert(&self, input: &NewSetting, actor: Option<UserId>) -> ServiceResult<Setting> {
        let setting = Setting::create(SettingId::new(), input, actor, Utc::now())?;
        if self.find(setting.key()).await?.is_some() {
            return Err(DomainError::conflict(format!("setting '{}' already exists", setting.key())).into());
        }
        self.stores.settings.upsert(&setting).await?;
        Ok(setting)
    }

    #[instrument(skip(self, input), fields(key = %input.key), err)]
    pub async fn create_setting(&self, input: &NewSetting, actor: Option<UserId>) -> ServiceResult<Setting> {
        let _guard = self.write_lock.lock().await;
        let setting = self.insert(input, actor).await?;
        info!(setting_id = %setting.id_typed(), key = setting.key(), "setting created");
        Ok(setting)
    }

    /// Load, mutate and persist one active setting.
    async fn with_setting<F>(&self, key: &str, apply: F) -> ServiceResult<Setting>
    where
        F: FnOnce(&mut Setting) -> rentdesk_core::DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut setting = self.get_setting(key).await?;
        apply(&mut setting)?;
        self.stores.settings.upsert(&setting).await?;
        Ok(setting)
    }

    #[instrument(skip(self, value), err)]
    pub async fn update_setting(&self, key: &str, value: &Value, actor: Option<UserId>) -> ServiceResult<Setting> {
        let setting = self.with_setting(key, |s| s.set_value(value, actor, Utc::now())).await?;
        info!(key = setting.key(), "setting updated");
        Ok(setting)
    }

    #[instrument(skip(self), err)]
    pub async fn reset_setting(&self, key: &str, actor: Option<UserId>) -> ServiceResult<Setting> {
        let setting = self.with_setting(key, |s| s.reset_to_default(actor, Utc::now())).await?;
        info!(key = setting.key(), "setting reset to default");
        Ok(setting)
    }

    /// Soft delete; system settings are refused.
    #[instrument(skip(self), err)]
    pub async fn delete_setting(&self, key: &str, actor: Option<UserId>) -> ServiceResult<()> {
        self.with_setting(key, |s| s.delete(actor, Utc::now())).await?;
        info!(key, "setting deleted");
        Ok(())
    }

    /// Create whichever built-in settings are missing. Returns the new ones.
    #[instrument(skip(self), err)]
    pub async fn initialize_default_settings(&self, actor: Option<UserId>) -> ServiceResult<Vec<Setting>> {
        let _guard = self.write_lock.lock().await;
        let mut created = Vec::new();
        for default in DEFAULT_SETTINGS {
            if self.find(default.key).await?.is_none() {
                created.push(self.insert(&default.to_input(), actor).await?);
            }
        }
        info!(created = created.len(), "default settings initialized");
        Ok(created)
    }

    /// Stored text of a setting, or `fallback` when missing or unset.
    async fn text_or(&self, key: &str, fallback: &str) -> ServiceResult<String> {
        Ok(self
            .find(key)
            .await?
            .and_then(|s| s.value().map(str::to_string))
            .unwrap_or_else(|| fallback.to_string()))
    }

    pub async fn system_info(&self) -> ServiceResult<SystemInfo> {
        let settings = list_active(&*self.stores.settings).await?;
        Ok(SystemInfo {
            system_name: self.text_or("app_name", "Rentdesk").await?,
            system_version: self.text_or("app_version", env!("CARGO_PKG_VERSION")).await?,
            company_name: self.text_or("company_name", "Your Company").await?,
            timezone: self.text_or("timezone", "UTC").await?,
            settings_count: settings.len(),
            modified_settings_count: settings.iter().filter(|s| !s.is_default()).count(),
            users_count: list_active(&*self.stores.users).await?.len(),
            customers_count: list_active(&*self.stores.customers).await?.len(),
            items_count: list_active(&*self.stores.items).await?.len(),
            transactions_count: list_active(&*self.stores.transactions).await?.len(),
            status: "healthy",
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use rentdesk_system::{SettingCategory, SettingType};

    use super::*;
    use crate::services::ServiceError;

    fn service() -> SystemService {
        SystemService::new(Stores::in_memory())
    }

    fn input(key: &str) -> NewSetting {
        NewSetting {
            key: key.to_string(),
            name: "Reminder Lead Days".to_string(),
            setting_type: SettingType::Integer,
            category: SettingCategory::Notification,
            value: Some("3".to_string()),
            default_value: Some("2".to_string()),
            description: None,
            is_system: false,
            is_sensitive: false,
            display_order: 1,
        }
    }

    #[tokio::test]
    async fn keys_are_unique_case_insensitively() {
        let svc = service();
        svc.create_setting(&input("reminder_lead_days"), None).await.unwrap();
        let err = svc.create_setting(&input("Reminder_Lead_Days"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_reset_and_delete() {
        let svc = service();
        svc.create_setting(&input("reminder_lead_days"), None).await.unwrap();

        let updated = svc.update_setting("reminder_lead_days", &json!(5), None).await.unwrap();
        assert_eq!(updated.value(), Some("5"));
        assert_eq!(svc.setting_value("reminder_lead_days").await.unwrap(), json!(5));

        let err = svc.update_setting("reminder_lead_days", &json!("soon"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(svc.setting_value("reminder_lead_days").await.unwrap(), json!(5));

        let reset = svc.reset_setting("reminder_lead_days", None).await.unwrap();
        assert_eq!(reset.value(), Some("2"));

        svc.delete_setting("reminder_lead_days", None).await.unwrap();
        let err = svc.get_setting("reminder_lead_days").await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));

        // A deleted key can be created again.
        svc.create_setting(&input("reminder_lead_days"), None).await.unwrap();
    }

    #[tokio::test]
    async fn initialize_is_idempotent_and_protects_system_settings() {
        let svc = service();
        let first = svc.initialize_default_settings(None).await.unwrap();
        assert_eq!(first.len(), DEFAULT_SETTINGS.len());
        assert!(svc.initialize_default_settings(None).await.unwrap().is_empty());

        let err = svc.update_setting("app_name", &json!("Other"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        let err = svc.delete_setting("app_version", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let user_only = svc
            .list_settings(&SettingFilter {
                include_system: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(user_only.len(), DEFAULT_SETTINGS.len() - 2);

        let rental = svc
            .list_settings(&SettingFilter {
                category: Some(SettingCategory::Rental),
                ..Default::default()
            })
            .await
            .unwrap();
        let keys: Vec<_> = rental.iter().map(Setting::key).collect();
        assert_eq!(keys, ["minimum_rental_days", "maximum_rental_days", "default_security_deposit"]);
    }

    #[tokio::test]
    async fn info_falls_back_until_initialized() {
        let svc = service();
        let info = svc.system_info().await.unwrap();
        assert_eq!(info.system_name, "Rentdesk");
        assert_eq!(info.settings_count, 0);

        svc.initialize_default_settings(None).await.unwrap();
        svc.update_setting("company_name", &json!("Acme Rentals"), None).await.unwrap();
        let info = svc.system_info().await.unwrap();
        assert_eq!(info.company_name, "Acme Rentals");
        assert_eq!(info.settings_count, DEFAULT_SETTINGS.len());
        assert_eq!(info.modified_settings_count, 1);
        assert_eq!(info.status, "healthy");
    }
}
