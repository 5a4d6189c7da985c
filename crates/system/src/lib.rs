//! System configuration: typed key/value settings and the built-in defaults.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod defaults;
pub mod setting;

pub use defaults::{DEFAULT_SETTINGS, DefaultSetting};
pub use setting::{
    MASKED_VALUE, NewSetting, Setting, SettingCategory, SettingFilter, SettingType, SettingView,
};
