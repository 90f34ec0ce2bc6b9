//! System-wide settings singleton.

use serde::{Deserialize, Serialize};

/// Fixed key of the settings record.
pub const SETTINGS_KEY: &str = "config";

/// Every field carries a serde default, so a record written before a field existed
/// still reads back fully populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    pub ai: AiSettings,
    pub cron: CronSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub fact_check: bool,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self { fact_check: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CronSettings {
    pub enabled: bool,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SystemSettings {
    /// Merge a stored record over the defaults. Unreadable records yield the defaults.
    pub fn from_stored(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!("Unreadable settings record, using defaults: {}", e);
            Self::default()
        })
    }
}
