//! Activity log entries.

use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Info => "INFO",
            LogType::Success => "SUCCESS",
            LogType::Warning => "WARNING",
            LogType::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(LogType::Info),
            "SUCCESS" => Some(LogType::Success),
            "WARNING" => Some(LogType::Warning),
            "ERROR" => Some(LogType::Error),
            _ => None,
        }
    }
}

/// One audit-style record. `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(rename = "type", default)]
    pub log_type: LogType,
    #[serde(default)]
    pub user_id: String,
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(action: &str, details: &str, log_type: LogType, user_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.to_string(),
            details: details.to_string(),
            log_type,
            user_id: user_id.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Request body for appending a log entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLogRequest {
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(rename = "type", default)]
    pub log_type: LogType,
}
