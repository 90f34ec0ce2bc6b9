//! Persisted remote credentials.

use crate::errors::AppError;
use crate::models::RemoteConfig;

use super::KeySpace;

const REMOTE_CONFIG_KEY: &str = "quizbank.remote_config";

/// Reads and writes the [`RemoteConfig`] in the local key-space.
#[derive(Clone)]
pub struct ConfigStore {
    keys: KeySpace,
}

impl ConfigStore {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }

    /// Stored credentials, or `None` when absent or unreadable.
    pub async fn get(&self) -> Result<Option<RemoteConfig>, AppError> {
        let Some(raw) = self.keys.get(REMOTE_CONFIG_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<RemoteConfig>(&raw) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored remote config: {}", e);
                Ok(None)
            }
        }
    }

    /// Store both halves at once. Blank values are refused so a half-filled config
    /// never reaches storage.
    pub async fn set(&self, config: &RemoteConfig) -> Result<(), AppError> {
        if config.endpoint.trim().is_empty() || config.auth_token.trim().is_empty() {
            return Err(AppError::Validation(
                "Both endpoint and auth token are required".to_string(),
            ));
        }
        self.keys.set_json(REMOTE_CONFIG_KEY, config).await
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.keys.remove(REMOTE_CONFIG_KEY).await
    }
}
