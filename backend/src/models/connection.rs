//! Backend status and remote connection credentials.

use serde::{Deserialize, Serialize};

/// Which backend currently serves record operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendStatus {
    Remote,
    Local,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::Remote => "REMOTE",
            BackendStatus::Local => "LOCAL",
        }
    }
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for the remote relational service.
///
/// Persisted as one JSON value, so it is either stored whole or not at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub endpoint: String,
    pub auth_token: String,
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Both halves present and the endpoint long enough to name a host.
    pub fn is_usable(&self) -> bool {
        self.endpoint.trim().len() >= 5 && !self.auth_token.trim().is_empty()
    }

    /// Copy safe to hand back to clients: the token is masked.
    pub fn redacted(&self) -> RemoteConfig {
        let visible: String = self.auth_token.chars().take(4).collect();
        RemoteConfig {
            endpoint: self.endpoint.clone(),
            auth_token: format!("{}…", visible),
        }
    }
}
