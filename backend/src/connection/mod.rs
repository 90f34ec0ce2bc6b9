//! Connection manager: decides which backend serves records.
//!
//! `init` resolves credentials, probes the remote, provisions it and swaps the active
//! backend in one step. Every failure resolves to the local backend; nothing here
//! returns an error to the caller.

mod hub;

pub use hub::{NotificationHub, Subscription};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;

use crate::backend::{Backend, LocalBackend, RemoteBackend};
use crate::db::ConfigStore;
use crate::errors::AppError;
use crate::models::{BackendStatus, RemoteConfig};
use crate::provision::{ensure_schema, ensure_seed, SeedAccount};
use crate::remote::{self, ClientFactory};

/// Lifecycle of the connection state machine.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionPhase {
    Uninitialized,
    Connecting,
    RemoteActive,
    LocalActive,
}

/// Tunables for [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Credentials supplied by the environment; preferred over stored ones.
    pub env_config: Option<RemoteConfig>,
    /// Upper bound on the reachability probe.
    pub probe_timeout: Duration,
    /// Accounts guaranteed to exist on whichever backend becomes active.
    pub seeds: Vec<SeedAccount>,
}

/// The active backend together with the phase that produced it.
struct Active {
    backend: Arc<dyn Backend>,
    phase: ConnectionPhase,
}

/// Owns the active backend and its status.
pub struct ConnectionManager {
    local: Arc<LocalBackend>,
    config_store: ConfigStore,
    factory: Arc<dyn ClientFactory>,
    options: ConnectionOptions,
    active: RwLock<Active>,
    /// Held while a status is published or a subscriber is registered, so every
    /// subscriber's last delivery matches the active backend. Reentrant so a
    /// callback may itself subscribe.
    publish_lock: ReentrantMutex<()>,
    hub: NotificationHub,
}

impl ConnectionManager {
    /// Create a manager serving the local backend until [`init`](Self::init) runs.
    pub fn new(
        local: Arc<LocalBackend>,
        config_store: ConfigStore,
        factory: Arc<dyn ClientFactory>,
        options: ConnectionOptions,
    ) -> Self {
        let backend: Arc<dyn Backend> = local.clone();
        Self {
            local,
            config_store,
            factory,
            options,
            active: RwLock::new(Active {
                backend,
                phase: ConnectionPhase::Uninitialized,
            }),
            publish_lock: ReentrantMutex::new(()),
            hub: NotificationHub::new(),
        }
    }

    /// Run the full connection sequence and publish the outcome.
    ///
    /// Overlapping calls are not serialized: the run that finishes last decides the
    /// active backend. Each run publishes its backend, phase and notification as one
    /// step.
    pub async fn init(&self) -> BackendStatus {
        self.active.write().phase = ConnectionPhase::Connecting;

        let backend: Arc<dyn Backend> = match self.resolve_config().await {
            Some(config) => match self.connect_remote(&config).await {
                Ok(remote) => {
                    tracing::info!("Connected to remote backend at {}", config.endpoint);
                    Arc::new(remote)
                }
                Err(e) => {
                    tracing::warn!(
                        "Remote backend unavailable, falling back to local store: {}",
                        e
                    );
                    self.activate_local().await
                }
            },
            None => {
                tracing::info!("No remote credentials configured; using local store");
                self.activate_local().await
            }
        };

        self.publish(backend)
    }

    fn publish(&self, backend: Arc<dyn Backend>) -> BackendStatus {
        let status = backend.status();
        let phase = match status {
            BackendStatus::Remote => ConnectionPhase::RemoteActive,
            BackendStatus::Local => ConnectionPhase::LocalActive,
        };

        let _publishing = self.publish_lock.lock();
        *self.active.write() = Active { backend, phase };
        self.hub.notify(status);
        status
    }

    pub fn current_status(&self) -> BackendStatus {
        self.active.read().backend.status()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.active.read().phase
    }

    /// Status and phase read together.
    pub fn snapshot(&self) -> (BackendStatus, ConnectionPhase) {
        let active = self.active.read();
        (active.backend.status(), active.phase)
    }

    /// The backend serving records right now.
    pub fn backend(&self) -> Arc<dyn Backend> {
        self.active.read().backend.clone()
    }

    /// Subscribe to status changes; `callback` first receives the current status.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(BackendStatus) + Send + Sync + 'static,
    {
        let _publishing = self.publish_lock.lock();
        self.hub.subscribe(callback, self.current_status())
    }

    /// Persist new credentials and reconnect. Returns whether the remote is now active.
    pub async fn set_remote_config(&self, endpoint: &str, auth_token: &str) -> bool {
        let config = RemoteConfig::new(endpoint.trim(), auth_token.trim());
        if let Err(e) = self.config_store.set(&config).await {
            tracing::warn!("Remote config not saved: {}", e);
            return false;
        }
        self.init().await == BackendStatus::Remote
    }

    /// Forget stored credentials and reconnect.
    pub async fn clear_remote_config(&self) {
        if let Err(e) = self.config_store.clear().await {
            tracing::error!("Failed to clear stored remote config: {}", e);
        }
        self.init().await;
    }

    /// Credentials currently stored, if any.
    pub async fn stored_config(&self) -> Option<RemoteConfig> {
        self.config_store.get().await.unwrap_or_else(|e| {
            tracing::warn!("Stored remote config unavailable: {}", e);
            None
        })
    }

    /// Probe candidate credentials without touching the live connection.
    pub async fn test_connection(&self, endpoint: &str, auth_token: &str) -> bool {
        remote::test_connection(
            self.factory.as_ref(),
            endpoint,
            auth_token,
            self.options.probe_timeout,
        )
        .await
    }

    async fn resolve_config(&self) -> Option<RemoteConfig> {
        if let Some(env) = self.options.env_config.as_ref().filter(|c| c.is_usable()) {
            return Some(env.clone());
        }
        self.stored_config().await.filter(RemoteConfig::is_usable)
    }

    async fn connect_remote(&self, config: &RemoteConfig) -> Result<RemoteBackend, AppError> {
        let client = self.factory.connect(&config.endpoint, &config.auth_token)?;

        remote::probe(client.as_ref(), self.options.probe_timeout).await?;

        ensure_schema(client.as_ref()).await?;
        let backend = RemoteBackend::new(client);
        ensure_seed(&backend, &self.options.seeds).await?;
        Ok(backend)
    }

    async fn activate_local(&self) -> Arc<dyn Backend> {
        if let Err(e) = ensure_seed(self.local.as_ref(), &self.options.seeds).await {
            tracing::error!("Seeding local store failed: {}", e);
        }
        self.local.clone()
    }
}
