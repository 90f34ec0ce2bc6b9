//! Record storage backends.
//!
//! [`Backend`] is the full capability set the facade needs. The connection manager picks
//! one implementation at a time and the facade calls it without branching.

mod local;
mod remote;

pub use local::{LocalBackend, LOCAL_LOG_CAPACITY};
pub use remote::RemoteBackend;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{BackendStatus, LogEntry, Quiz, StoredUser, SystemSettings, User};

/// Storage operations for every record collection.
///
/// Mutations that target a single record by id return `true` when a record was changed.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which status this backend represents.
    fn status(&self) -> BackendStatus;

    // ==================== USERS ====================

    /// Exact, case-sensitive username lookup including the stored secret.
    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<StoredUser>, AppError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;

    /// All users ordered by role, then username.
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Insert a new account. Duplicate ids or usernames are a `Conflict`.
    async fn insert_user(&self, user: &User, password: &str) -> Result<(), AppError>;

    async fn delete_user(&self, id: &str) -> Result<bool, AppError>;

    async fn set_user_active(&self, id: &str, is_active: bool) -> Result<bool, AppError>;

    async fn set_user_credits(&self, id: &str, credits: u32) -> Result<bool, AppError>;

    // ==================== QUIZZES ====================

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), AppError>;

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, AppError>;

    /// Quizzes newest first, optionally restricted to one owner.
    async fn list_quizzes(&self, owner: Option<&str>) -> Result<Vec<Quiz>, AppError>;

    async fn delete_quiz(&self, id: &str) -> Result<bool, AppError>;

    async fn set_quiz_visibility(&self, id: &str, is_public: bool) -> Result<bool, AppError>;

    // ==================== LOGS ====================

    async fn append_log(&self, entry: &LogEntry) -> Result<(), AppError>;

    /// Newest first, at most [`LOCAL_LOG_CAPACITY`] entries.
    async fn list_logs(&self) -> Result<Vec<LogEntry>, AppError>;

    async fn delete_log(&self, id: &str) -> Result<bool, AppError>;

    async fn clear_logs(&self) -> Result<(), AppError>;

    // ==================== SETTINGS ====================

    /// The stored settings merged over defaults, or `None` if never saved.
    async fn load_settings(&self) -> Result<Option<SystemSettings>, AppError>;

    async fn store_settings(&self, settings: &SystemSettings) -> Result<(), AppError>;
}
