//! Backend over the local key-space.
//!
//! Each collection is one JSON array under its own key. Mutations edit the raw JSON
//! records by `id`, so records this build cannot fully parse are carried through
//! untouched instead of being dropped on the next write.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use super::Backend;
use crate::db::KeySpace;
use crate::errors::AppError;
use crate::models::{BackendStatus, LogEntry, Quiz, StoredUser, SystemSettings, User};

const USERS_KEY: &str = "quizbank.users";
const QUIZZES_KEY: &str = "quizbank.quizzes";
const LOGS_KEY: &str = "quizbank.logs";
const SETTINGS_KEY: &str = "quizbank.settings";

/// Maximum number of log entries retained locally; the oldest are dropped first.
pub const LOCAL_LOG_CAPACITY: usize = 200;

/// Record storage in the local key-space.
pub struct LocalBackend {
    keys: KeySpace,
    /// Serializes read-modify-write cycles on the collections.
    write_lock: Mutex<()>,
}

impl LocalBackend {
    pub fn new(keys: KeySpace) -> Self {
        Self {
            keys,
            write_lock: Mutex::new(()),
        }
    }

    async fn load_raw(&self, key: &str) -> Result<Vec<JsonValue>, AppError> {
        Ok(self.keys.get_json(key).await?.unwrap_or_default())
    }

    async fn store_raw(&self, key: &str, records: &[JsonValue]) -> Result<(), AppError> {
        self.keys.set_json(key, records).await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, AppError> {
        Ok(self
            .load_raw(key)
            .await?
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping unreadable record in {}: {}", key, e);
                    None
                }
            })
            .collect())
    }

    async fn remove_by_id(&self, key: &str, id: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_raw(key).await?;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.store_raw(key, &records).await?;
        Ok(true)
    }

    async fn set_field(
        &self,
        key: &str,
        id: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_raw(key).await?;
        let Some(JsonValue::Object(record)) =
            records.iter_mut().find(|r| record_id(r) == Some(id))
        else {
            return Ok(false);
        };
        record.insert(field.to_string(), value);
        self.store_raw(key, &records).await?;
        Ok(true)
    }
}

fn record_id(record: &JsonValue) -> Option<&str> {
    record.get("id").and_then(JsonValue::as_str)
}

#[async_trait]
impl Backend for LocalBackend {
    fn status(&self) -> BackendStatus {
        BackendStatus::Local
    }

    // ==================== USER OPERATIONS ====================

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<StoredUser>, AppError> {
        let users: Vec<StoredUser> = self.load(USERS_KEY).await?;
        Ok(users.into_iter().find(|u| u.user.username == username))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let users: Vec<StoredUser> = self.load(USERS_KEY).await?;
        Ok(users.into_iter().map(|u| u.user).find(|u| u.id == id))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users: Vec<StoredUser> = self.load(USERS_KEY).await?;
        let mut users: Vec<User> = users.into_iter().map(|u| u.user).collect();
        users.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.username.cmp(&b.username)));
        Ok(users)
    }

    async fn insert_user(&self, user: &User, password: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_raw(USERS_KEY).await?;

        let clash = records.iter().any(|r| {
            record_id(r) == Some(user.id.as_str())
                || r.get("username").and_then(JsonValue::as_str) == Some(user.username.as_str())
        });
        if clash {
            return Err(AppError::Conflict(format!(
                "User {} or username {} already exists",
                user.id, user.username
            )));
        }

        records.push(serde_json::to_value(StoredUser {
            user: user.clone(),
            password: password.to_string(),
        })?);
        self.store_raw(USERS_KEY, &records).await
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        self.remove_by_id(USERS_KEY, id).await
    }

    async fn set_user_active(&self, id: &str, is_active: bool) -> Result<bool, AppError> {
        self.set_field(USERS_KEY, id, "isActive", JsonValue::Bool(is_active))
            .await
    }

    async fn set_user_credits(&self, id: &str, credits: u32) -> Result<bool, AppError> {
        self.set_field(USERS_KEY, id, "credits", JsonValue::from(credits))
            .await
    }

    // ==================== QUIZ OPERATIONS ====================

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_raw(QUIZZES_KEY).await?;
        if records.iter().any(|r| record_id(r) == Some(quiz.id.as_str())) {
            return Err(AppError::Conflict(format!("Quiz {} already exists", quiz.id)));
        }
        records.push(serde_json::to_value(quiz)?);
        self.store_raw(QUIZZES_KEY, &records).await
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, AppError> {
        let quizzes: Vec<Quiz> = self.load(QUIZZES_KEY).await?;
        Ok(quizzes.into_iter().find(|q| q.id == id))
    }

    async fn list_quizzes(&self, owner: Option<&str>) -> Result<Vec<Quiz>, AppError> {
        let mut quizzes: Vec<Quiz> = self.load(QUIZZES_KEY).await?;
        if let Some(owner) = owner {
            quizzes.retain(|q| q.created_by == owner);
        }
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quizzes)
    }

    async fn delete_quiz(&self, id: &str) -> Result<bool, AppError> {
        self.remove_by_id(QUIZZES_KEY, id).await
    }

    async fn set_quiz_visibility(&self, id: &str, is_public: bool) -> Result<bool, AppError> {
        self.set_field(QUIZZES_KEY, id, "isPublic", JsonValue::Bool(is_public))
            .await
    }

    // ==================== LOG OPERATIONS ====================

    async fn append_log(&self, entry: &LogEntry) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_raw(LOGS_KEY).await?;
        records.insert(0, serde_json::to_value(entry)?);
        records.truncate(LOCAL_LOG_CAPACITY);
        self.store_raw(LOGS_KEY, &records).await
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, AppError> {
        self.load(LOGS_KEY).await
    }

    async fn delete_log(&self, id: &str) -> Result<bool, AppError> {
        self.remove_by_id(LOGS_KEY, id).await
    }

    async fn clear_logs(&self) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.keys.remove(LOGS_KEY).await
    }

    // ==================== SETTINGS OPERATIONS ====================

    async fn load_settings(&self) -> Result<Option<SystemSettings>, AppError> {
        Ok(self
            .keys
            .get(SETTINGS_KEY)
            .await?
            .map(|raw| SystemSettings::from_stored(&raw)))
    }

    async fn store_settings(&self, settings: &SystemSettings) -> Result<(), AppError> {
        self.keys.set_json(SETTINGS_KEY, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{LogType, QuizPayload, QuizStatus, Role};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    async fn backend(temp_dir: &TempDir) -> LocalBackend {
        let pool = init_database(&temp_dir.path().join("local.sqlite")).await.unwrap();
        LocalBackend::new(KeySpace::new(pool))
    }

    fn teacher(id: &str, username: &str) -> User {
        User {
            id: id.to_string(),
            username: username.to_string(),
            role: Role::Teacher,
            credits: 10,
            is_active: true,
        }
    }

    fn quiz(id: &str, owner: &str, minutes: i64) -> Quiz {
        Quiz {
            id: id.to_string(),
            title: format!("Quiz {}", id),
            subject: "Math".to_string(),
            level: "SMA".to_string(),
            grade: "10".to_string(),
            topic: "Algebra".to_string(),
            payload: QuizPayload::default(),
            created_by: owner.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            status: QuizStatus::Draft,
            is_public: false,
        }
    }

    #[tokio::test]
    async fn test_log_retention_cap() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir).await;

        for i in 0..250 {
            let mut entry = LogEntry::new("generate", &format!("run {}", i), LogType::Info, "2");
            entry.id = format!("log-{}", i);
            backend.append_log(&entry).await.unwrap();
        }

        let logs = backend.list_logs().await.unwrap();
        assert_eq!(logs.len(), LOCAL_LOG_CAPACITY);
        assert_eq!(logs[0].id, "log-249");
        assert_eq!(logs[LOCAL_LOG_CAPACITY - 1].id, "log-50");
        assert!(logs.iter().all(|l| l.id != "log-49"));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir).await;

        backend.insert_user(&teacher("10", "rina"), "pw").await.unwrap();
        let err = backend.insert_user(&teacher("11", "rina"), "pw").await;
        assert!(matches!(err, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_user_updates_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir).await;

        backend.insert_user(&teacher("10", "rina"), "pw").await.unwrap();
        assert!(backend.set_user_credits("10", 3).await.unwrap());
        assert!(backend.set_user_active("10", false).await.unwrap());
        assert!(!backend.set_user_credits("missing", 3).await.unwrap());

        let user = backend.get_user("10").await.unwrap().unwrap();
        assert_eq!(user.credits, 3);
        assert!(!user.is_active);

        let stored = backend.find_user_by_username("rina").await.unwrap().unwrap();
        assert_eq!(stored.password, "pw");
        assert!(backend.find_user_by_username("Rina").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quizzes_newest_first_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir).await;

        backend.insert_quiz(&quiz("a", "2", 0)).await.unwrap();
        backend.insert_quiz(&quiz("b", "3", 10)).await.unwrap();
        backend.insert_quiz(&quiz("c", "2", 5)).await.unwrap();

        let all = backend.list_quizzes(None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let mine = backend.list_quizzes(Some("2")).await.unwrap();
        let ids: Vec<&str> = mine.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        assert!(backend.set_quiz_visibility("a", true).await.unwrap());
        assert!(backend.get_quiz("a").await.unwrap().unwrap().is_public);
        assert!(backend.delete_quiz("a").await.unwrap());
        assert!(!backend.delete_quiz("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_records_survive_writes() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir).await;

        backend
            .keys
            .set(QUIZZES_KEY, r#"[{"id":"odd","shape":"from the future"}]"#)
            .await
            .unwrap();

        assert!(backend.list_quizzes(None).await.unwrap().is_empty());
        backend.insert_quiz(&quiz("a", "2", 0)).await.unwrap();

        let raw = backend.load_raw(QUIZZES_KEY).await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(backend.list_quizzes(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settings_default_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir).await;

        assert!(backend.load_settings().await.unwrap().is_none());

        let mut settings = SystemSettings::default();
        settings.cron.enabled = false;
        backend.store_settings(&settings).await.unwrap();
        assert_eq!(backend.load_settings().await.unwrap(), Some(settings));
    }
}
