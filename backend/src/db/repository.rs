//! Record operations facade.
//!
//! Every call resolves the active backend once through the connection manager and runs
//! against it; a failing call never retries on the other backend. Reads swallow errors
//! into empty results, writes return them, and privileged writes check the acting user.

use std::sync::Arc;

use crate::auth::{
    authorize_credit_change, authorize_quiz_owner, constant_time_compare, ensure_not_protected,
    require_active, require_admin,
};
use crate::backend::Backend;
use crate::connection::ConnectionManager;
use crate::errors::AppError;
use crate::models::{
    BackendStatus, CreateUserRequest, LogEntry, LogType, Quiz, SystemSettings, User,
};

/// Facade over whichever backend is active.
#[derive(Clone)]
pub struct Repository {
    connection: Arc<ConnectionManager>,
}

impl Repository {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    pub fn status(&self) -> BackendStatus {
        self.connection.current_status()
    }

    fn backend(&self) -> Arc<dyn Backend> {
        self.connection.backend()
    }

    // ==================== USER OPERATIONS ====================

    /// Exact username and password match. Deactivated accounts still authenticate;
    /// callers decide what they may do.
    pub async fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let stored = self
            .backend()
            .find_user_by_username(username)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Login lookup for {:?} failed: {}", username, e);
                None
            })?;

        if constant_time_compare(&stored.password, password) {
            Some(stored.user)
        } else {
            None
        }
    }

    /// All accounts ordered by role, then username.
    pub async fn get_all_users(&self) -> Vec<User> {
        self.backend().list_users().await.unwrap_or_else(|e| {
            tracing::error!("Listing users failed: {}", e);
            Vec::new()
        })
    }

    pub async fn get_user(&self, id: &str) -> Option<User> {
        self.backend().get_user(id).await.unwrap_or_else(|e| {
            tracing::error!("Loading user {} failed: {}", id, e);
            None
        })
    }

    pub async fn create_user(
        &self,
        actor: &User,
        request: &CreateUserRequest,
    ) -> Result<User, AppError> {
        require_admin(actor)?;

        let username = request.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if request.password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }

        let user = User {
            id: request
                .id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            username: username.to_string(),
            role: request.role,
            credits: request.credits,
            is_active: request.is_active,
        };

        let backend = self.backend();
        if backend.find_user_by_username(&user.username).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        backend.insert_user(&user, &request.password).await?;

        tracing::info!("{} created account {:?}", actor.username, user.username);
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &User, id: &str) -> Result<(), AppError> {
        require_admin(actor)?;
        ensure_not_protected(id)?;

        if !self.backend().delete_user(id).await? {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        tracing::info!("{} deleted account {}", actor.username, id);
        Ok(())
    }

    pub async fn toggle_user_status(
        &self,
        actor: &User,
        id: &str,
        is_active: bool,
    ) -> Result<(), AppError> {
        require_admin(actor)?;
        if !is_active {
            ensure_not_protected(id)?;
        }

        if !self.backend().set_user_active(id, is_active).await? {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    pub async fn update_user_credits(
        &self,
        actor: &User,
        id: &str,
        credits: u32,
    ) -> Result<(), AppError> {
        let backend = self.backend();
        let target = backend
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        authorize_credit_change(actor, &target, credits)?;

        if !backend.set_user_credits(id, credits).await? {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    // ==================== QUIZ OPERATIONS ====================

    /// Persist a new quiz. Teachers can only save quizzes under their own id.
    pub async fn save_quiz(&self, actor: &User, quiz: Quiz) -> Result<Quiz, AppError> {
        require_active(actor)?;
        if !actor.is_admin() && quiz.created_by != actor.id {
            return Err(AppError::Forbidden(
                "Quizzes can only be saved for your own account".to_string(),
            ));
        }
        if quiz.title.trim().is_empty() {
            return Err(AppError::Validation("Quiz title is required".to_string()));
        }

        self.backend().insert_quiz(&quiz).await?;
        Ok(quiz)
    }

    /// Quizzes newest first. `owner` narrows to one account's quizzes.
    pub async fn get_quizzes(&self, owner: Option<&str>) -> Vec<Quiz> {
        self.backend().list_quizzes(owner).await.unwrap_or_else(|e| {
            tracing::error!("Listing quizzes failed: {}", e);
            Vec::new()
        })
    }

    pub async fn delete_quiz(&self, actor: &User, id: &str) -> Result<(), AppError> {
        let backend = self.backend();
        let quiz = backend
            .get_quiz(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", id)))?;
        authorize_quiz_owner(actor, &quiz)?;

        backend.delete_quiz(id).await?;
        Ok(())
    }

    pub async fn toggle_quiz_visibility(
        &self,
        actor: &User,
        id: &str,
        is_public: bool,
    ) -> Result<(), AppError> {
        let backend = self.backend();
        let quiz = backend
            .get_quiz(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", id)))?;
        authorize_quiz_owner(actor, &quiz)?;

        backend.set_quiz_visibility(id, is_public).await?;
        Ok(())
    }

    // ==================== LOG OPERATIONS ====================

    /// Append an activity entry. Failures are logged and otherwise ignored.
    pub async fn add_log(&self, action: &str, details: &str, log_type: LogType, user_id: &str) {
        let entry = LogEntry::new(action, details, log_type, user_id);
        if let Err(e) = self.backend().append_log(&entry).await {
            tracing::error!("Recording activity {:?} failed: {}", action, e);
        }
    }

    /// Most recent entries first.
    pub async fn get_logs(&self) -> Vec<LogEntry> {
        self.backend().list_logs().await.unwrap_or_else(|e| {
            tracing::error!("Listing logs failed: {}", e);
            Vec::new()
        })
    }

    pub async fn clear_logs(&self, actor: &User) -> Result<(), AppError> {
        require_admin(actor)?;
        self.backend().clear_logs().await?;
        tracing::info!("{} cleared the activity log", actor.username);
        Ok(())
    }

    pub async fn delete_log(&self, actor: &User, id: &str) -> Result<(), AppError> {
        require_admin(actor)?;
        if !self.backend().delete_log(id).await? {
            return Err(AppError::NotFound(format!("Log entry {} not found", id)));
        }
        Ok(())
    }

    // ==================== SETTINGS OPERATIONS ====================

    /// Stored settings merged over the defaults.
    pub async fn get_settings(&self) -> SystemSettings {
        match self.backend().load_settings().await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                tracing::error!("Loading settings failed: {}", e);
                SystemSettings::default()
            }
        }
    }

    pub async fn save_settings(
        &self,
        actor: &User,
        settings: &SystemSettings,
    ) -> Result<(), AppError> {
        require_admin(actor)?;
        self.backend().store_settings(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::backend::{LocalBackend, LOCAL_LOG_CAPACITY};
    use crate::connection::ConnectionOptions;
    use crate::db::{init_database, ConfigStore, KeySpace};
    use crate::models::{QuizPayload, QuizStatus, Role};
    use crate::provision::{
        bootstrap_accounts, SEED_ADMIN_ID, SEED_ADMIN_USERNAME, SEED_TEACHER_ID,
        SEED_TEACHER_USERNAME,
    };
    use crate::remote::sqlite::{SqliteClient, SqliteClientFactory};

    const ENDPOINT: &str = "https://quiz-db.example.io";
    const TOKEN: &str = "good-token";

    struct Fixture {
        repo: Repository,
        connection: Arc<ConnectionManager>,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("local.sqlite")).await.unwrap();
        let keys = KeySpace::new(pool);
        let remote = SqliteClient::open(&temp_dir.path().join("remote.sqlite")).await;

        let connection = Arc::new(ConnectionManager::new(
            Arc::new(LocalBackend::new(keys.clone())),
            ConfigStore::new(keys),
            Arc::new(SqliteClientFactory::new(remote, TOKEN)),
            ConnectionOptions {
                env_config: None,
                probe_timeout: Duration::from_secs(5),
                seeds: bootstrap_accounts("admin-pw", "teacher-pw"),
            },
        ));
        connection.init().await;

        Fixture {
            repo: Repository::new(connection.clone()),
            connection,
            _temp_dir: temp_dir,
        }
    }

    async fn admin(repo: &Repository) -> User {
        repo.get_user(SEED_ADMIN_ID).await.unwrap()
    }

    async fn teacher(repo: &Repository) -> User {
        repo.get_user(SEED_TEACHER_ID).await.unwrap()
    }

    fn quiz(id: &str, owner: &str, minutes_ago: i64) -> Quiz {
        Quiz {
            id: id.to_string(),
            title: format!("Quiz {}", id),
            subject: "Biology".to_string(),
            level: "SMA".to_string(),
            grade: "10".to_string(),
            topic: "Cells".to_string(),
            payload: QuizPayload {
                questions: vec![json!({"id": "q1", "text": "What is a cell?"})],
                blueprint: vec![json!({"indicator": "explain"})],
                subject_category: "Peminatan MIPA".to_string(),
                sub_topic: Some("Organelles".to_string()),
            },
            created_by: owner.to_string(),
            created_at: chrono::Utc::now() - chrono::Duration::minutes(minutes_ago),
            status: QuizStatus::Published,
            is_public: false,
        }
    }

    fn new_user(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            id: None,
            username: username.to_string(),
            password: "secret".to_string(),
            role: Role::Teacher,
            credits: 10,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_authenticate_exact_match() {
        let f = fixture().await;

        let user = f
            .repo
            .authenticate(SEED_TEACHER_USERNAME, "teacher-pw")
            .await
            .unwrap();
        assert_eq!(user.id, SEED_TEACHER_ID);

        assert!(f.repo.authenticate(SEED_TEACHER_USERNAME, "TEACHER-PW").await.is_none());
        assert!(f
            .repo
            .authenticate(&SEED_TEACHER_USERNAME.to_uppercase(), "teacher-pw")
            .await
            .is_none());
        assert!(f.repo.authenticate("nobody", "teacher-pw").await.is_none());
    }

    #[tokio::test]
    async fn test_user_lifecycle_requires_admin() {
        let f = fixture().await;
        let admin = admin(&f.repo).await;
        let teacher = teacher(&f.repo).await;

        let err = f.repo.create_user(&teacher, &new_user("budi")).await;
        assert!(matches!(err, Err(AppError::Forbidden(_))));

        let created = f.repo.create_user(&admin, &new_user("budi")).await.unwrap();
        assert_eq!(f.repo.get_all_users().await.len(), 3);

        let dup = f.repo.create_user(&admin, &new_user("budi")).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        f.repo.toggle_user_status(&admin, &created.id, false).await.unwrap();
        assert!(!f.repo.get_user(&created.id).await.unwrap().is_active);

        f.repo.delete_user(&admin, &created.id).await.unwrap();
        assert!(f.repo.get_user(&created.id).await.is_none());

        let missing = f.repo.delete_user(&admin, &created.id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_seed_admin_cannot_be_removed() {
        let f = fixture().await;
        let admin = admin(&f.repo).await;

        assert!(matches!(
            f.repo.delete_user(&admin, SEED_ADMIN_ID).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.repo.toggle_user_status(&admin, SEED_ADMIN_ID, false).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(f
            .repo
            .authenticate(SEED_ADMIN_USERNAME, "admin-pw")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_credit_updates() {
        let f = fixture().await;
        let admin = admin(&f.repo).await;
        let teacher = teacher(&f.repo).await;

        f.repo
            .update_user_credits(&teacher, SEED_TEACHER_ID, 49)
            .await
            .unwrap();
        assert!(f
            .repo
            .update_user_credits(&teacher, SEED_TEACHER_ID, 100)
            .await
            .is_err());

        f.repo
            .update_user_credits(&admin, SEED_TEACHER_ID, 100)
            .await
            .unwrap();
        assert_eq!(teacher_credits(&f.repo).await, 100);
    }

    async fn teacher_credits(repo: &Repository) -> u32 {
        repo.get_user(SEED_TEACHER_ID).await.unwrap().credits
    }

    #[tokio::test]
    async fn test_save_and_list_quizzes_round_trip() {
        let f = fixture().await;
        let teacher = teacher(&f.repo).await;
        let admin = admin(&f.repo).await;

        let saved = f.repo.save_quiz(&teacher, quiz("old", SEED_TEACHER_ID, 10)).await.unwrap();
        f.repo.save_quiz(&teacher, quiz("new", SEED_TEACHER_ID, 1)).await.unwrap();
        f.repo.save_quiz(&admin, quiz("admin-quiz", SEED_ADMIN_ID, 5)).await.unwrap();

        let mine = f.repo.get_quizzes(Some(SEED_TEACHER_ID)).await;
        assert_eq!(
            mine.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(),
            vec!["new", "old"]
        );
        let old = mine.iter().find(|q| q.id == "old").unwrap();
        assert_eq!(old.payload, saved.payload);

        assert_eq!(f.repo.get_quizzes(None).await.len(), 3);

        let foreign = f.repo.save_quiz(&teacher, quiz("x", SEED_ADMIN_ID, 0)).await;
        assert!(matches!(foreign, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_quiz_ownership_is_enforced() {
        let f = fixture().await;
        let admin = admin(&f.repo).await;
        let teacher = teacher(&f.repo).await;
        f.repo.save_quiz(&admin, quiz("a1", SEED_ADMIN_ID, 0)).await.unwrap();
        f.repo.save_quiz(&teacher, quiz("t1", SEED_TEACHER_ID, 0)).await.unwrap();

        assert!(f.repo.delete_quiz(&teacher, "a1").await.is_err());
        f.repo.toggle_quiz_visibility(&teacher, "t1", true).await.unwrap();
        assert!(f.repo.get_quizzes(Some(SEED_TEACHER_ID)).await[0].is_public);

        f.repo.delete_quiz(&admin, "t1").await.unwrap();
        assert!(f.repo.get_quizzes(Some(SEED_TEACHER_ID)).await.is_empty());
        assert!(matches!(
            f.repo.delete_quiz(&admin, "t1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_logs_capped_and_admin_cleared() {
        let f = fixture().await;
        let admin = admin(&f.repo).await;
        let teacher = teacher(&f.repo).await;

        for i in 0..(LOCAL_LOG_CAPACITY + 5) {
            f.repo
                .add_log("GENERATE", &format!("quiz {}", i), LogType::Info, SEED_TEACHER_ID)
                .await;
        }
        let logs = f.repo.get_logs().await;
        assert_eq!(logs.len(), LOCAL_LOG_CAPACITY);
        assert_eq!(logs[0].details, format!("quiz {}", LOCAL_LOG_CAPACITY + 4));

        f.repo.delete_log(&admin, &logs[0].id).await.unwrap();
        assert_eq!(f.repo.get_logs().await.len(), LOCAL_LOG_CAPACITY - 1);

        assert!(f.repo.clear_logs(&teacher).await.is_err());
        f.repo.clear_logs(&admin).await.unwrap();
        assert!(f.repo.get_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_settings_default_then_saved() {
        let f = fixture().await;
        let admin = admin(&f.repo).await;
        let teacher = teacher(&f.repo).await;

        let mut settings = f.repo.get_settings().await;
        assert_eq!(settings, SystemSettings::default());

        settings.cron.enabled = false;
        assert!(f.repo.save_settings(&teacher, &settings).await.is_err());
        f.repo.save_settings(&admin, &settings).await.unwrap();

        let loaded = f.repo.get_settings().await;
        assert!(!loaded.cron.enabled);
        assert!(loaded.ai.fact_check);
    }

    #[tokio::test]
    async fn test_reads_follow_the_active_backend() {
        let f = fixture().await;
        let teacher = teacher(&f.repo).await;
        f.repo.save_quiz(&teacher, quiz("local-1", SEED_TEACHER_ID, 0)).await.unwrap();

        assert!(f.connection.set_remote_config(ENDPOINT, TOKEN).await);
        assert_eq!(f.repo.status(), BackendStatus::Remote);
        assert!(f.repo.get_quizzes(None).await.is_empty());

        let remote_teacher = teacher_on_active(&f.repo).await;
        f.repo
            .save_quiz(&remote_teacher, quiz("remote-1", SEED_TEACHER_ID, 0))
            .await
            .unwrap();

        f.connection.clear_remote_config().await;
        assert_eq!(f.repo.status(), BackendStatus::Local);
        let ids: Vec<String> = f.repo.get_quizzes(None).await.into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["local-1".to_string()]);
    }

    async fn teacher_on_active(repo: &Repository) -> User {
        repo.authenticate(SEED_TEACHER_USERNAME, "teacher-pw")
            .await
            .unwrap()
    }
}
