//! Backend over the remote relational service.
//!
//! Uses positional-parameter statements only; the table layout is created by
//! [`crate::provision::ensure_schema`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{Backend, LOCAL_LOG_CAPACITY};
use crate::errors::AppError;
use crate::models::{
    BackendStatus, LogEntry, LogType, Quiz, QuizPayload, QuizStatus, Role, StoredUser,
    SystemSettings, User, SETTINGS_KEY,
};
use crate::remote::{ClientError, ResultSet, Row, SqlClient, Statement, Value};

const USER_COLUMNS: &str = "id, username, password, role, credits, is_active";
const QUIZ_COLUMNS: &str =
    "id, title, subject, level, grade, topic, data, created_by, created_at, status, is_public";
const LOG_COLUMNS: &str = "id, action, details, type, user_id, timestamp";

/// Record storage on the remote service.
#[derive(Clone)]
pub struct RemoteBackend {
    client: Arc<dyn SqlClient>,
}

impl RemoteBackend {
    pub fn new(client: Arc<dyn SqlClient>) -> Self {
        Self { client }
    }

    async fn run(&self, sql: &str, args: Vec<Value>) -> Result<ResultSet, AppError> {
        Ok(self.client.execute(Statement::with_args(sql, args)).await?)
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn status(&self) -> BackendStatus {
        BackendStatus::Remote
    }

    // ==================== USER OPERATIONS ====================

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<StoredUser>, AppError> {
        let result = self
            .run(
                &format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS),
                vec![username.into()],
            )
            .await?;

        match result.rows.first() {
            Some(row) => Ok(Some(StoredUser {
                user: user_from_row(row)?,
                password: row.opt_text("password").unwrap_or_default(),
            })),
            None => Ok(None),
        }
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let result = self
            .run(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                vec![id.into()],
            )
            .await?;

        match result.rows.first() {
            Some(row) => Ok(Some(user_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let result = self
            .run(
                &format!(
                    "SELECT {} FROM users ORDER BY role ASC, username ASC",
                    USER_COLUMNS
                ),
                Vec::new(),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .filter_map(|row| match user_from_row(row) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Skipping unreadable user row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn insert_user(&self, user: &User, password: &str) -> Result<(), AppError> {
        self.run(
            "INSERT INTO users (id, username, password, role, credits, is_active) VALUES (?, ?, ?, ?, ?, ?)",
            vec![
                user.id.as_str().into(),
                user.username.as_str().into(),
                password.into(),
                user.role.as_str().into(),
                user.credits.into(),
                user.is_active.into(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .run("DELETE FROM users WHERE id = ?", vec![id.into()])
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_user_active(&self, id: &str, is_active: bool) -> Result<bool, AppError> {
        let result = self
            .run(
                "UPDATE users SET is_active = ? WHERE id = ?",
                vec![is_active.into(), id.into()],
            )
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_user_credits(&self, id: &str, credits: u32) -> Result<bool, AppError> {
        let result = self
            .run(
                "UPDATE users SET credits = ? WHERE id = ?",
                vec![credits.into(), id.into()],
            )
            .await?;
        Ok(result.rows_affected > 0)
    }

    // ==================== QUIZ OPERATIONS ====================

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), AppError> {
        let data = serde_json::to_string(&quiz.payload)?;

        self.run(
            &format!(
                "INSERT INTO quizzes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                QUIZ_COLUMNS
            ),
            vec![
                quiz.id.as_str().into(),
                quiz.title.as_str().into(),
                quiz.subject.as_str().into(),
                quiz.level.as_str().into(),
                quiz.grade.as_str().into(),
                quiz.topic.as_str().into(),
                data.into(),
                quiz.created_by.as_str().into(),
                format_timestamp(&quiz.created_at).into(),
                quiz.status.as_str().into(),
                quiz.is_public.into(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, AppError> {
        let result = self
            .run(
                &format!("SELECT {} FROM quizzes WHERE id = ?", QUIZ_COLUMNS),
                vec![id.into()],
            )
            .await?;

        match result.rows.first() {
            Some(row) => Ok(Some(quiz_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_quizzes(&self, owner: Option<&str>) -> Result<Vec<Quiz>, AppError> {
        let mut sql = format!("SELECT {} FROM quizzes", QUIZ_COLUMNS);
        let mut args: Vec<Value> = Vec::new();
        if let Some(owner) = owner {
            sql.push_str(" WHERE created_by = ?");
            args.push(owner.into());
        }
        sql.push_str(" ORDER BY created_at DESC");

        let result = self.run(&sql, args).await?;

        // A single unreadable row should not hide the rest of the list.
        Ok(result
            .rows
            .iter()
            .filter_map(|row| match quiz_from_row(row) {
                Ok(quiz) => Some(quiz),
                Err(e) => {
                    tracing::warn!("Skipping unreadable quiz row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn delete_quiz(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .run("DELETE FROM quizzes WHERE id = ?", vec![id.into()])
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_quiz_visibility(&self, id: &str, is_public: bool) -> Result<bool, AppError> {
        let result = self
            .run(
                "UPDATE quizzes SET is_public = ? WHERE id = ?",
                vec![is_public.into(), id.into()],
            )
            .await?;
        Ok(result.rows_affected > 0)
    }

    // ==================== LOG OPERATIONS ====================

    async fn append_log(&self, entry: &LogEntry) -> Result<(), AppError> {
        self.run(
            &format!("INSERT INTO logs ({}) VALUES (?, ?, ?, ?, ?, ?)", LOG_COLUMNS),
            vec![
                entry.id.as_str().into(),
                entry.action.as_str().into(),
                entry.details.as_str().into(),
                entry.log_type.as_str().into(),
                entry.user_id.as_str().into(),
                entry.timestamp.into(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, AppError> {
        let result = self
            .run(
                &format!(
                    "SELECT {} FROM logs ORDER BY timestamp DESC LIMIT {}",
                    LOG_COLUMNS, LOCAL_LOG_CAPACITY
                ),
                Vec::new(),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .filter_map(|row| match log_from_row(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable log row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn delete_log(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .run("DELETE FROM logs WHERE id = ?", vec![id.into()])
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn clear_logs(&self) -> Result<(), AppError> {
        self.run("DELETE FROM logs", Vec::new()).await?;
        Ok(())
    }

    // ==================== SETTINGS OPERATIONS ====================

    async fn load_settings(&self) -> Result<Option<SystemSettings>, AppError> {
        let result = self
            .run(
                "SELECT data FROM settings WHERE id = ?",
                vec![SETTINGS_KEY.into()],
            )
            .await?;

        Ok(result
            .rows
            .first()
            .and_then(|row| row.opt_text("data"))
            .map(|raw| SystemSettings::from_stored(&raw)))
    }

    async fn store_settings(&self, settings: &SystemSettings) -> Result<(), AppError> {
        let data = serde_json::to_string(settings)?;
        self.run(
            "INSERT INTO settings (id, data) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            vec![SETTINGS_KEY.into(), data.into()],
        )
        .await?;
        Ok(())
    }
}

// Helper functions for row conversion

/// Millisecond RFC 3339 in UTC, so text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn user_from_row(row: &Row) -> Result<User, ClientError> {
    let role_str = row.text("role")?;
    let role = Role::parse(&role_str).unwrap_or_else(|| {
        tracing::warn!("Unknown role {:?}; treating as teacher", role_str);
        Role::Teacher
    });
    let credits = row.integer("credits").unwrap_or(0);

    Ok(User {
        id: row.text("id")?,
        username: row.text("username")?,
        role,
        credits: u32::try_from(credits.max(0)).unwrap_or(u32::MAX),
        is_active: row.boolean("is_active")?,
    })
}

fn quiz_from_row(row: &Row) -> Result<Quiz, ClientError> {
    let payload = row
        .opt_text("data")
        .map(|raw| QuizPayload::from_stored(&raw))
        .unwrap_or_default();

    let created_at_raw = row.opt_text("created_at").unwrap_or_default();
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!("Unreadable quiz timestamp {:?}", created_at_raw);
            DateTime::<Utc>::default()
        });

    let status = row
        .opt_text("status")
        .and_then(|s| QuizStatus::parse(&s))
        .unwrap_or_default();

    Ok(Quiz {
        id: row.text("id")?,
        title: row.opt_text("title").unwrap_or_default(),
        subject: row.opt_text("subject").unwrap_or_default(),
        level: row.opt_text("level").unwrap_or_default(),
        grade: row.opt_text("grade").unwrap_or_default(),
        topic: row.opt_text("topic").unwrap_or_default(),
        payload,
        created_by: row.opt_text("created_by").unwrap_or_default(),
        created_at,
        status,
        is_public: row.boolean("is_public")?,
    })
}

fn log_from_row(row: &Row) -> Result<LogEntry, ClientError> {
    Ok(LogEntry {
        id: row.text("id")?,
        action: row.opt_text("action").unwrap_or_default(),
        details: row.opt_text("details").unwrap_or_default(),
        log_type: row
            .opt_text("type")
            .and_then(|s| LogType::parse(&s))
            .unwrap_or_default(),
        user_id: row.opt_text("user_id").unwrap_or_default(),
        timestamp: row.integer("timestamp").unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::ensure_schema;
    use crate::remote::sqlite::SqliteClient;
    use tempfile::TempDir;

    async fn remote_backend(temp_dir: &TempDir) -> RemoteBackend {
        let client = SqliteClient::open(&temp_dir.path().join("remote.sqlite")).await;
        ensure_schema(&client).await.unwrap();
        RemoteBackend::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_list_users_skips_unreadable_rows() {
        let temp_dir = TempDir::new().unwrap();
        let backend = remote_backend(&temp_dir).await;

        let user = User {
            id: "7".to_string(),
            username: "cikgu".to_string(),
            role: Role::Teacher,
            credits: 10,
            is_active: true,
        };
        backend.insert_user(&user, "pw").await.unwrap();
        backend
            .run(
                "INSERT INTO users (id, username, password, role, credits, is_active) \
                 VALUES ('8', NULL, 'pw', NULL, 0, 1)",
                Vec::new(),
            )
            .await
            .unwrap();

        let users = backend.list_users().await.unwrap();
        assert_eq!(users, vec![user]);
    }

    #[tokio::test]
    async fn test_list_logs_skips_unreadable_rows() {
        let temp_dir = TempDir::new().unwrap();
        let backend = remote_backend(&temp_dir).await;

        let entry = LogEntry::new("LOGIN", "signed in", LogType::Info, "cikgu");
        backend.append_log(&entry).await.unwrap();
        backend
            .run(
                "INSERT INTO logs (id, action, details, type, user_id, timestamp) \
                 VALUES (NULL, 'LOGIN', 'broken', 'INFO', 'cikgu', 1)",
                Vec::new(),
            )
            .await
            .unwrap();

        let logs = backend.list_logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, entry.id);
    }
}
