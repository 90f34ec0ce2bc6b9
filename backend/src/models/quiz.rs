//! Generated quizzes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category assumed for quizzes written before categories existed.
pub const DEFAULT_SUBJECT_CATEGORY: &str = "Wajib Umum";

/// Publication state of a quiz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "DRAFT",
            QuizStatus::Published => "PUBLISHED",
            QuizStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(QuizStatus::Draft),
            "PUBLISHED" => Some(QuizStatus::Published),
            "ARCHIVED" => Some(QuizStatus::Archived),
            _ => None,
        }
    }
}

/// Structured content produced by the generator.
///
/// Questions and blueprint rows are opaque here; only the generator and the
/// renderer interpret them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    #[serde(default)]
    pub questions: Vec<serde_json::Value>,
    #[serde(default)]
    pub blueprint: Vec<serde_json::Value>,
    #[serde(default = "default_subject_category")]
    pub subject_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_topic: Option<String>,
}

fn default_subject_category() -> String {
    DEFAULT_SUBJECT_CATEGORY.to_string()
}

impl Default for QuizPayload {
    fn default() -> Self {
        Self {
            questions: Vec::new(),
            blueprint: Vec::new(),
            subject_category: default_subject_category(),
            sub_topic: None,
        }
    }
}

impl QuizPayload {
    /// Read a stored payload column, accepting both the current object shape and
    /// the legacy shape where the column held only the question array.
    pub fn from_stored(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(questions)) => Self {
                questions,
                ..Self::default()
            },
            Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value)
                .unwrap_or_else(|e| {
                    tracing::warn!("Unreadable quiz payload, using defaults: {}", e);
                    Self::default()
                }),
            Ok(other) => {
                tracing::warn!("Unexpected quiz payload type: {}", other);
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Malformed quiz payload JSON, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

/// A quiz as persisted by either backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub topic: String,
    #[serde(flatten)]
    pub payload: QuizPayload,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: QuizStatus,
    #[serde(default)]
    pub is_public: bool,
}

/// Request body for saving a freshly generated quiz.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveQuizRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub topic: String,
    #[serde(flatten)]
    pub payload: QuizPayload,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub status: QuizStatus,
    #[serde(default)]
    pub is_public: bool,
}

impl SaveQuizRequest {
    /// Build the quiz to persist, owned by `owner` unless the request names one.
    pub fn into_quiz(self, owner: &str) -> Quiz {
        Quiz {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: self.title,
            subject: self.subject,
            level: self.level,
            grade: self.grade,
            topic: self.topic,
            payload: self.payload,
            created_by: self.created_by.unwrap_or_else(|| owner.to_string()),
            created_at: Utc::now(),
            status: self.status,
            is_public: self.is_public,
        }
    }
}

/// Query parameters for listing quizzes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizQuery {
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisibilityRequest {
    pub is_public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_reads_legacy_array() {
        let payload = QuizPayload::from_stored(r#"[{"id":"q1"},{"id":"q2"}]"#);
        assert_eq!(payload.questions.len(), 2);
        assert!(payload.blueprint.is_empty());
        assert_eq!(payload.subject_category, DEFAULT_SUBJECT_CATEGORY);
        assert!(payload.sub_topic.is_none());
    }

    #[test]
    fn test_payload_reads_object_with_missing_fields() {
        let payload = QuizPayload::from_stored(r#"{"questions":[{"id":"q1"}],"subTopic":"Cells"}"#);
        assert_eq!(payload.questions, vec![json!({"id": "q1"})]);
        assert_eq!(payload.subject_category, DEFAULT_SUBJECT_CATEGORY);
        assert_eq!(payload.sub_topic.as_deref(), Some("Cells"));
    }

    #[test]
    fn test_payload_tolerates_garbage() {
        assert_eq!(QuizPayload::from_stored("not json"), QuizPayload::default());
        assert_eq!(QuizPayload::from_stored("42"), QuizPayload::default());
    }

    #[test]
    fn test_quiz_json_is_flat() {
        let value = json!({
            "id": "quiz-1",
            "title": "Photosynthesis",
            "subject": "Biology",
            "level": "SMA",
            "grade": "10",
            "topic": "Plants",
            "questions": [],
            "blueprint": [],
            "subjectCategory": "Peminatan MIPA",
            "createdBy": "2",
            "createdAt": "2024-05-01T08:00:00.000Z",
            "status": "PUBLISHED",
            "isPublic": true
        });
        let quiz: Quiz = serde_json::from_value(value).unwrap();
        assert_eq!(quiz.payload.subject_category, "Peminatan MIPA");
        assert_eq!(quiz.status, QuizStatus::Published);

        let back = serde_json::to_value(&quiz).unwrap();
        assert_eq!(back["subjectCategory"], "Peminatan MIPA");
        assert!(back.get("payload").is_none());
    }

    #[test]
    fn test_save_request_assigns_id_and_owner() {
        let request: SaveQuizRequest = serde_json::from_value(json!({
            "id": "  ",
            "title": "Algebra",
            "subject": "Math",
            "questions": [{"id": "q1"}]
        }))
        .unwrap();

        let quiz = request.into_quiz("2");
        assert!(!quiz.id.trim().is_empty());
        assert_eq!(quiz.created_by, "2");
        assert_eq!(quiz.status, QuizStatus::Draft);
        assert_eq!(quiz.payload.questions.len(), 1);
        assert!(!quiz.is_public);
    }
}
