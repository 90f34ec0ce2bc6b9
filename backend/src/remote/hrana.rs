//! libSQL HTTP pipeline client.
//!
//! Each [`SqlClient::execute`] is one `POST {endpoint}/v2/pipeline` carrying an
//! `execute` request followed by `close`, so no server-side stream outlives a call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{
    normalize_endpoint, ClientError, ClientFactory, ResultSet, Row, SqlClient, Statement, Value,
};

/// Client bound to one endpoint and token.
pub struct HttpSqlClient {
    http: reqwest::Client,
    pipeline_url: String,
    auth_token: String,
}

impl HttpSqlClient {
    /// Build a client. `endpoint` is normalized here; no request is sent.
    pub fn new(endpoint: &str, auth_token: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = normalize_endpoint(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            pipeline_url: format!("{}/v2/pipeline", base),
            auth_token: auth_token.to_string(),
        })
    }

    #[cfg(test)]
    pub fn pipeline_url(&self) -> &str {
        &self.pipeline_url
    }
}

#[async_trait]
impl SqlClient for HttpSqlClient {
    async fn execute(&self, statement: Statement) -> Result<ResultSet, ClientError> {
        let body = PipelineRequest::single(statement);

        let response = self
            .http
            .post(&self.pipeline_url)
            .bearer_auth(&self.auth_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let pipeline: PipelineResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("unreadable pipeline response: {}", e)))?;
        pipeline.into_result_set()
    }
}

/// Builds [`HttpSqlClient`]s with a shared timeout.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(
        &self,
        endpoint: &str,
        auth_token: &str,
    ) -> Result<Arc<dyn SqlClient>, ClientError> {
        Ok(Arc::new(HttpSqlClient::new(endpoint, auth_token, self.timeout)?))
    }
}

// ==================== WIRE FORMAT ====================

#[derive(Debug, Serialize)]
struct PipelineRequest {
    baton: Option<String>,
    requests: Vec<StreamRequest>,
}

impl PipelineRequest {
    fn single(statement: Statement) -> Self {
        Self {
            baton: None,
            requests: vec![
                StreamRequest::Execute {
                    stmt: WireStatement {
                        sql: statement.sql,
                        args: statement.args.into_iter().map(WireValue::from).collect(),
                        want_rows: true,
                    },
                },
                StreamRequest::Close,
            ],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamRequest {
    Execute { stmt: WireStatement },
    Close,
}

#[derive(Debug, Serialize)]
struct WireStatement {
    sql: String,
    args: Vec<WireValue>,
    want_rows: bool,
}

/// Integers travel as strings so 64-bit values survive JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireValue {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => WireValue::Null,
            Value::Integer(i) => WireValue::Integer {
                value: i.to_string(),
            },
            Value::Float(f) => WireValue::Float { value: f },
            Value::Text(s) => WireValue::Text { value: s },
        }
    }
}

impl WireValue {
    fn into_value(self) -> Result<Value, ClientError> {
        match self {
            WireValue::Null => Ok(Value::Null),
            WireValue::Integer { value } => value
                .parse()
                .map(Value::Integer)
                .map_err(|_| ClientError::Protocol(format!("bad integer value: {}", value))),
            WireValue::Float { value } => Ok(Value::Float(value)),
            WireValue::Text { value } => Ok(Value::Text(value)),
            WireValue::Blob { .. } => Err(ClientError::Protocol(
                "blob columns are not supported".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    results: Vec<StreamResult>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: WireError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResponse {
    Execute { result: WireResult },
    Close,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    cols: Vec<WireColumn>,
    #[serde(default)]
    rows: Vec<Vec<WireValue>>,
    #[serde(default)]
    affected_row_count: u64,
}

#[derive(Debug, Deserialize)]
struct WireColumn {
    name: Option<String>,
}

impl PipelineResponse {
    fn into_result_set(self) -> Result<ResultSet, ClientError> {
        let first = self
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Protocol("empty pipeline response".to_string()))?;

        let result = match first {
            StreamResult::Error { error } => return Err(ClientError::Sql(error.message)),
            StreamResult::Ok {
                response: StreamResponse::Execute { result },
            } => result,
            StreamResult::Ok {
                response: StreamResponse::Close,
            } => {
                return Err(ClientError::Protocol(
                    "close response where execute was expected".to_string(),
                ))
            }
        };

        let columns: Arc<[String]> = result
            .cols
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.name.unwrap_or_else(|| format!("column{}", i)))
            .collect::<Vec<_>>()
            .into();

        let rows = result
            .rows
            .into_iter()
            .map(|values| {
                let values = values
                    .into_iter()
                    .map(WireValue::into_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Row::new(columns.clone(), values))
            })
            .collect::<Result<Vec<_>, ClientError>>()?;

        Ok(ResultSet {
            rows,
            rows_affected: result.affected_row_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value as JsonValue};

    #[test]
    fn test_request_encoding() {
        let stmt = Statement::with_args(
            "SELECT * FROM users WHERE username = ? AND credits > ?",
            vec!["guru".into(), 5i64.into(), Value::Null],
        );
        let encoded = serde_json::to_value(PipelineRequest::single(stmt)).unwrap();

        assert_eq!(encoded["requests"][0]["type"], "execute");
        let args = &encoded["requests"][0]["stmt"]["args"];
        assert_eq!(args[0], json!({"type": "text", "value": "guru"}));
        assert_eq!(args[1], json!({"type": "integer", "value": "5"}));
        assert_eq!(args[2], json!({"type": "null"}));
        assert_eq!(encoded["requests"][1], json!({"type": "close"}));
    }

    #[test]
    fn test_response_decoding() {
        let body = json!({
            "baton": null,
            "base_url": null,
            "results": [
                {"type": "ok", "response": {"type": "execute", "result": {
                    "cols": [{"name": "id", "decltype": "TEXT"}, {"name": "credits", "decltype": "INTEGER"}],
                    "rows": [[{"type": "text", "value": "1"}, {"type": "integer", "value": "9999"}]],
                    "affected_row_count": 0,
                    "last_insert_rowid": null
                }}},
                {"type": "ok", "response": {"type": "close"}}
            ]
        });
        let parsed: PipelineResponse = serde_json::from_value(body).unwrap();
        let result = parsed.into_result_set().unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].text("id").unwrap(), "1");
        assert_eq!(result.rows[0].integer("credits").unwrap(), 9999);
    }

    #[test]
    fn test_error_result_is_sql_error() {
        let body = json!({
            "results": [
                {"type": "error", "error": {"message": "UNIQUE constraint failed: users.username", "code": "SQLITE_CONSTRAINT"}},
                {"type": "ok", "response": {"type": "close"}}
            ]
        });
        let parsed: PipelineResponse = serde_json::from_value(body).unwrap();
        let err = parsed.into_result_set().unwrap_err();
        assert!(err.is_unique_violation());
    }

    async fn fake_pipeline(
        headers: HeaderMap,
        Json(body): Json<JsonValue>,
    ) -> axum::response::Response {
        use axum::response::IntoResponse;

        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "Bearer good-token")
            .unwrap_or(false);
        if !authorized {
            return (axum::http::StatusCode::UNAUTHORIZED, "bad token").into_response();
        }

        let sql = body["requests"][0]["stmt"]["sql"].as_str().unwrap_or_default();
        if sql != "SELECT 1" {
            return Json(json!({"results": [
                {"type": "error", "error": {"message": format!("no such table in {}", sql)}}
            ]}))
            .into_response();
        }

        Json(json!({"results": [
            {"type": "ok", "response": {"type": "execute", "result": {
                "cols": [{"name": "1"}],
                "rows": [[{"type": "integer", "value": "1"}]],
                "affected_row_count": 0
            }}},
            {"type": "ok", "response": {"type": "close"}}
        ]}))
        .into_response()
    }

    async fn spawn_fake_server() -> String {
        let app = Router::new().route("/v2/pipeline", post(fake_pipeline));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_client_round_trip_against_fake_server() {
        let endpoint = spawn_fake_server().await;
        let client = HttpSqlClient::new(&endpoint, "good-token", Duration::from_secs(5)).unwrap();
        assert!(!client.pipeline_url().contains("//v2"));

        let result = client.execute(Statement::new("SELECT 1")).await.unwrap();
        assert_eq!(result.rows[0].integer("1").unwrap(), 1);

        let err = client.execute(Statement::new("SELECT * FROM nope")).await.unwrap_err();
        assert!(matches!(err, ClientError::Sql(_)));
    }

    #[tokio::test]
    async fn test_client_reports_auth_rejection() {
        let endpoint = spawn_fake_server().await;
        let client = HttpSqlClient::new(&endpoint, "bad-token", Duration::from_secs(5)).unwrap();

        let err = client.execute(Statement::new("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(401)));
    }
}
