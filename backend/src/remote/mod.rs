//! Remote relational service access.
//!
//! The rest of the crate talks to the remote store only through [`SqlClient`], built by a
//! [`ClientFactory`]. Production uses the libSQL HTTP pipeline client in [`hrana`];
//! tests swap in an embedded SQLite client.

pub mod hrana;
#[cfg(test)]
pub mod sqlite;
mod tester;

pub use hrana::{HttpClientFactory, HttpSqlClient};
pub use tester::{probe, test_connection};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Minimal round trip used to check reachability and credentials.
pub const PROBE_SQL: &str = "SELECT 1";

/// Errors raised by remote clients.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication rejected (HTTP {0})")]
    Unauthorized(u16),

    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("statement failed: {0}")]
    Sql(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },
}

impl ClientError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, ClientError::Sql(msg) if msg.contains("UNIQUE constraint failed"))
    }

    fn decode(column: &str, reason: impl Into<String>) -> Self {
        ClientError::Decode {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A parameterized statement with positional `?` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

/// One result row with name-based column access.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn text(&self, column: &str) -> Result<String, ClientError> {
        match self.get(column) {
            Some(Value::Text(s)) => Ok(s.clone()),
            Some(Value::Integer(i)) => Ok(i.to_string()),
            Some(Value::Float(f)) => Ok(f.to_string()),
            Some(Value::Null) => Err(ClientError::decode(column, "unexpected NULL")),
            None => Err(ClientError::decode(column, "missing column")),
        }
    }

    pub fn opt_text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            Some(Value::Null) | None => None,
            Some(_) => self.text(column).ok(),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, ClientError> {
        match self.get(column) {
            Some(Value::Integer(i)) => Ok(*i),
            Some(Value::Float(f)) => Ok(*f as i64),
            Some(Value::Text(s)) => s
                .trim()
                .parse()
                .map_err(|_| ClientError::decode(column, format!("not an integer: {}", s))),
            Some(Value::Null) => Err(ClientError::decode(column, "unexpected NULL")),
            None => Err(ClientError::decode(column, "missing column")),
        }
    }

    /// SQLite has no boolean type; accept integers and the common text spellings.
    pub fn boolean(&self, column: &str) -> Result<bool, ClientError> {
        match self.get(column) {
            Some(Value::Integer(i)) => Ok(*i != 0),
            Some(Value::Float(f)) => Ok(*f != 0.0),
            Some(Value::Text(s)) => Ok(matches!(s.as_str(), "1" | "true" | "TRUE")),
            Some(Value::Null) => Ok(false),
            None => Err(ClientError::decode(column, "missing column")),
        }
    }
}

/// Rows and change count from one statement.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

/// A connection to the remote relational store.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Execute one statement and return its rows.
    async fn execute(&self, statement: Statement) -> Result<ResultSet, ClientError>;
}

/// Builds clients from credentials. Construction performs no I/O.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, endpoint: &str, auth_token: &str)
        -> Result<Arc<dyn SqlClient>, ClientError>;
}

/// Rewrite a user-supplied endpoint into an HTTP(S) base URL.
///
/// `libsql://` and `wss://` become `https://`, `ws://` becomes `http://`, a bare host
/// gets `https://`, and trailing slashes are dropped.
pub fn normalize_endpoint(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidEndpoint("empty endpoint".to_string()));
    }

    let rewritten = if let Some(rest) = trimmed.strip_prefix("libsql://") {
        format!("https://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let normalized = rewritten.trim_end_matches('/').to_string();

    let parsed = url::Url::parse(&normalized)
        .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", raw, e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ClientError::InvalidEndpoint(format!("{}: missing host", raw)));
    }

    Ok(normalized)
}
