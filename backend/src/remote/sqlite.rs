//! Embedded SQLite [`SqlClient`] for exercising the remote code paths in tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, ValueRef};

use super::{ClientError, ClientFactory, ResultSet, Row, SqlClient, Statement, Value};

/// Runs statements against a SQLite file through sqlx.
#[derive(Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
    reject: bool,
}

impl SqliteClient {
    pub async fn open(path: &Path) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open sqlite test database");
        Self {
            pool,
            reject: false,
        }
    }

    /// A client whose every statement fails as if the token were refused.
    pub fn rejecting(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            reject: true,
        }
    }
}

#[async_trait]
impl SqlClient for SqliteClient {
    async fn execute(&self, statement: Statement) -> Result<ResultSet, ClientError> {
        if self.reject {
            return Err(ClientError::Unauthorized(401));
        }

        let mut query = sqlx::query(&statement.sql);
        for arg in statement.args {
            query = match arg {
                Value::Null => query.bind(None::<String>),
                Value::Integer(i) => query.bind(i),
                Value::Float(f) => query.bind(f),
                Value::Text(s) => query.bind(s),
            };
        }

        let head = statement.sql.trim_start().to_ascii_uppercase();
        if head.starts_with("SELECT") || head.starts_with("WITH") {
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ClientError::Sql(e.to_string()))?;
            Ok(ResultSet {
                rows: rows.iter().map(convert_row).collect(),
                rows_affected: 0,
            })
        } else {
            let done = query
                .execute(&self.pool)
                .await
                .map_err(|e| ClientError::Sql(e.to_string()))?;
            Ok(ResultSet {
                rows: Vec::new(),
                rows_affected: done.rows_affected(),
            })
        }
    }
}

fn convert_row(row: &SqliteRow) -> Row {
    let columns: Arc<[String]> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into();
    let values = (0..columns.len())
        .map(|i| {
            let is_null = row.try_get_raw(i).map(|raw| raw.is_null()).unwrap_or(true);
            if is_null {
                Value::Null
            } else if let Ok(v) = row.try_get::<i64, _>(i) {
                Value::Integer(v)
            } else if let Ok(v) = row.try_get::<f64, _>(i) {
                Value::Float(v)
            } else if let Ok(v) = row.try_get::<String, _>(i) {
                Value::Text(v)
            } else {
                Value::Null
            }
        })
        .collect();
    Row::new(columns, values)
}

/// Hands out one shared [`SqliteClient`]; credentials other than `accepted_token`
/// produce a rejecting client, and `unreachable` endpoints fail to build at all.
pub struct SqliteClientFactory {
    client: SqliteClient,
    accepted_token: String,
}

impl SqliteClientFactory {
    pub fn new(client: SqliteClient, accepted_token: &str) -> Self {
        Self {
            client,
            accepted_token: accepted_token.to_string(),
        }
    }
}

impl ClientFactory for SqliteClientFactory {
    fn connect(
        &self,
        endpoint: &str,
        auth_token: &str,
    ) -> Result<Arc<dyn SqlClient>, ClientError> {
        super::normalize_endpoint(endpoint)?;
        if endpoint.contains("unreachable") {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        if auth_token == self.accepted_token {
            Ok(Arc::new(self.client.clone()))
        } else {
            Ok(Arc::new(self.client.rejecting()))
        }
    }
}
