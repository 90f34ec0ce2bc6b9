//! Connection probing.

use std::time::Duration;

use super::{ClientError, ClientFactory, SqlClient, Statement, PROBE_SQL};

/// Run the reachability probe on `client`, bounded by `timeout`.
pub async fn probe(client: &dyn SqlClient, timeout: Duration) -> Result<(), ClientError> {
    match tokio::time::timeout(timeout, client.execute(Statement::new(PROBE_SQL))).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(ClientError::Timeout),
    }
}

/// Check whether `endpoint` accepts `auth_token`.
///
/// Builds a throwaway client, so the live connection is never touched. Every failure,
/// including a probe that outlives `timeout`, is reported as `false`.
pub async fn test_connection(
    factory: &dyn ClientFactory,
    endpoint: &str,
    auth_token: &str,
    timeout: Duration,
) -> bool {
    let client = match factory.connect(endpoint, auth_token) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Connection test rejected endpoint {:?}: {}", endpoint, e);
            return false;
        }
    };

    match probe(client.as_ref(), timeout).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Connection test failed: {}", e);
            false
        }
    }
}
