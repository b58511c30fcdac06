//! Query gateway client
//!
//! All remote reads go through [`QueryClient`]. The trait seam keeps the
//! orchestrator testable against a scripted client and keeps transport
//! details (HTTP, timeouts) out of the sync logic.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Executes one query against the remote gateway and returns the raw
/// payload. One request per call, bounded by the configured timeout,
/// no retries. Failures surface as [`SyncError::Transport`].
#[async_trait]
pub trait QueryClient: Send + Sync + 'static {
    async fn execute(&self, query: &str) -> Result<String>;
}

/// HTTP implementation talking to the query gateway.
///
/// Sends `POST {endpoint}` with a `{"query": "..."}` body and returns the
/// response body verbatim. Decoding is the caller's concern.
pub struct HttpQueryClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpQueryClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn execute(&self, query: &str) -> Result<String> {
        debug!("executing query against {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transport(format!(
                "gateway returned {status}"
            )));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client =
            HttpQueryClient::new("http://127.0.0.1:9000/query", Duration::from_secs(3)).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000/query");
    }
}
