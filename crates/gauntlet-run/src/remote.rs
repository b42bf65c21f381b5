//! HTTP client runner for the remote RPC surface

use crate::protocol::RpcRunResponse;
use crate::runner::{CaseRunner, DispatchError};
use futures_util::future::BoxFuture;
use gauntlet_log::{CaseResult, QueryExpectation};
use gauntlet_query::TestQuery;
use reqwest::StatusCode;

/// Drives cases on a remote harness process via `/load`, `/run`, and
/// `/terminate`.
pub struct RemoteRunner {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteRunner {
    /// `base_url` like `http://localhost:8080`, no trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str, query: &str) -> String {
        format!(
            "{}/{}?{}",
            self.base_url,
            path,
            urlencoding::encode(query)
        )
    }

    async fn load(&self, root: &TestQuery) -> Result<(), DispatchError> {
        let url = self.endpoint("load", &root.to_string());
        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Remote { status, message });
        }
        Ok(())
    }

    async fn run_remote(
        &self,
        query: &str,
        _expectations: &[QueryExpectation],
    ) -> Result<CaseResult, DispatchError> {
        let url = self.endpoint("run", query);
        let response = self.client.post(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(DispatchError::CaseNotFound {
                query: query.to_string(),
            }),
            status if status.is_success() => {
                let body: RpcRunResponse = response.json().await?;
                Ok(body.into_result())
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(DispatchError::Remote {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

impl CaseRunner for RemoteRunner {
    fn prepare<'a>(&'a self, root: &'a TestQuery) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(self.load(root))
    }

    fn run<'a>(
        &'a self,
        query: &'a str,
        expectations: &'a [QueryExpectation],
    ) -> BoxFuture<'a, Result<CaseResult, DispatchError>> {
        Box::pin(self.run_remote(query, expectations))
    }

    /// Best-effort: asks the remote process to stop listening and exit.
    fn shutdown<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}/terminate", self.base_url);
            if let Err(err) = self.client.post(&url).send().await {
                tracing::debug!(error = %err, "terminate request failed");
            }
        })
    }
}
