use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_engine::{ReferenceLookup, ResolvedValue};

/// Resolves reference ids by POSTing them as a JSON array to an HTTP
/// endpoint
///
/// The endpoint answers with a single URL string or an array aligned with
/// the requested ids.
pub struct HttpReferenceLookup {
    http_client: reqwest::Client,
    url: String,
}

impl HttpReferenceLookup {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ReferenceLookup for HttpReferenceLookup {
    async fn resolve(&self, ids: &[String]) -> Result<ResolvedValue> {
        let response = self
            .http_client
            .post(&self.url)
            .json(ids)
            .send()
            .await
            .context("Reference lookup request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Reference lookup failed with status {}", status);
        }

        response
            .json::<ResolvedValue>()
            .await
            .context("Reference lookup returned an unexpected body")
    }
}
