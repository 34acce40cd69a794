/// did.json document fetching
use crate::error::{AttestError, AttestResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Well-known location of a domain's DID document
pub const DID_DOCUMENT_PATH: &str = "/.well-known/did.json";

/// Upper bound on a document fetch
pub const DOCUMENT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a domain's DID document
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Parsed did.json for `domain`; NotFound for any non-2xx response
    async fn fetch_did_document(&self, domain: &str) -> AttestResult<Value>;
}

/// HTTPS fetcher for `https://<domain>/.well-known/did.json`
#[derive(Debug, Clone)]
pub struct HttpDocumentFetcher {
    http: reqwest::Client,
    scheme: String,
}

impl HttpDocumentFetcher {
    pub fn new(timeout: Duration) -> AttestResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("did-attest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout.min(DOCUMENT_FETCH_TIMEOUT))
            .build()
            .map_err(|e| AttestError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            scheme: "https".to_string(),
        })
    }

    /// Override the URL scheme; only local test servers should use plain http
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn document_url(&self, domain: &str) -> String {
        format!("{}://{}{}", self.scheme, domain, DID_DOCUMENT_PATH)
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch_did_document(&self, domain: &str) -> AttestResult<Value> {
        let url = self.document_url(domain);
        debug!(%url, "fetching DID document");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AttestError::TransientNetwork(format!("Timed out fetching {}", url))
            } else {
                AttestError::TransientNetwork(format!("Failed to fetch {}: {}", url, e))
            }
        })?;

        if !response.status().is_success() {
            return Err(AttestError::NotFound(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AttestError::Format(format!("{} is not valid JSON: {}", url, e)))
    }
}
