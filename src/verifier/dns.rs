/// DNS TXT lookups for did:web controller records
///
/// Records live at `_omatrust.<domain>` and look like
/// `v=1 controller=eip155:1:0xabc...`; `caip10=` is accepted as a legacy
/// spelling of `controller=`.
use crate::error::{AttestError, AttestResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Subdomain holding controller records
pub const TXT_RECORD_PREFIX: &str = "_omatrust";

const VERSION_TOKEN: &str = "v=1";
const CONTROLLER_PREFIXES: [&str; 2] = ["controller=", "caip10="];

const DNS_TYPE_TXT: u16 = 16;
const DNS_STATUS_NOERROR: u32 = 0;
const DNS_STATUS_NXDOMAIN: u32 = 3;

/// DNS TXT resolution capability
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// All TXT record strings at `name`; NotFound if there are none
    async fn lookup_txt(&self, name: &str) -> AttestResult<Vec<String>>;
}

/// Name of the TXT record for a did:web domain (port stripped)
pub fn txt_record_name(domain: &str) -> String {
    let host = domain.split(':').next().unwrap_or(domain);
    format!("{}.{}", TXT_RECORD_PREFIX, host)
}

/// Trimmed, non-empty tokens of a record split on `;` and whitespace
pub fn record_tokens(record: &str) -> Vec<&str> {
    record
        .split(|c: char| c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Controller addresses from every `v=1` record, in record order
pub fn extract_controller_addresses(records: &[String]) -> Vec<String> {
    records
        .iter()
        .map(|record| record_tokens(record))
        .filter(|tokens| tokens.contains(&VERSION_TOKEN))
        .flat_map(|tokens| {
            tokens
                .into_iter()
                .filter_map(|token| {
                    CONTROLLER_PREFIXES
                        .iter()
                        .find_map(|prefix| token.strip_prefix(prefix))
                })
                .filter_map(account_address)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Address segment of a 3-part `namespace:reference:address` id
pub fn account_address(account_id: &str) -> Option<String> {
    let parts: Vec<&str> = account_id.split(':').collect();
    match parts.as_slice() {
        [ns, reference, address] if !ns.is_empty() && !reference.is_empty() && !address.is_empty() => {
            Some(address.to_string())
        }
        _ => None,
    }
}

/// DNS-over-HTTPS resolver using the JSON wire format
#[derive(Debug, Clone)]
pub struct DohResolver {
    http: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

impl DohResolver {
    /// Create a resolver against a DoH JSON endpoint such as
    /// `https://cloudflare-dns.com/dns-query`
    pub fn new(endpoint: impl Into<String>, timeout: Duration, max_retries: u32) -> AttestResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AttestError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            max_retries,
        })
    }

    async fn query_once(&self, name: &str) -> AttestResult<Vec<String>> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "TXT")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await
            .map_err(|e| AttestError::TransientNetwork(format!("DNS query for {} failed: {}", name, e)))?;

        if !response.status().is_success() {
            return Err(AttestError::TransientNetwork(format!(
                "DNS resolver returned HTTP {} for {}",
                response.status(),
                name
            )));
        }

        let body: DohResponse = response
            .json()
            .await
            .map_err(|e| AttestError::TransientNetwork(format!("Invalid DNS response for {}: {}", name, e)))?;

        match body.status {
            DNS_STATUS_NOERROR => {}
            DNS_STATUS_NXDOMAIN => {
                return Err(AttestError::NotFound(format!("{} does not exist", name)))
            }
            other => {
                return Err(AttestError::TransientNetwork(format!(
                    "DNS lookup for {} failed with rcode {}",
                    name, other
                )))
            }
        }

        let records: Vec<String> = body
            .answer
            .into_iter()
            .filter(|a| a.record_type == DNS_TYPE_TXT)
            .map(|a| unquote_txt(&a.data))
            .collect();

        if records.is_empty() {
            return Err(AttestError::NotFound(format!("No TXT records at {}", name)));
        }
        Ok(records)
    }
}

#[async_trait]
impl TxtResolver for DohResolver {
    async fn lookup_txt(&self, name: &str) -> AttestResult<Vec<String>> {
        let mut retries = 0;
        loop {
            match self.query_once(name).await {
                Ok(records) => {
                    debug!(%name, count = records.len(), "resolved TXT records");
                    return Ok(records);
                }
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    warn!(%name, error = %e, retry = retries, "retrying DNS lookup");
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(retries))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Join the quoted character-strings of a TXT rdata value
fn unquote_txt(data: &str) -> String {
    if !data.contains('"') {
        return data.to_string();
    }
    data.split('"')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, s)| s)
        .collect()
}
