/// did:web verification: DNS TXT first, did.json document second
use super::{
    dns::{self, TxtResolver},
    document::DocumentFetcher,
    VerificationMethod, VerificationOutcome,
};
use crate::{
    caip10,
    error::{AttestError, AttestResult},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct WebVerifier {
    resolver: Arc<dyn TxtResolver>,
    fetcher: Arc<dyn DocumentFetcher>,
}

impl WebVerifier {
    pub fn new(resolver: Arc<dyn TxtResolver>, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    /// Verify that `claimant` is named as a controller of `domain`
    pub async fn verify(&self, domain: &str, claimant: &str) -> VerificationOutcome {
        let dns_error = match self.verify_dns(domain, claimant).await {
            Ok(details) => return VerificationOutcome::verified(VerificationMethod::Dns, Some(details)),
            Err(e) => e,
        };
        debug!(%domain, error = %dns_error, "DNS verification failed, trying did.json");

        match self.verify_document(domain, claimant).await {
            Ok(details) => VerificationOutcome::verified(VerificationMethod::Document, Some(details)),
            Err(document_error) => {
                let details = json!({
                    "dns": dns_error.to_string(),
                    "document": document_error.to_string(),
                });
                let error = AttestError::WebVerification {
                    dns: Box::new(dns_error),
                    document: Box::new(document_error),
                };
                VerificationOutcome::failed(&error, Some(details))
            }
        }
    }

    async fn verify_dns(&self, domain: &str, claimant: &str) -> AttestResult<Value> {
        let name = dns::txt_record_name(domain);
        let records = self.resolver.lookup_txt(&name).await?;

        let versioned = records
            .iter()
            .any(|r| dns::record_tokens(r).contains(&"v=1"));
        if !versioned {
            return Err(AttestError::NotFound(format!("No v=1 TXT record at {}", name)));
        }

        let found = dns::extract_controller_addresses(&records);
        if let Some(address) = found.iter().find(|a| caip10::addresses_equal(a, claimant)) {
            return Ok(json!({ "record": name, "controller": address }));
        }

        if found.is_empty() {
            return Err(AttestError::NotFound(format!(
                "TXT record at {} names no controller",
                name
            )));
        }
        Err(AttestError::mismatch(
            "DNS controller",
            claimant,
            format!("[{}]", found.join(", ")),
        ))
    }

    async fn verify_document(&self, domain: &str, claimant: &str) -> AttestResult<Value> {
        let doc = self.fetcher.fetch_did_document(domain).await?;

        let methods = doc
            .get("verificationMethod")
            .and_then(Value::as_array)
            .filter(|entries| !entries.is_empty())
            .ok_or_else(|| {
                AttestError::NotFound(format!(
                    "did.json for {} has no verification methods",
                    domain
                ))
            })?;

        let mut found = Vec::new();
        for entry in methods {
            for address in entry_addresses(entry) {
                if caip10::addresses_equal(&address, claimant) {
                    return Ok(json!({
                        "verificationMethod": entry.get("id").cloned().unwrap_or(Value::Null),
                        "controller": address,
                    }));
                }
                found.push(address);
            }
        }

        Err(AttestError::mismatch(
            "Document controller",
            claimant,
            format!("[{}]", found.join(", ")),
        ))
    }
}

/// Addresses carried by one verification method entry
fn entry_addresses(entry: &Value) -> Vec<String> {
    let mut addresses = Vec::new();

    if let Some(address) = entry
        .get("blockchainAccountId")
        .and_then(Value::as_str)
        .and_then(dns::account_address)
    {
        addresses.push(address);
    }

    if let Some(key) = entry.get("publicKeyHex").and_then(Value::as_str) {
        if key.starts_with("0x") {
            addresses.push(key.to_string());
        } else {
            addresses.push(format!("0x{}", key));
        }
    }

    addresses
}
