/// DID ownership verification
///
/// State machine: `Start -> {Web | ChainAccount} -> Success | Failure`.
/// Dispatch happens on the DID method alone, so malformed or unsupported
/// DIDs are rejected before any network I/O.
pub mod chain;
pub mod dns;
pub mod document;
pub mod web;

pub use chain::ChainAccountVerifier;
pub use dns::{DohResolver, TxtResolver};
pub use document::{DocumentFetcher, HttpDocumentFetcher};
pub use web::WebVerifier;

use crate::{
    chain::ChainReader,
    did::Did,
    error::{AttestError, ErrorKind},
    metrics,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// How ownership was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMethod {
    Dns,
    Document,
    Contract,
    Transfer,
    MintingWallet,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::Dns => "dns",
            VerificationMethod::Document => "document",
            VerificationMethod::Contract => "contract",
            VerificationMethod::Transfer => "transfer",
            VerificationMethod::MintingWallet => "minting-wallet",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one verification attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<VerificationMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl VerificationOutcome {
    pub fn verified(method: VerificationMethod, details: Option<Value>) -> Self {
        Self {
            success: true,
            method: Some(method),
            error: None,
            kind: None,
            details,
        }
    }

    pub fn failed(error: &AttestError, details: Option<Value>) -> Self {
        Self {
            success: false,
            method: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            details,
        }
    }
}

/// Top-level DID verifier
#[derive(Clone)]
pub struct DidVerifier {
    web: WebVerifier,
    chain: ChainAccountVerifier,
}

impl DidVerifier {
    pub fn new(
        resolver: Arc<dyn TxtResolver>,
        fetcher: Arc<dyn DocumentFetcher>,
        reader: Arc<dyn ChainReader>,
        min_confirmations: u64,
    ) -> Self {
        Self {
            web: WebVerifier::new(resolver, fetcher),
            chain: ChainAccountVerifier::new(reader, min_confirmations),
        }
    }

    /// Parse and verify a DID for `claimant`
    pub async fn verify(&self, did: &str, claimant: &str, tx_ref: Option<&str>) -> VerificationOutcome {
        match Did::parse(did) {
            Ok(did) => self.verify_parsed(&did, claimant, tx_ref).await,
            Err(e) => {
                warn!(%did, error = %e, "rejected DID before verification");
                VerificationOutcome::failed(&e, None)
            }
        }
    }

    /// Verify an already-parsed DID for `claimant`
    pub async fn verify_parsed(
        &self,
        did: &Did,
        claimant: &str,
        tx_ref: Option<&str>,
    ) -> VerificationOutcome {
        let outcome = match did {
            Did::Web { domain, .. } => self.web.verify(domain, claimant).await,
            Did::ChainAccount(account) => self.chain.verify(did, account, claimant, tx_ref).await,
        };

        metrics::record_verification(did.method(), &outcome);
        if outcome.success {
            info!(%did, %claimant, method = ?outcome.method, "DID ownership verified");
        } else {
            info!(%did, %claimant, error = ?outcome.error, "DID ownership not verified");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeChain, FakeDocuments, FakeTxt, ALICE, CONTRACT};

    fn verifier(txt: FakeTxt, chain: FakeChain) -> DidVerifier {
        DidVerifier::new(
            Arc::new(txt),
            Arc::new(FakeDocuments::default()),
            Arc::new(chain),
            0,
        )
    }

    #[tokio::test]
    async fn test_dispatches_web_dids_to_dns() {
        let txt = FakeTxt::default().with_records(
            "_omatrust.example.com",
            &[&format!("v=1 controller=eip155:1:{}", ALICE)],
        );
        let outcome = verifier(txt, FakeChain::default())
            .verify("did:web:Example.com", ALICE, None)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.method, Some(VerificationMethod::Dns));
    }

    #[tokio::test]
    async fn test_dispatches_pkh_dids_to_chain() {
        let chain = FakeChain::default().with_call(CONTRACT, "owner()", ALICE);
        let outcome = verifier(FakeTxt::default(), chain)
            .verify(&format!("did:pkh:eip155:1:{}", CONTRACT), ALICE, None)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.method, Some(VerificationMethod::Contract));
    }

    #[tokio::test]
    async fn test_unsupported_method_rejected_without_io() {
        let chain = Arc::new(FakeChain::default());
        let verifier = DidVerifier::new(
            Arc::new(FakeTxt::default()),
            Arc::new(FakeDocuments::default()),
            chain.clone(),
            0,
        );
        let outcome = verifier.verify("did:ethr:0x1234", ALICE, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(ErrorKind::Format));
        assert!(outcome.error.unwrap().contains("Unsupported DID method"));
        assert_eq!(chain.read_count(), 0);
    }

    #[test]
    fn test_method_serializes_kebab_case() {
        let json = serde_json::to_string(&VerificationMethod::MintingWallet).unwrap();
        assert_eq!(json, "\"minting-wallet\"");
    }
}
