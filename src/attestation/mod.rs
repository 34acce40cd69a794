/// On-chain attestations: coverage reads, signing and the orchestration
/// pipeline that ties verification to writes
pub mod orchestrator;
pub mod registry;
pub mod signer;

pub use orchestrator::{
    AttestationConfig, AttestationOrchestrator, AttestationReport, AttestationRequest,
    ReportStatus,
};
pub use registry::RegistryAttestationReader;
pub use signer::{SignerBackend, SignerConfig, SignerSelector, TransactionSigner};

use crate::{chain::abi, did::Did, error::AttestResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Attestation schema identifier: a schema name or a 32-byte hex uid
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// On-chain schema uid; names are hashed, 0x-prefixed uids are used as is
    pub fn uid(&self) -> abi::Word {
        if let Some(body) = self.0.strip_prefix("0x") {
            if body.len() == 64 {
                if let Ok(bytes) = hex::decode(body) {
                    let mut word = [0u8; 32];
                    word.copy_from_slice(&bytes);
                    return word;
                }
            }
        }
        abi::keccak256(self.0.as_bytes())
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which required schemas already have an attestation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttestationStatus {
    pub present: BTreeSet<SchemaId>,
    pub missing: BTreeSet<SchemaId>,
}

impl AttestationStatus {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Outcome of one attestation write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub schema: SchemaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WriteResult {
    pub fn succeeded(&self) -> bool {
        self.tx_hash.is_some()
    }
}

/// Reads current attestation coverage from chain state
#[async_trait]
pub trait AttestationReader: Send + Sync {
    /// Partition `schemas` into present and missing for (did, subject)
    async fn coverage(
        &self,
        did: &Did,
        subject: &str,
        schemas: &[SchemaId],
    ) -> AttestResult<AttestationStatus>;
}
