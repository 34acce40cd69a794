/// Attestation registry contract access
///
/// The registry is keyed by (schema uid, keccak256 of the DID string,
/// subject address).
use super::{AttestationReader, AttestationStatus, SchemaId};
use crate::{
    chain::{abi, ChainReader, ContractCall},
    did::Did,
    error::AttestResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const HAS_ATTESTATION: &str = "hasAttestation(bytes32,bytes32,address)";
const ATTEST: &str = "attest(bytes32,bytes32,address)";

/// Registry key for a DID
pub fn did_hash(did: &Did) -> abi::Word {
    abi::keccak256(did.to_string().as_bytes())
}

/// Build the `attest` call for one schema
pub fn attest_call(
    chain_id: u64,
    registry: &str,
    from: &str,
    schema: &SchemaId,
    did: &Did,
    subject: &str,
) -> AttestResult<ContractCall> {
    let data = abi::encode_call(
        ATTEST,
        &[schema.uid(), did_hash(did), abi::address_word(subject)?],
    );
    Ok(ContractCall {
        chain_id,
        from: from.to_string(),
        to: registry.to_string(),
        data,
        value: 0,
    })
}

/// Reads coverage with one `hasAttestation` view call per schema
#[derive(Clone)]
pub struct RegistryAttestationReader {
    reader: Arc<dyn ChainReader>,
    chain_id: u64,
    registry: String,
}

impl RegistryAttestationReader {
    pub fn new(reader: Arc<dyn ChainReader>, chain_id: u64, registry: impl Into<String>) -> Self {
        Self {
            reader,
            chain_id,
            registry: registry.into(),
        }
    }
}

#[async_trait]
impl AttestationReader for RegistryAttestationReader {
    async fn coverage(
        &self,
        did: &Did,
        subject: &str,
        schemas: &[SchemaId],
    ) -> AttestResult<AttestationStatus> {
        let did_word = did_hash(did);
        let subject_word = abi::address_word(subject)?;
        let mut status = AttestationStatus::default();

        for schema in schemas {
            if status.present.contains(schema) || status.missing.contains(schema) {
                continue;
            }
            let data = abi::encode_call(HAS_ATTESTATION, &[schema.uid(), did_word, subject_word]);
            let result = self.reader.call(self.chain_id, &self.registry, &data).await?;

            if abi::decode_bool(&result)? {
                status.present.insert(schema.clone());
            } else {
                status.missing.insert(schema.clone());
            }
        }

        debug!(
            %did,
            present = status.present.len(),
            missing = status.missing.len(),
            "read attestation coverage"
        );
        Ok(status)
    }
}
