/// verify-and-attest pipeline
///
/// 1. Validate the DID and claimant (no I/O on failure)
/// 2. Read coverage; nothing missing means done, no writes
/// 3. Verify DID ownership
/// 4. Select a signer once and write each missing schema in turn
/// 5. Aggregate write outcomes without re-reading the registry
///
/// Successful writes are never rolled back when later ones fail.
use super::{
    registry, AttestationReader, AttestationStatus, SchemaId, SignerSelector, TransactionSigner,
    WriteResult,
};
use crate::{
    caip10,
    chain::ChainWriter,
    did::Did,
    error::{AttestError, AttestResult, ErrorKind},
    metrics,
    verifier::{DidVerifier, VerificationOutcome},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Where attestations are written
#[derive(Debug, Clone)]
pub struct AttestationConfig {
    pub active_chain_id: u64,
    pub registry_address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequest {
    pub did: String,
    pub connected_address: String,
    #[serde(default)]
    pub required_schemas: Vec<SchemaId>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Ready,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Ready => "ready",
            ReportStatus::Failed => "failed",
        }
    }
}

/// Result of one verify-and-attest invocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReport {
    pub ok: bool,
    pub status: ReportStatus,
    pub attestations: AttestationStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tx_hashes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Verbose diagnostics; callers strip this unless debug output is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    pub checked_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl AttestationReport {
    fn ready(attestations: AttestationStatus) -> Self {
        Self {
            ok: true,
            status: ReportStatus::Ready,
            attestations,
            tx_hashes: Vec::new(),
            warnings: Vec::new(),
            error: None,
            error_kind: None,
            details: None,
            debug: None,
            checked_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    fn failed(stage: &str, error: &AttestError, attestations: AttestationStatus) -> Self {
        Self {
            ok: false,
            status: ReportStatus::Failed,
            attestations,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            details: Some(json!({ "stage": stage })),
            ..Self::ready(AttestationStatus::default())
        }
    }

    /// Report for a request body that never reached the pipeline
    pub fn rejected(error: &AttestError, started: Instant) -> Self {
        let mut report = Self::failed("request", error, AttestationStatus::default());
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        metrics::observe_pipeline(report.status.as_str(), started.elapsed().as_secs_f64());
        report
    }
}

/// Runs the verify-and-attest pipeline
#[derive(Clone)]
pub struct AttestationOrchestrator {
    config: AttestationConfig,
    verifier: DidVerifier,
    attestations: Arc<dyn AttestationReader>,
    writer: Arc<dyn ChainWriter>,
    signers: SignerSelector,
}

impl AttestationOrchestrator {
    pub fn new(
        config: AttestationConfig,
        verifier: DidVerifier,
        attestations: Arc<dyn AttestationReader>,
        writer: Arc<dyn ChainWriter>,
        signers: SignerSelector,
    ) -> Self {
        Self {
            config,
            verifier,
            attestations,
            writer,
            signers,
        }
    }

    pub async fn verify_and_attest(&self, request: &AttestationRequest) -> AttestationReport {
        let started = Instant::now();
        let mut report = self.run(request).await;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        metrics::observe_pipeline(report.status.as_str(), started.elapsed().as_secs_f64());
        report
    }

    async fn run(&self, request: &AttestationRequest) -> AttestationReport {
        let (did, claimant) = match validate(request) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(did = %request.did, error = %e, "rejected verify-and-attest request");
                return AttestationReport::failed("request", &e, AttestationStatus::default());
            }
        };

        let status = match self
            .attestations
            .coverage(&did, &claimant, &request.required_schemas)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(%did, error = %e, "failed to read attestation coverage");
                return AttestationReport::failed("coverage", &e, AttestationStatus::default());
            }
        };

        if status.is_complete() {
            info!(%did, %claimant, present = status.present.len(), "all attestations present");
            return AttestationReport::ready(status);
        }

        let outcome = self
            .verifier
            .verify_parsed(&did, &claimant, request.tx_hash.as_deref())
            .await;
        if !outcome.success {
            return verification_failed(&did, &claimant, outcome, status);
        }

        let signer = match self.signers.select() {
            Ok(signer) => signer,
            Err(e) => {
                warn!(error = %e, "no signer available for attestation writes");
                let mut report = AttestationReport::failed("signer", &e, status);
                report.debug = Some(json!({ "verification": outcome }));
                return report;
            }
        };

        let mut writes = Vec::with_capacity(status.missing.len());
        for schema in &status.missing {
            writes.push(self.write_one(signer.as_ref(), schema, &did, &claimant).await);
        }

        aggregate(status, writes, outcome)
    }

    async fn write_one(
        &self,
        signer: &dyn TransactionSigner,
        schema: &SchemaId,
        did: &Did,
        subject: &str,
    ) -> WriteResult {
        let result = self.try_write(signer, schema, did, subject).await;
        metrics::record_write(signer.backend().as_str(), result.is_ok());

        match result {
            Ok(tx_hash) => {
                info!(%did, %schema, %tx_hash, "attestation written");
                WriteResult {
                    schema: schema.clone(),
                    tx_hash: Some(tx_hash),
                    error: None,
                }
            }
            Err(e) => {
                warn!(%did, %schema, error = %e, "attestation write failed");
                WriteResult {
                    schema: schema.clone(),
                    tx_hash: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_write(
        &self,
        signer: &dyn TransactionSigner,
        schema: &SchemaId,
        did: &Did,
        subject: &str,
    ) -> AttestResult<String> {
        let call = registry::attest_call(
            self.config.active_chain_id,
            &self.config.registry_address,
            signer.address(),
            schema,
            did,
            subject,
        )?;
        let prepared = self.writer.prepare(call).await?;
        self.writer.send(&prepared, signer).await
    }
}

/// Parse the DID and checksum the claimant
fn validate(request: &AttestationRequest) -> AttestResult<(Did, String)> {
    let did = Did::parse(&request.did)?;
    let claimant = caip10::to_checksum_address(&request.connected_address)?;
    Ok((did, claimant))
}

fn verification_failed(
    did: &Did,
    claimant: &str,
    outcome: VerificationOutcome,
    status: AttestationStatus,
) -> AttestationReport {
    info!(%did, %claimant, error = ?outcome.error, "verification failed, nothing written");
    AttestationReport {
        ok: false,
        status: ReportStatus::Failed,
        error: outcome.error.clone(),
        error_kind: outcome.kind,
        details: Some(json!({ "stage": "verification" })),
        debug: Some(json!({ "did": did.to_string(), "claimant": claimant, "verification": outcome })),
        ..AttestationReport::ready(status)
    }
}

/// Fold write outcomes into the final report
fn aggregate(
    mut status: AttestationStatus,
    writes: Vec<WriteResult>,
    verification: VerificationOutcome,
) -> AttestationReport {
    let debug = json!({ "verification": verification, "writes": writes });

    if writes.iter().all(|w| !w.succeeded()) {
        let diagnostics: Vec<String> = writes
            .iter()
            .map(|w| format!("{}: {}", w.schema, w.error.as_deref().unwrap_or("unknown error")))
            .collect();
        return AttestationReport {
            ok: false,
            status: ReportStatus::Failed,
            error: Some(format!("All attestation writes failed: {}", diagnostics.join("; "))),
            error_kind: Some(ErrorKind::Internal),
            details: Some(json!({ "stage": "write", "failures": diagnostics })),
            debug: Some(debug),
            ..AttestationReport::ready(status)
        };
    }

    let mut tx_hashes = Vec::new();
    let mut warnings = Vec::new();
    for write in writes {
        match write.tx_hash {
            Some(hash) => {
                status.missing.remove(&write.schema);
                status.present.insert(write.schema);
                tx_hashes.push(hash);
            }
            None => warnings.push(format!(
                "{}: {}",
                write.schema,
                write.error.unwrap_or_default()
            )),
        }
    }

    AttestationReport {
        tx_hashes,
        warnings,
        debug: Some(debug),
        ..AttestationReport::ready(status)
    }
}
