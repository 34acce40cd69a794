/// Prometheus metrics for the verification and attestation pipeline
///
/// - Verification attempts by DID method, verification method and result
/// - Attestation writes by signer backend and result
/// - End-to-end pipeline latency by final status
use crate::{
    error::{AttestError, AttestResult},
    verifier::VerificationOutcome,
};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // ========== Verification Metrics ==========

    /// Verification attempts by DID method, verification method and result
    pub static ref VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_verifications_total",
        "Total number of DID ownership verifications",
        &["did_method", "method", "result"]
    )
    .expect("did_verifications_total registers once");

    // ========== Attestation Metrics ==========

    /// Attestation writes by signer backend and result
    pub static ref ATTESTATION_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attestation_writes_total",
        "Total number of attestation write attempts",
        &["backend", "result"]
    )
    .expect("attestation_writes_total registers once");

    /// verify-and-attest duration in seconds
    pub static ref PIPELINE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "attestation_pipeline_duration_seconds",
        "verify-and-attest latencies in seconds",
        &["status"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("attestation_pipeline_duration_seconds registers once");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> AttestResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AttestError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AttestError::Internal(format!("Metrics are not UTF-8: {}", e)))
}

/// Record a verification outcome
pub fn record_verification(did_method: &str, outcome: &VerificationOutcome) {
    let method = outcome.method.map(|m| m.as_str()).unwrap_or("none");
    let result = if outcome.success { "success" } else { "failure" };
    VERIFICATIONS_TOTAL
        .with_label_values(&[did_method, method, result])
        .inc();
}

/// Record one attestation write attempt
pub fn record_write(backend: &str, success: bool) {
    ATTESTATION_WRITES_TOTAL
        .with_label_values(&[backend, if success { "success" } else { "failure" }])
        .inc();
}

/// Record how long a verify-and-attest invocation took
pub fn observe_pipeline(status: &str, seconds: f64) {
    PIPELINE_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(seconds);
}
